pub mod response;

use crate::query::Query;
use crate::session::Sessions;
use actix_web::App;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::cookie::Cookie;
use actix_web::middleware::Logger;
use actix_web::web;
use response::Answered;
use response::Stepped;

pub struct Server;

impl Server {
    /// Serve the query API over the shared store until interrupted. The
    /// session id round-trips through a `sessionid` cookie.
    pub async fn run(addr: &str, sessions: Sessions) -> Result<(), std::io::Error> {
        let sessions = web::Data::new(sessions);
        log::info!("serving on {}", addr);
        HttpServer::new(move || {
            App::new()
                .wrap(Logger::new("%r %s %Ts"))
                .app_data(sessions.clone())
                .route("/query", web::post().to(query))
                .route("/next", web::get().to(next))
                .route("/previous", web::get().to(previous))
        })
        .bind(addr)?
        .run()
        .await
    }
}

// Route handlers

async fn query(sessions: web::Data<Sessions>, req: HttpRequest, body: String) -> impl Responder {
    let id = req.cookie("sessionid");
    let ran = sessions.run(
        id.as_ref().map(|c| c.value()),
        Query::from(body.as_str()),
    );
    let mut response = HttpResponse::Ok();
    if let Some(ref minted) = ran.id {
        response.cookie(Cookie::new("sessionid", minted.clone()));
    }
    response.json(Answered {
        id: ran.id,
        position: ran.first.into(),
        time: format!("{:?}", ran.time),
        count: ran.count,
    })
}

async fn next(sessions: web::Data<Sessions>, req: HttpRequest) -> impl Responder {
    step(&sessions, &req, Sessions::next)
}

async fn previous(sessions: web::Data<Sessions>, req: HttpRequest) -> impl Responder {
    step(&sessions, &req, Sessions::previous)
}

fn step(
    sessions: &Sessions,
    req: &HttpRequest,
    advance: fn(&Sessions, &str) -> Option<(crate::session::Step, usize, usize)>,
) -> HttpResponse {
    let Some(cookie) = req.cookie("sessionid") else {
        return HttpResponse::BadRequest().body("no sessionid cookie");
    };
    match advance(sessions, cookie.value()) {
        None => HttpResponse::BadRequest().body("unknown session"),
        Some((step, current, total)) => HttpResponse::Ok().json(Stepped {
            position: step.into(),
            current,
            total,
        }),
    }
}
