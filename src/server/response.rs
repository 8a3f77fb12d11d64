use crate::session::Step;
use serde::Serialize;

/// Body of a `POST /query` answer. The id rides along only when the request
/// minted the session; afterwards it lives in the cookie.
#[derive(Serialize)]
pub struct Answered {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub position: String,
    pub time: String,
    pub count: usize,
}

/// Body of a `GET /next` or `GET /previous` answer.
#[derive(Serialize)]
pub struct Stepped {
    pub position: String,
    pub current: usize,
    pub total: usize,
}

impl From<Step> for String {
    fn from(step: Step) -> String {
        match step {
            Step::Position(fen) => fen,
            Step::End => "end".to_string(),
            Step::Begin => "begin".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_render_as_literals() {
        assert_eq!(String::from(Step::End), "end");
        assert_eq!(String::from(Step::Begin), "begin");
        assert_eq!(String::from(Step::Position("8/8 w - -".into())), "8/8 w - -");
    }

    #[test]
    fn minted_ids_serialize_and_absent_ones_vanish() {
        let with = Answered {
            id: Some("123".into()),
            position: "end".into(),
            time: "1ms".into(),
            count: 0,
        };
        let json = serde_json::to_string(&with).expect("json");
        assert!(json.contains("\"id\":\"123\""));
        let without = Answered { id: None, ..with };
        let json = serde_json::to_string(&without).expect("json");
        assert!(!json.contains("\"id\""));
    }
}
