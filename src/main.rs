use anyhow::Context;
use clap::Parser;
use puzzlebase::classtree;
use puzzlebase::classtree::Tree;
use puzzlebase::ingest;
use puzzlebase::server::Server;
use puzzlebase::session::Sessions;
use puzzlebase::shell::Shell;
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Index chess puzzle positions and answer material queries over them.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// preload a lichess puzzle csv at startup (repeatable)
    #[arg(long)]
    lichess_database: Vec<PathBuf>,
    /// restore the index skeleton from a memory profile before loading
    #[arg(long)]
    read_memory_profile: Option<PathBuf>,
    /// capture the index skeleton to a memory profile after loading
    #[arg(long)]
    write_memory_profile: Option<PathBuf>,
    /// serve the http api on this address instead of the interactive shell
    #[arg(long)]
    serve: Option<String>,
}

fn main() -> anyhow::Result<()> {
    puzzlebase::init();
    let args = Args::parse();

    let mut db = match &args.read_memory_profile {
        None => Tree::new(),
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("open memory profile {}", path.display()))?;
            classtree::initialize(BufReader::new(file))
                .with_context(|| format!("restore memory profile {}", path.display()))?
        }
    };
    let initialized = args.read_memory_profile.is_some();

    for path in &args.lichess_database {
        let begin = Instant::now();
        let before = db.size();
        let loaded = match initialized {
            true => ingest::load_database_initialized(path, &mut db),
            false => ingest::load_database(path, &mut db),
        }
        .with_context(|| format!("load database {}", path.display()))?;
        log::info!(
            "{}: {} rows read, {} skipped, {} new positions ({} -> {}) in {:?}",
            path.display(),
            loaded.rows,
            loaded.skipped,
            db.size() - before,
            before,
            db.size(),
            begin.elapsed()
        );
    }

    if let Some(path) = &args.write_memory_profile {
        let file = File::create(path)
            .with_context(|| format!("create memory profile {}", path.display()))?;
        classtree::output_profile(&db, BufWriter::new(file))
            .with_context(|| format!("write memory profile {}", path.display()))?;
        log::info!("memory profile written to {}", path.display());
    }

    match args.serve {
        Some(addr) => {
            let sessions = Sessions::new(Arc::new(db));
            actix_web::rt::System::new()
                .block_on(Server::run(&addr, sessions))
                .context("http server")?;
        }
        None => Shell::new(db).run(),
    }
    Ok(())
}
