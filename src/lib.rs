pub mod chess;
pub mod classtree;
pub mod ingest;
pub mod query;
pub mod server;
pub mod session;
pub mod shell;

/// ingest shards, one per white-pawn count 0..=8
pub const SHARDS: usize = 9;
/// entries the producer accumulates before publishing a batch
pub const BATCH_SIZE: usize = 1000;
/// byte capacity of each shard's ring buffer
pub const RING_BYTES: usize = 1024;

/// trait for random generation, mainly (strictly?) for testing
pub trait Arbitrary {
    fn random() -> Self;
}

/// initialize logging
pub fn init() {
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    simplelog::TermLogger::init(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .expect("initialize logger");
}
