//! Parallel ingest of lichess puzzle CSV files.
//!
//! One producer streams rows, parses each FEN, applies the puzzle's first
//! half-move, and fans the result out by white-pawn count to nine shard
//! workers over SPSC rings. Entries travel in batches to keep the rings
//! cold. Every exit path, including failures, sends a final record on every
//! ring and joins every worker before returning.

use super::spsc;
use super::spsc::Receiver;
use super::spsc::Sender;
use crate::BATCH_SIZE;
use crate::RING_BYTES;
use crate::SHARDS;
use crate::chess::Move;
use crate::chess::Position;
use crate::chess::PositionInfo;
use crate::chess::fen;
use crate::classtree::Attributes;
use crate::classtree::Entry;
use crate::classtree::Metadata;
use crate::classtree::Subtree;
use crate::classtree::Tree;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;

/// A typed record crossing a shard ring: a batch of parsed positions whose
/// ownership moves to the worker, or the end-of-stream marker.
pub enum Record {
    Batch(Vec<(Position, PositionInfo)>),
    Finish,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("database file: {0}")]
    File(#[from] std::io::Error),
    #[error("invalid position at row {row}")]
    InvalidPosition { row: usize },
}

/// Tally of a completed ingest pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Loaded {
    /// data rows read from the file
    pub rows: usize,
    /// rows whose FEN or move failed to parse and were dropped
    pub skipped: usize,
}

/// A shard-bound lane: the producer's batch buffer plus its ring.
struct Lane {
    tx: Sender<Record>,
    batch: Vec<(Position, PositionInfo)>,
}

impl Lane {
    fn new(tx: Sender<Record>) -> Self {
        Self {
            tx,
            batch: Vec::with_capacity(BATCH_SIZE),
        }
    }

    fn push(&mut self, parsed: (Position, PositionInfo)) {
        self.batch.push(parsed);
        if self.batch.len() == BATCH_SIZE {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if !self.batch.is_empty() {
            let full = std::mem::replace(&mut self.batch, Vec::with_capacity(BATCH_SIZE));
            self.tx.send(Record::Batch(full));
        }
    }

    fn finish(&mut self) {
        self.flush();
        self.tx.send(Record::Finish);
    }
}

/// Parse one data row: the FEN sits in the second field, the first five
/// characters of the third field encode the applied half-move.
fn parse_row(record: &csv::ByteRecord) -> Option<(Position, PositionInfo)> {
    let fen_field = std::str::from_utf8(record.get(1)?).ok()?;
    let move_field = std::str::from_utf8(record.get(2)?).ok()?;
    let (mut position, mut info) = fen::parse(fen_field)?;
    let m = Move::try_from(move_field).ok()?;
    position.apply(m, &mut info);
    Some((position, info))
}

/// The shard a parsed position lands in, clamped to the last shard.
fn shard(info: &PositionInfo) -> usize {
    (info.white_pawns as usize).min(SHARDS - 1)
}

/// Load a puzzle file into the store. Nine workers each build a private
/// shard tree which is merged in at the end; rows that fail to parse are
/// skipped and counted.
pub fn load_database<P: AsRef<Path>>(path: P, db: &mut Tree) -> Result<Loaded, LoadError> {
    let file = File::open(path)?;
    load_records(BufReader::new(file), db)
}

/// Reader-based seam for [`load_database`].
pub fn load_records<R: Read>(input: R, db: &mut Tree) -> Result<Loaded, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let mut loaded = Loaded::default();
    let shards = std::thread::scope(|scope| {
        let mut lanes = Vec::with_capacity(SHARDS);
        let mut workers = Vec::with_capacity(SHARDS);
        for _ in 0..SHARDS {
            let (tx, rx) = spsc::ring::<Record>(RING_BYTES);
            lanes.push(Lane::new(tx));
            workers.push(scope.spawn(move || consume(rx)));
        }

        for row in reader.byte_records() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    log::warn!("unreadable csv row: {}", e);
                    loaded.rows += 1;
                    loaded.skipped += 1;
                    continue;
                }
            };
            loaded.rows += 1;
            match parse_row(&row) {
                None => loaded.skipped += 1,
                Some(parsed) => lanes[shard(&parsed.1)].push(parsed),
            }
            if loaded.rows % 1_000_000 == 0 {
                log::info!("{} rows read", loaded.rows);
            }
        }

        for lane in &mut lanes {
            lane.finish();
        }
        workers
            .into_iter()
            .map(|w| w.join().expect("shard worker"))
            .collect::<Vec<_>>()
    });

    for tree in shards {
        db.merge(tree);
    }
    if loaded.skipped > 0 {
        log::warn!("skipped {} of {} rows", loaded.skipped, loaded.rows);
    }
    Ok(loaded)
}

/// Worker loop for [`load_records`]: drain the ring into a private tree.
fn consume(mut rx: Receiver<Record>) -> Tree {
    let mut tree = Tree::new();
    loop {
        match rx.recv() {
            Record::Finish => return tree,
            Record::Batch(batch) => {
                for (position, info) in batch {
                    let attrs = Attributes::from((&position, &info));
                    tree.add(
                        Entry {
                            position,
                            meta: Metadata { occurrences: 1 },
                        },
                        attrs,
                    );
                }
            }
        }
    }
}

/// Load a puzzle file into a store restored from a memory profile. Workers
/// write straight into the store's preallocated shard subtrees, so node
/// storage never touches the allocator. The first unparseable row stops the
/// pass with an error, but the rings are still drained and every worker
/// joined before it surfaces; the store's size is recounted either way.
pub fn load_database_initialized<P: AsRef<Path>>(
    path: P,
    db: &mut Tree,
) -> Result<Loaded, LoadError> {
    let file = File::open(path)?;
    load_records_initialized(BufReader::new(file), db)
}

/// Reader-based seam for [`load_database_initialized`].
pub fn load_records_initialized<R: Read>(input: R, db: &mut Tree) -> Result<Loaded, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let mut loaded = Loaded::default();
    let mut failure = None;
    let dropped = std::thread::scope(|scope| {
        let mut slots: Vec<Option<&mut Subtree>> = (0..SHARDS).map(|_| None).collect();
        for (key, sub) in db.shards_mut() {
            if (key as usize) < SHARDS {
                slots[key as usize] = Some(sub);
            }
        }

        let mut lanes = Vec::with_capacity(SHARDS);
        let mut workers = Vec::with_capacity(SHARDS);
        for slot in slots {
            let (tx, rx) = spsc::ring::<Record>(RING_BYTES);
            lanes.push(Lane::new(tx));
            workers.push(scope.spawn(move || consume_seeded(rx, slot)));
        }

        for row in reader.byte_records() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    log::warn!("unreadable csv row: {}", e);
                    loaded.rows += 1;
                    failure = Some(loaded.rows);
                    break;
                }
            };
            loaded.rows += 1;
            match parse_row(&row) {
                None => {
                    failure = Some(loaded.rows);
                    break;
                }
                Some(parsed) => lanes[shard(&parsed.1)].push(parsed),
            }
        }

        for lane in &mut lanes {
            lane.finish();
        }
        workers
            .into_iter()
            .map(|w| w.join().expect("shard worker"))
            .sum::<usize>()
    });

    db.update_size();
    if dropped > 0 {
        log::warn!("{} rows fell outside the restored skeleton", dropped);
    }
    match failure {
        Some(row) => Err(LoadError::InvalidPosition { row }),
        None => Ok(loaded),
    }
}

/// Worker loop for [`load_records_initialized`]: fill a borrowed shard
/// subtree, or count entries dropped for lack of one.
fn consume_seeded(mut rx: Receiver<Record>, mut slot: Option<&mut Subtree>) -> usize {
    let mut dropped = 0;
    loop {
        match rx.recv() {
            Record::Finish => return dropped,
            Record::Batch(batch) => {
                for (position, info) in batch {
                    match slot.as_deref_mut() {
                        None => dropped += 1,
                        Some(sub) => {
                            let attrs = Attributes::from((&position, &info));
                            sub.add(
                                Entry {
                                    position,
                                    meta: Metadata { occurrences: 1 },
                                },
                                &attrs.0[1..],
                            );
                        }
                    }
                }
            }
        }
    }
}
