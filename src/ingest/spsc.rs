//! Single-producer single-consumer ring buffer.
//!
//! The ring is byte level underneath: each record is reserved at its own
//! size and alignment, constructed in place, then published. Both endpoints
//! keep a private window of monotonic positions (`base + offset`), bumping
//! `base` by the capacity on wrap so that free-space comparisons are plain
//! signed differences. A publish makes everything written since the last
//! publish visible with release semantics; the read side is symmetric.
//!
//! Blocking follows an arm-then-recheck-then-cancel protocol: a starved
//! endpoint arms the signal flag on the position it watches, rechecks that
//! position, and either cancels the flag and retries (the peer moved) or
//! sleeps on its own semaphore. The peer's publish consumes the flag and
//! rings the sleeper's bell. Skipping the recheck would lose wakeups.
//!
//! The two endpoints share one record type, so the consumer replays the
//! producer's reservation arithmetic exactly: same sizes, same alignment,
//! same wrap decisions. Records are moved in on send and moved out on
//! receive; a ring dropped with unread records leaks them, which never
//! happens in practice because the pipeline always drains to a final record.

use std::alloc::Layout;
use std::alloc::alloc;
use std::alloc::dealloc;
use std::alloc::handle_alloc_error;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

const CACHE_LINE: usize = 64;

const fn align_up(pos: usize, alignment: usize) -> usize {
    (pos + alignment - 1) & !(alignment - 1)
}

/// A binary semaphore built from a mutex and a condvar.
struct Semaphore {
    up: Mutex<bool>,
    bell: Condvar,
}

impl Semaphore {
    fn new() -> Self {
        Self {
            up: Mutex::new(false),
            bell: Condvar::new(),
        }
    }

    fn release(&self) {
        *self.up.lock().expect("semaphore mutex") = true;
        self.bell.notify_one();
    }

    fn acquire(&self) {
        let mut up = self.up.lock().expect("semaphore mutex");
        while !*up {
            up = self.bell.wait(up).expect("semaphore mutex");
        }
        *up = false;
    }
}

/// One endpoint's shared face: its published position, the flag its peer
/// arms to request a wakeup when this position moves, and the bell this
/// endpoint sleeps on. Cache-line aligned so the two faces never share.
#[repr(align(64))]
struct Face {
    pos: AtomicUsize,
    signal: AtomicBool,
    semaphore: Semaphore,
}

impl Face {
    fn new() -> Self {
        Self {
            pos: AtomicUsize::new(0),
            signal: AtomicBool::new(false),
            semaphore: Semaphore::new(),
        }
    }
}

/// Storage and synchronization state shared by the two endpoints.
struct Ring {
    buffer: *mut u8,
    capacity: usize,
    writer: Face,
    reader: Face,
}

unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}

impl Drop for Ring {
    fn drop(&mut self) {
        let layout = Layout::from_size_align(self.capacity, CACHE_LINE).expect("ring layout");
        unsafe { dealloc(self.buffer, layout) };
    }
}

/// An endpoint's private window: `begin`/`end` are offsets into the buffer,
/// `base` counts whole laps so positions stay monotonic.
#[derive(Default)]
struct Window {
    base: usize,
    begin: usize,
    end: usize,
}

/// Create a ring of the given byte capacity, which must be a power of two
/// large enough for one record plus its alignment.
pub fn ring<T: Send>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    assert!(capacity.is_power_of_two(), "capacity must be a power of two");
    assert!(
        size_of::<T>() + align_of::<T>() <= capacity,
        "a record must fit the ring"
    );
    assert!(
        align_of::<T>() <= CACHE_LINE,
        "record alignment is capped by the buffer's"
    );
    let layout = Layout::from_size_align(capacity, CACHE_LINE).expect("ring layout");
    let buffer = unsafe { alloc(layout) };
    if buffer.is_null() {
        handle_alloc_error(layout);
    }
    let ring = Arc::new(Ring {
        buffer,
        capacity,
        writer: Face::new(),
        reader: Face::new(),
    });
    let sender = Sender {
        ring: ring.clone(),
        window: Window {
            base: 0,
            begin: 0,
            end: capacity,
        },
        records: PhantomData,
    };
    let receiver = Receiver {
        ring,
        window: Window::default(),
        records: PhantomData,
    };
    (sender, receiver)
}

/// The producing endpoint.
pub struct Sender<T> {
    ring: Arc<Ring>,
    window: Window,
    records: PhantomData<fn(T)>,
}

unsafe impl<T: Send> Send for Sender<T> {}

impl<T: Send> Sender<T> {
    /// Move a record into the ring, blocking while the consumer is behind.
    pub fn send(&mut self, record: T) {
        let dst = self.prepare(size_of::<T>(), align_of::<T>());
        unsafe { std::ptr::write(dst.cast::<T>(), record) };
        self.publish();
    }

    /// Reserve `bytes` at `alignment` and step the private cursor past them.
    fn prepare(&mut self, bytes: usize, alignment: usize) -> *mut u8 {
        let mut begin = align_up(self.window.begin, alignment);
        let mut end = begin + bytes;
        if end > self.window.end {
            (begin, end) = self.reserve(begin, end);
        }
        self.window.begin = end;
        unsafe { self.ring.buffer.add(begin) }
    }

    /// Wait until the consumer has freed enough room, wrapping first if the
    /// reservation ran off the buffer.
    fn reserve(&mut self, mut begin: usize, mut end: usize) -> (usize, usize) {
        if end > self.ring.capacity {
            end -= begin;
            begin = 0;
            self.window.base += self.ring.capacity;
        }
        loop {
            let reader = self.ring.reader.pos.load(Ordering::Acquire);
            let available = reader
                .wrapping_sub(self.window.base)
                .wrapping_add(self.ring.capacity);
            if available as isize >= end as isize {
                self.window.end = available.min(self.ring.capacity);
                return (begin, end);
            }
            self.ring.reader.signal.store(true, Ordering::SeqCst);
            if reader != self.ring.reader.pos.load(Ordering::Relaxed)
                && self.ring.reader.signal.swap(false, Ordering::SeqCst)
            {
                // the consumer moved between arming and sleeping: cancelled
                continue;
            }
            self.ring.writer.semaphore.acquire();
        }
    }

    /// Publish everything written since the previous publish.
    fn publish(&mut self) {
        self.ring
            .writer
            .pos
            .store(self.window.base + self.window.begin, Ordering::Release);
        if self.ring.writer.signal.swap(false, Ordering::SeqCst) {
            self.ring.reader.semaphore.release();
        }
    }
}

/// The consuming endpoint.
pub struct Receiver<T> {
    ring: Arc<Ring>,
    window: Window,
    records: PhantomData<fn() -> T>,
}

unsafe impl<T: Send> Send for Receiver<T> {}

impl<T: Send> Receiver<T> {
    /// Move the next record out of the ring, blocking while it is empty.
    pub fn recv(&mut self) -> T {
        let src = self.prepare(size_of::<T>(), align_of::<T>());
        let record = unsafe { std::ptr::read(src.cast::<T>()) };
        self.release();
        record
    }

    fn prepare(&mut self, bytes: usize, alignment: usize) -> *mut u8 {
        let mut begin = align_up(self.window.begin, alignment);
        let mut end = begin + bytes;
        if end > self.window.end {
            (begin, end) = self.reserve(begin, end);
        }
        self.window.begin = end;
        unsafe { self.ring.buffer.add(begin) }
    }

    /// Wait until the producer has published enough bytes.
    fn reserve(&mut self, mut begin: usize, mut end: usize) -> (usize, usize) {
        if end > self.ring.capacity {
            end -= begin;
            begin = 0;
            self.window.base += self.ring.capacity;
        }
        loop {
            let writer = self.ring.writer.pos.load(Ordering::Acquire);
            let available = writer.wrapping_sub(self.window.base);
            if available as isize >= end as isize {
                self.window.end = available.min(self.ring.capacity);
                return (begin, end);
            }
            self.ring.writer.signal.store(true, Ordering::SeqCst);
            if writer != self.ring.writer.pos.load(Ordering::Relaxed)
                && self.ring.writer.signal.swap(false, Ordering::SeqCst)
            {
                // the producer published between arming and sleeping
                continue;
            }
            self.ring.reader.semaphore.acquire();
        }
    }

    /// Hand the consumed bytes back to the producer.
    fn release(&mut self) {
        self.ring
            .reader
            .pos
            .store(self.window.base + self.window.begin, Ordering::Release);
        if self.ring.reader.signal.swap(false, Ordering::SeqCst) {
            self.ring.writer.semaphore.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn delivers_in_order_across_threads() {
        let (mut tx, mut rx) = ring::<u64>(64);
        let producer = thread::spawn(move || {
            for i in 0..100_000u64 {
                tx.send(i);
            }
        });
        for i in 0..100_000u64 {
            assert_eq!(rx.recv(), i);
        }
        producer.join().expect("producer");
    }

    #[test]
    fn moves_owned_batches() {
        let (mut tx, mut rx) = ring::<Vec<usize>>(128);
        let producer = thread::spawn(move || {
            for lo in (0..10_000).step_by(100) {
                tx.send((lo..lo + 100).collect());
            }
        });
        let mut all = Vec::new();
        for _ in 0..100 {
            let batch: Vec<usize> = rx.recv();
            assert_eq!(batch.len(), 100);
            all.extend(batch);
        }
        producer.join().expect("producer");
        assert_eq!(all, (0..10_000).collect::<Vec<_>>());
    }

    #[test]
    fn carries_tagged_records() {
        enum Note {
            Data(Vec<u8>),
            Stop,
        }
        let (mut tx, mut rx) = ring::<Note>(256);
        let producer = thread::spawn(move || {
            for i in 0..50u8 {
                tx.send(Note::Data(vec![i; 3]));
            }
            tx.send(Note::Stop);
        });
        let mut seen = 0u8;
        loop {
            match rx.recv() {
                Note::Stop => break,
                Note::Data(v) => {
                    assert_eq!(v, vec![seen; 3]);
                    seen += 1;
                }
            }
        }
        assert_eq!(seen, 50);
        producer.join().expect("producer");
    }

    #[test]
    fn a_full_ring_blocks_then_drains() {
        // capacity fits only a couple of records, forcing wrap and sleep
        let (mut tx, mut rx) = ring::<[u64; 2]>(64);
        let producer = thread::spawn(move || {
            for i in 0..1_000u64 {
                tx.send([i, i * 2]);
            }
        });
        for i in 0..1_000u64 {
            assert_eq!(rx.recv(), [i, i * 2]);
        }
        producer.join().expect("producer");
    }
}
