//! Append-only arena backing the concurrent stack.
//!
//! Slots are addressed by the index handed out at push time. Buckets double
//! in length (64, 128, 256, ...) and are allocated once on first use, so a
//! slot never moves. A slot goes from empty to live once, when its push
//! publishes the item, and from live to dead once, when a removal wins the
//! compare-and-swap on its state. The winner takes the item out of the slot,
//! so a removed value is dropped as soon as the last outside `Arc` goes.
//! The slot itself stays until the arena is dropped.
//!
//! Tombstones are permanent, which makes two shortcuts safe: a floor under
//! which every slot is dead, and one remembered run of dead slots that walks
//! jump over. The run is only touched through `try_lock`, so nobody ever
//! waits on it.

use std::ops::Range;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;

use tracing::trace;

use crate::construct::{Item, TagSet, order_at};

const FIRST_BUCKET_BITS: u32 = 6;
const BUCKETS: usize = (usize::BITS - FIRST_BUCKET_BITS) as usize;
// shorter dead runs are not worth remembering
const MIN_DEAD_RUN: usize = 8;

fn locate(index: usize) -> (usize, usize) {
    let shifted = index + (1 << FIRST_BUCKET_BITS);
    let log = usize::BITS - 1 - shifted.leading_zeros();
    ((log - FIRST_BUCKET_BITS) as usize, shifted - (1 << log))
}

fn bucket_len(bucket: usize) -> usize {
    1 << (bucket as u32 + FIRST_BUCKET_BITS)
}

const EMPTY: u8 = 0;
const LIVE: u8 = 1;
const DEAD: u8 = 2;

struct Slot<V> {
    state: AtomicU8,
    // only held long enough to put the item in, clone it or take it out
    item: Mutex<Option<Arc<Item<V>>>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            item: Mutex::new(None),
        }
    }
}

impl<V> Slot<V> {
    fn item(&self) -> MutexGuard<'_, Option<Arc<Item<V>>>> {
        // nothing panics while the lock is held, a poisoned slot is still sound
        self.item.lock().unwrap_or_else(PoisonError::into_inner)
    }
    fn is_dead(&self) -> bool {
        self.state.load(Ordering::SeqCst) == DEAD
    }
}

pub(crate) struct Arena<V> {
    buckets: [OnceLock<Box<[Slot<V>]>>; BUCKETS],
    // indexes handed out so far
    reserved: AtomicUsize,
    // every slot below the floor is tombstoned
    floor: AtomicUsize,
    dead_run: Mutex<Range<usize>>,
    live: AtomicUsize,
}

impl<V> Arena<V> {
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| OnceLock::new()),
            reserved: AtomicUsize::new(0),
            floor: AtomicUsize::new(0),
            dead_run: Mutex::new(0..0),
            live: AtomicUsize::new(0),
        }
    }

    /// Publishes a new item on top and returns its order key.
    pub fn append(&self, value: V, tags: TagSet) -> u64 {
        let index = self.reserved.fetch_add(1, Ordering::SeqCst);
        let (bucket, offset) = locate(index);
        let slots = self.buckets[bucket]
            .get_or_init(|| (0..bucket_len(bucket)).map(|_| Slot::default()).collect());
        let order = order_at(index);
        // counted before it becomes visible, so a racing tombstone cannot underflow
        self.live.fetch_add(1, Ordering::SeqCst);
        // the index is ours alone, nobody else writes this slot before it is live
        let slot = &slots[offset];
        *slot.item() = Some(Arc::new(Item::new(order, value, tags)));
        slot.state.store(LIVE, Ordering::SeqCst);
        order
    }

    /// Waits until the item for a reserved index has been published.
    fn published(&self, index: usize) -> &Slot<V> {
        let (bucket, offset) = locate(index);
        loop {
            if let Some(slots) = self.buckets[bucket].get() {
                let slot = &slots[offset];
                if slot.state.load(Ordering::SeqCst) != EMPTY {
                    return slot;
                }
            }
            thread::yield_now();
        }
    }

    /// Kills a published slot and hands its item to the caller. Exactly one
    /// caller gets `Some`.
    pub fn tombstone(&self, index: usize) -> Option<Arc<Item<V>>> {
        let slot = self.published(index);
        slot.state
            .compare_exchange(LIVE, DEAD, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        self.live.fetch_sub(1, Ordering::SeqCst);
        slot.item().take()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::SeqCst)
    }

    fn raise_floor(&self, floor: usize) {
        let previous = self.floor.fetch_max(floor, Ordering::SeqCst);
        if previous < floor {
            trace!(from = previous, to = floor, "raised arena floor");
        }
    }

    fn dead_run(&self) -> Option<Range<usize>> {
        let run = self.dead_run.try_lock().ok()?.clone();
        (!run.is_empty()).then_some(run)
    }

    fn remember_dead_run(&self, run: Range<usize>) {
        let Ok(mut current) = self.dead_run.try_lock() else {
            return;
        };
        if run.start <= current.end && current.start <= run.end {
            *current = run.start.min(current.start)..run.end.max(current.end);
        } else if run.end > current.end {
            // pops work at the top, so the higher run is the useful one
            *current = run;
        }
    }

    /// Walks the live slots from the current top down to the floor.
    pub fn walk(&self) -> Walk<'_, V> {
        let top = self.reserved();
        Walk {
            arena: self,
            next: top,
            floor: self.floor.load(Ordering::SeqCst),
            skip: self.dead_run(),
            dead_above: None,
            lowest_live: top,
            finished: false,
        }
    }
}

/// Downward walk over a snapshot `[floor, top)` of the arena. Yields the
/// index and a handle on the item of every slot that is live at the moment
/// it is visited.
pub(crate) struct Walk<'a, V> {
    arena: &'a Arena<V>,
    next: usize,
    floor: usize,
    skip: Option<Range<usize>>,
    // upper end of the dead slots visited since the last live one
    dead_above: Option<usize>,
    lowest_live: usize,
    finished: bool,
}

impl<V> Iterator for Walk<'_, V> {
    type Item = (usize, Arc<Item<V>>);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next > self.floor {
            if let Some(run) = &self.skip {
                if run.start < self.next && self.next <= run.end {
                    self.dead_above.get_or_insert(self.next);
                    self.next = run.start.max(self.floor);
                    self.skip = None;
                    continue;
                }
            }
            self.next -= 1;
            let slot = self.arena.published(self.next);
            // a slot killed between the state check and the lock has no item left
            let item = if slot.is_dead() { None } else { slot.item().clone() };
            let Some(item) = item else {
                self.dead_above.get_or_insert(self.next + 1);
                continue;
            };
            if let Some(end) = self.dead_above.take() {
                if end - (self.next + 1) >= MIN_DEAD_RUN {
                    self.arena.remember_dead_run(self.next + 1..end);
                }
            }
            self.lowest_live = self.next;
            return Some((self.next, item));
        }
        if !self.finished {
            self.finished = true;
            // tombstones are permanent, so all we saw under lowest_live stays dead
            self.arena.raise_floor(self.lowest_live);
        }
        None
    }
}
