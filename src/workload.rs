//! Multi-threaded push-then-drain workload.
//!
//! Every worker owns one tag. It pushes its values, checks the count, then
//! drains them through its own cursor, removing each item as it goes and
//! checking that they come back newest first. Workers run side by side on
//! one shared stack, so their items interleave in the arena.

use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::concurrent::ConcurrentTagStack;
use crate::construct::Tag;
use crate::error::{Result, TagStackError};
use crate::query::Query;
use crate::settings::StressSettings;
use crate::stack::StackCursor;

#[derive(Debug, Clone)]
pub struct WorkloadReport {
    pub threads: usize,
    pub items_per_thread: usize,
    pub elapsed: Duration,
}

// chance that a worker yields before a push or a removal
const YIELD_CHANCE: f64 = 0.25;

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(TagStackError::Invariant(message()))
    }
}

fn drain_own(stack: &ConcurrentTagStack<usize>, worker: usize, items: usize) -> Result<()> {
    let tags = Tag::set_of([format!("worker-{worker}")])?;
    let query = Query::all_tags(tags.clone());
    let mut rng = SmallRng::seed_from_u64(worker as u64);

    check(stack.size(&query)? == 0, || {
        format!("worker {worker} found items before pushing")
    })?;
    for value in 0..items {
        if rng.gen_bool(YIELD_CHANCE) {
            thread::yield_now();
        }
        stack.push(value, tags.clone())?;
    }
    let pushed = stack.size(&query)?;
    check(pushed == items, || {
        format!("worker {worker} counted {pushed} of its {items} items")
    })?;

    let mut cursor = stack.cursor(query.clone())?;
    for expected in (0..items).rev() {
        let item = cursor.next().ok_or_else(|| {
            TagStackError::Invariant(format!("worker {worker} ran out before {expected}"))
        })?;
        check(*item.value() == expected, || {
            format!("worker {worker} expected {expected}, got {}", item.value())
        })?;
        if rng.gen_bool(YIELD_CHANCE) {
            thread::yield_now();
        }
        cursor.remove()?;
    }
    check(cursor.next().is_none(), || {
        format!("worker {worker} saw more than {items} items")
    })?;

    let left = stack.size(&query)?;
    check(left == 0 && stack.is_empty(&query)?, || {
        format!("worker {worker} left {left} items behind")
    })?;
    debug!(worker, items, "worker drained");
    Ok(())
}

pub fn run_tagged_drain(
    stack: &ConcurrentTagStack<usize>,
    settings: &StressSettings,
) -> Result<WorkloadReport> {
    let threads = settings.thread_count();
    let items = settings.items_per_thread;
    let barrier = Barrier::new(threads);
    info!(stack = stack.name(), threads, items, "starting tagged drain");

    let started = Instant::now();
    let outcomes: Vec<Result<()>> = thread::scope(|s| {
        let workers: Vec<_> = (0..threads)
            .map(|worker| {
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    drain_own(stack, worker, items)
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| {
                worker.join().unwrap_or_else(|_| {
                    Err(TagStackError::Invariant("worker panicked".to_string()))
                })
            })
            .collect()
    });
    let elapsed = started.elapsed();
    outcomes.into_iter().collect::<Result<Vec<()>>>()?;

    info!(
        ms = elapsed.as_secs_f64() * 1000.0,
        threads,
        items,
        "tagged drain complete"
    );
    Ok(WorkloadReport {
        threads,
        items_per_thread: items,
        elapsed,
    })
}
