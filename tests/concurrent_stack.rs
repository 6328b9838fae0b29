use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tagstack::settings::Settings;
use tagstack::{ConcurrentTagStack, Query, StackCursor, Tag, TagSet, TagStack, TagStackError};

fn tagged(names: &[&str]) -> TagSet {
    Tag::set_of(names.iter().copied()).unwrap()
}

#[test]
fn racing_removals_delete_a_shared_item_once() {
    let stack = ConcurrentTagStack::named("race");
    stack.push("left only", tagged(&["left"])).unwrap();
    stack.push("shared", tagged(&["left", "right"])).unwrap();
    stack.push("right only", tagged(&["right"])).unwrap();

    let mut left = stack.cursor(Query::any_tag(tagged(&["left"]))).unwrap();
    let mut right = stack.cursor(Query::any_tag(tagged(&["right"]))).unwrap();
    assert_eq!(*left.next().unwrap().value(), "shared");
    assert_eq!(*right.next().unwrap().value(), "right only");
    assert_eq!(*right.next().unwrap().value(), "shared");

    assert!(left.remove().is_ok());
    match right.remove() {
        Err(TagStackError::AlreadyRemoved { order }) => assert_eq!(order, u64::MAX - 1),
        other => panic!("expected AlreadyRemoved, got {other:?}"),
    }
    // the loser may not remove it a second time either
    assert!(matches!(right.remove(), Err(TagStackError::CursorProtocol(_))));
    assert_eq!(stack.size(&Query::everything()).unwrap(), 2);
    assert_eq!(stack.len(), 2);
}

#[test]
fn racing_threads_delete_a_shared_item_once() {
    for round in 0..200 {
        let stack = ConcurrentTagStack::named(format!("race-{round}"));
        stack.push(round, tagged(&["a", "b"])).unwrap();
        let barrier = Barrier::new(2);
        let wins = AtomicUsize::new(0);
        let already_removed = AtomicUsize::new(0);
        thread::scope(|s| {
            for tag in ["a", "b"] {
                let (stack, barrier) = (&stack, &barrier);
                let (wins, already_removed) = (&wins, &already_removed);
                s.spawn(move || {
                    let mut cursor = stack.cursor(Query::all_tags(tagged(&[tag]))).unwrap();
                    let seen = cursor.next();
                    barrier.wait();
                    if seen.is_some() {
                        match cursor.remove() {
                            Ok(()) => wins.fetch_add(1, Ordering::SeqCst),
                            Err(TagStackError::AlreadyRemoved { .. }) => {
                                already_removed.fetch_add(1, Ordering::SeqCst)
                            }
                            Err(e) => panic!("unexpected {e}"),
                        };
                    }
                });
            }
        });
        assert_eq!(wins.load(Ordering::SeqCst), 1, "round {round}");
        assert_eq!(already_removed.load(Ordering::SeqCst), 1, "round {round}");
        assert!(stack.is_empty(&Query::everything()).unwrap());
    }
}

#[test]
fn cursor_skips_items_removed_before_it_gets_there() {
    let stack = ConcurrentTagStack::named("skip");
    for i in 0..10 {
        stack.push(i, TagSet::new()).unwrap();
    }
    let mut cursor = stack.cursor(Query::everything()).unwrap();
    assert_eq!(*cursor.next().unwrap().value(), 9);
    // a second handle takes 8 and 5 away ahead of the first
    let mut other = stack.cursor(Query::everything()).unwrap();
    for _ in 0..5 {
        let item = other.next().unwrap();
        if *item.value() == 8 || *item.value() == 5 {
            other.remove().unwrap();
        }
    }
    let rest: Vec<i32> = cursor.map(|item| *item.value()).collect();
    assert_eq!(rest, [7, 6, 4, 3, 2, 1, 0]);
}

#[test]
fn pop_drains_a_deep_stack_newest_first() {
    let stack = ConcurrentTagStack::named("deep");
    let total = 50_000;
    stack.push_all((0..total).map(|i| (i, TagSet::new()))).unwrap();
    let mut expected = total;
    while let Some(item) = stack.pop().unwrap() {
        expected -= 1;
        assert_eq!(*item.value(), expected);
    }
    assert_eq!(expected, 0);
    assert!(stack.is_empty(&Query::everything()).unwrap());
}

#[test]
fn cursor_does_not_see_later_pushes() {
    let stack = ConcurrentTagStack::named("snapshot");
    stack.push(1, TagSet::new()).unwrap();
    stack.push(2, TagSet::new()).unwrap();
    let cursor = stack.cursor(Query::everything()).unwrap();
    stack.push(3, TagSet::new()).unwrap();
    let seen: Vec<i32> = cursor.map(|item| *item.value()).collect();
    assert_eq!(seen, [2, 1]);
    assert_eq!(stack.size(&Query::everything()).unwrap(), 3);
}

#[test]
fn concurrent_pushes_lose_nothing() {
    let stack = Arc::new(ConcurrentTagStack::named("pushers"));
    let threads = 8;
    let per_thread = 10_000;
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let stack = Arc::clone(&stack);
            thread::spawn(move || {
                let tags = tagged(&[format!("t{t}").as_str()]);
                for i in 0..per_thread {
                    stack.push(t * per_thread + i, tags.clone()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(stack.size(&Query::everything()).unwrap(), threads * per_thread);
    let mut orders = HashSet::new();
    let mut values = HashSet::new();
    for item in stack.cursor(Query::everything()).unwrap() {
        assert!(orders.insert(item.order()), "duplicate order {}", item.order());
        values.insert(*item.value());
    }
    assert_eq!(values.len(), threads * per_thread);
    for t in 0..threads {
        // each thread's own items come back in reverse push order
        let own: Vec<usize> = stack
            .cursor(Query::all_tags(tagged(&[format!("t{t}").as_str()])))
            .unwrap()
            .map(|item| *item.value())
            .collect();
        let expected: Vec<usize> = (0..per_thread).rev().map(|i| t * per_thread + i).collect();
        assert_eq!(own, expected);
    }
}

#[test]
fn size_during_concurrent_pops_never_overcounts() {
    let stack = ConcurrentTagStack::named("popping");
    let total = 20_000;
    stack
        .push_all((0..total).map(|i| (i, tagged(&["x"]))))
        .unwrap();
    thread::scope(|s| {
        let popper = s.spawn(|| {
            let mut popped = 0;
            while stack.pop().unwrap().is_some() {
                popped += 1;
            }
            popped
        });
        let mut last = total;
        while !popper.is_finished() {
            let size = stack.size(&Query::all_tags(tagged(&["x"]))).unwrap();
            assert!(size <= last, "size went up from {last} to {size}");
            last = size;
        }
        assert_eq!(popper.join().unwrap(), total);
    });
    assert_eq!(stack.size(&Query::everything()).unwrap(), 0);
}

#[test]
fn close_through_shared_reference() {
    let stack = Arc::new(ConcurrentTagStack::named("shared-close"));
    stack.push(1, TagSet::new()).unwrap();
    stack.push(2, TagSet::new()).unwrap();
    let mut cursor = stack.cursor(Query::everything()).unwrap();
    assert!(cursor.next().is_some());
    stack.close().unwrap();
    assert!(stack.close().is_ok());
    assert!(cursor.next().is_none());
    assert!(matches!(cursor.remove(), Err(TagStackError::Closed { .. })));
    assert!(matches!(stack.push(3, TagSet::new()), Err(TagStackError::Closed { .. })));
    assert_eq!(stack.len(), 0);
}

struct Counted(Arc<AtomicUsize>);

impl Drop for Counted {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn shared_close_drops_live_values() {
    let dropped = Arc::new(AtomicUsize::new(0));
    let stack = Arc::new(ConcurrentTagStack::named("shared-drops"));
    for _ in 0..100 {
        stack.push(Counted(Arc::clone(&dropped)), TagSet::new()).unwrap();
    }
    let popped = stack.pop().unwrap().expect("non-empty");
    let peeked = stack.peek(&Query::everything(), 0).unwrap().expect("non-empty");
    let other = Arc::clone(&stack);
    thread::spawn(move || other.close().unwrap()).join().unwrap();
    // everything but the two handles still held out here is gone
    assert_eq!(dropped.load(Ordering::SeqCst), 98);
    drop(popped);
    drop(peeked);
    assert_eq!(dropped.load(Ordering::SeqCst), 100);
}

#[test]
fn exclusive_close_releases_everything() {
    let mut stack = ConcurrentTagStack::with_items("exclusive", (0..100).map(|i| (i, TagSet::new())));
    assert_eq!(stack.len(), 100);
    TagStack::close(&mut stack).unwrap();
    TagStack::close(&mut stack).unwrap();
    assert!(stack.is_closed());
    assert_eq!(stack.len(), 0);
    assert!(stack.pop().is_err());
}

#[test]
fn settings_name_the_stack() {
    let settings = Settings::from_toml("name = \"from-settings\"").unwrap();
    let stack: ConcurrentTagStack<u8> = ConcurrentTagStack::from_settings(&settings);
    assert_eq!(stack.name(), "from-settings");
    let unnamed: ConcurrentTagStack<u8> = ConcurrentTagStack::from_settings(&Settings::default());
    assert!(unnamed.name().starts_with("tagstack-"));
}
