//! Tagstack – a stack whose items carry tags, queried and drained per tag.
//!
//! Every pushed value travels with an immutable set of tags. Reads and
//! removals are scoped by a [`query::Query`], a pure predicate over that
//! set, and within any query the newest matching item always comes first.
//! * A [`construct::Tag`] is a label compared by name.
//! * A [`construct::TagSet`] is a duplicate-free set of tags, shared by `Arc`.
//! * An [`construct::Item`] couples a value with its tag set and an order key
//!   that shrinks with every push.
//! * A [`query::Query`] combines `all_tags`, `any_tag` and `none_of_tags`
//!   with `and`, `or` and `not`.
//!
//! ## Strategies
//! Both implement [`stack::TagStack`].
//! * [`local::LocalTagStack`] – single owner, no synchronization.
//! * [`concurrent::ConcurrentTagStack`] – shared between threads. Pushes
//!   take an index from an atomic counter, removals flip a tombstone with a
//!   compare-and-swap, and readers never block writers.
//!
//! ## Quick Start
//! ```
//! use tagstack::{ConcurrentTagStack, Query, StackCursor, Tag};
//! let stack = ConcurrentTagStack::named("jobs");
//! let urgent = Tag::set_of(["urgent"]).unwrap();
//! stack.push("a", urgent.clone()).unwrap();
//! stack.push("b", Tag::set_of(["later"]).unwrap()).unwrap();
//! stack.push("c", urgent.clone()).unwrap();
//! let query = Query::all_tags(urgent);
//! assert_eq!(stack.size(&query).unwrap(), 2);
//! let mut cursor = stack.cursor(query.clone()).unwrap();
//! assert_eq!(*cursor.next().unwrap().value(), "c");
//! cursor.remove().unwrap();
//! assert_eq!(*cursor.next().unwrap().value(), "a");
//! drop(cursor);
//! assert_eq!(stack.size(&query).unwrap(), 1);
//! ```
//!
//! ## Closing
//! A closed stack rejects every further operation with
//! [`TagStackError::Closed`]. Closing twice is fine.

mod arena;
pub mod concurrent;
pub mod construct;
pub mod error;
pub mod local;
pub mod query;
pub mod settings;
pub mod stack;
pub mod workload;

pub use concurrent::{ConcurrentCursor, ConcurrentTagStack};
pub use construct::{Item, Tag, TagKeeper, TagSet};
pub use error::{Result, TagStackError};
pub use local::{LocalCursor, LocalTagStack};
pub use query::Query;
pub use stack::{StackCursor, TagStack};
