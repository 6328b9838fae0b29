//! The contract shared by both stack strategies.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::construct::{Item, TagSet};
use crate::error::{Result, TagStackError};
use crate::query::Query;

static NEXT_STACK: AtomicU64 = AtomicU64::new(1);

pub(crate) fn generated_name() -> String {
    format!("tagstack-{}", NEXT_STACK.fetch_add(1, Ordering::Relaxed))
}

pub(crate) fn closed(name: &str) -> TagStackError {
    TagStackError::Closed {
        name: name.to_owned(),
    }
}

/// A stack whose items carry tags, with every read and removal scoped by a
/// [`Query`]. Within any query the newest matching item comes first.
///
/// All operations on a closed stack fail with [`TagStackError::Closed`].
pub trait TagStack<V> {
    type Cursor<'s>: StackCursor<V>
    where
        Self: 's;

    fn name(&self) -> &str;
    fn is_closed(&self) -> bool;
    /// Live items regardless of their tags.
    fn len(&self) -> usize;

    fn push(&mut self, value: V, tags: TagSet) -> Result<()>;
    /// Removes the newest live item, whatever its tags.
    fn pop(&mut self) -> Result<Option<Arc<Item<V>>>>;
    fn pop_matching(&mut self, query: &Query) -> Result<Option<Arc<Item<V>>>>;
    /// The `depth`-th newest item matching `query`, left in place.
    fn peek(&self, query: &Query, depth: usize) -> Result<Option<Arc<Item<V>>>>;
    fn size(&self, query: &Query) -> Result<usize>;
    /// Lazily walks the items matching `query`, newest first.
    fn cursor(&mut self, query: Query) -> Result<Self::Cursor<'_>>;
    /// Closing twice is allowed, the second call does nothing.
    fn close(&mut self) -> Result<()>;

    fn push_all<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = (V, TagSet)>,
    {
        for (value, tags) in items {
            self.push(value, tags)?;
        }
        Ok(())
    }
    fn is_empty(&self, query: &Query) -> Result<bool> {
        Ok(self.peek(query, 0)?.is_none())
    }
    fn for_each<F>(&mut self, query: Query, mut action: F) -> Result<()>
    where
        F: FnMut(&Item<V>),
    {
        for item in self.cursor(query)? {
            action(&item);
        }
        Ok(())
    }
    /// Removes every live item matching `query` and returns how many went.
    fn clear(&mut self, query: &Query) -> Result<usize> {
        let mut cursor = self.cursor(query.clone())?;
        let mut removed = 0;
        while cursor.next().is_some() {
            match cursor.remove() {
                Ok(()) => removed += 1,
                // someone else got there first
                Err(TagStackError::AlreadyRemoved { .. }) => (),
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}

/// Iteration handle over a query-scoped view of a stack.
///
/// `next()` returning `None` means no more items; calling it again keeps
/// returning `None`. [`StackCursor::remove`] deletes the item most recently
/// yielded by this cursor from the stack itself.
pub trait StackCursor<V>: Iterator<Item = Arc<Item<V>>> {
    fn query(&self) -> &Query;
    /// Fails with [`TagStackError::CursorProtocol`] when nothing has been
    /// yielded since the last removal (or at all), and once `next()` has
    /// returned `None`.
    fn remove(&mut self) -> Result<()>;
}
