//! Single-owner strategy: a plain vector with tombstones and no internal
//! synchronization. Borrowing rules keep it to one thread of control at a
//! time, a cursor holds the stack mutably for as long as it lives.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::construct::{Item, TagSet, order_at};
use crate::error::{Result, TagStackError};
use crate::query::Query;
use crate::stack::{StackCursor, TagStack, closed, generated_name};

// compaction only kicks in once the vector has grown past this
const COMPACTION_THRESHOLD: usize = 64;

#[derive(Debug)]
pub struct LocalTagStack<V> {
    name: String,
    // oldest first, None marks an item removed through a cursor
    slots: Vec<Option<Arc<Item<V>>>>,
    live: usize,
    pushed: usize,
    closed: bool,
}

impl<V> LocalTagStack<V> {
    pub fn new() -> Self {
        Self::named(generated_name())
    }
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(stack = %name, "created local stack");
        Self {
            name,
            slots: Vec::new(),
            live: 0,
            pushed: 0,
            closed: false,
        }
    }
    /// A named stack seeded with `items`, the last one ending up on top.
    pub fn with_items<I>(name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = (V, TagSet)>,
    {
        let mut stack = Self::named(name);
        for (value, tags) in items {
            stack.append(value, tags);
        }
        stack
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(closed(&self.name));
        }
        Ok(())
    }
    fn append(&mut self, value: V, tags: TagSet) {
        let order = order_at(self.pushed);
        self.pushed += 1;
        self.slots.push(Some(Arc::new(Item::new(order, value, tags))));
        self.live += 1;
    }
    fn compact(&mut self) {
        let tombstones = self.slots.len() - self.live;
        if self.slots.len() > COMPACTION_THRESHOLD && tombstones > self.live {
            self.slots.retain(Option::is_some);
            trace!(stack = %self.name, dropped = tombstones, "compacted");
        }
    }
    fn matching(&self, query: &Query) -> impl Iterator<Item = (usize, &Arc<Item<V>>)> {
        self.slots
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(i, slot)| slot.as_ref().map(|item| (i, item)))
            .filter(move |(_, item)| item.matches(query))
    }
    fn take(&mut self, index: usize) -> Option<Arc<Item<V>>> {
        let item = self.slots[index].take()?;
        self.live -= 1;
        Some(item)
    }
}

impl<V> Default for LocalTagStack<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TagStack<V> for LocalTagStack<V> {
    type Cursor<'s>
        = LocalCursor<'s, V>
    where
        Self: 's;

    fn name(&self) -> &str {
        &self.name
    }
    fn is_closed(&self) -> bool {
        self.closed
    }
    fn len(&self) -> usize {
        self.live
    }
    fn push(&mut self, value: V, tags: TagSet) -> Result<()> {
        self.check_open()?;
        self.compact();
        self.append(value, tags);
        Ok(())
    }
    fn pop(&mut self) -> Result<Option<Arc<Item<V>>>> {
        self.check_open()?;
        while let Some(slot) = self.slots.pop() {
            if let Some(item) = slot {
                self.live -= 1;
                return Ok(Some(item));
            }
        }
        Ok(None)
    }
    fn pop_matching(&mut self, query: &Query) -> Result<Option<Arc<Item<V>>>> {
        self.check_open()?;
        let found = self.matching(query).next().map(|(i, _)| i);
        let item = found.and_then(|i| self.take(i));
        // drop trailing tombstones so pop stays cheap
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        Ok(item)
    }
    fn peek(&self, query: &Query, depth: usize) -> Result<Option<Arc<Item<V>>>> {
        self.check_open()?;
        Ok(self
            .matching(query)
            .nth(depth)
            .map(|(_, item)| Arc::clone(item)))
    }
    fn size(&self, query: &Query) -> Result<usize> {
        self.check_open()?;
        Ok(self.matching(query).count())
    }
    fn cursor(&mut self, query: Query) -> Result<LocalCursor<'_, V>> {
        self.check_open()?;
        let position = self.slots.len();
        Ok(LocalCursor {
            stack: self,
            query,
            position,
            last: None,
        })
    }
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let released = self.live;
        self.slots = Vec::new();
        self.live = 0;
        debug!(stack = %self.name, released, "closed local stack");
        Ok(())
    }
}

/// Cursor over a [`LocalTagStack`]; walks slot indexes downward.
#[derive(Debug)]
pub struct LocalCursor<'s, V> {
    stack: &'s mut LocalTagStack<V>,
    query: Query,
    // next slot to look at is position - 1
    position: usize,
    last: Option<usize>,
}

impl<V> Iterator for LocalCursor<'_, V> {
    type Item = Arc<Item<V>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position > 0 {
            self.position -= 1;
            if let Some(item) = &self.stack.slots[self.position] {
                if item.matches(&self.query) {
                    self.last = Some(self.position);
                    return Some(Arc::clone(item));
                }
            }
        }
        // an exhausted cursor has nothing left to remove
        self.last = None;
        None
    }
}

impl<V> StackCursor<V> for LocalCursor<'_, V> {
    fn query(&self) -> &Query {
        &self.query
    }
    fn remove(&mut self) -> Result<()> {
        let index = self.last.take().ok_or_else(|| {
            TagStackError::CursorProtocol("remove() without a preceding next()".to_string())
        })?;
        match self.stack.take(index) {
            Some(_) => Ok(()),
            None => Err(TagStackError::Invariant(format!(
                "slot {index} of '{}' emptied behind a live cursor",
                self.stack.name
            ))),
        }
    }
}
