//! Concurrent strategy: one engine shared by reference between threads.
//!
//! * Push takes the next arena index with a single `fetch_add`, which is the
//!   linearization point and fixes the order key.
//! * Removal (pop, cursor removal, clear) is a compare-and-swap on the slot
//!   state. When two callers race for one item exactly one wins and takes
//!   the item out of the arena, the other sees
//!   [`TagStackError::AlreadyRemoved`] (cursors) or moves on to the next
//!   candidate (pop). A removed value is dropped once the last `Arc` handed
//!   out for it goes away.
//! * Size, peek and cursors walk `[floor, top)` where `top` is read when
//!   the walk starts. Slots reserved below `top` but not yet published are
//!   waited for, so every push that completed before the walk started is
//!   seen. Pushes that start later are not.
//!
//! Locks are per slot and only held to clone or take one `Arc`, apart from
//! the allocation of a new arena bucket. Closing is not meant to race with
//! other calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use crate::arena::{Arena, Walk};
use crate::construct::{Item, TagSet, order_at};
use crate::error::{Result, TagStackError};
use crate::query::Query;
use crate::settings::Settings;
use crate::stack::{StackCursor, TagStack, closed, generated_name};

pub struct ConcurrentTagStack<V> {
    name: String,
    arena: Arena<V>,
    closed: AtomicBool,
}

impl<V> ConcurrentTagStack<V> {
    pub fn new() -> Self {
        Self::named(generated_name())
    }
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(stack = %name, "created concurrent stack");
        Self {
            name,
            arena: Arena::new(),
            closed: AtomicBool::new(false),
        }
    }
    pub fn from_settings(settings: &Settings) -> Self {
        match &settings.name {
            Some(name) => Self::named(name.clone()),
            None => Self::new(),
        }
    }
    /// A named stack seeded with `items`, the last one ending up on top.
    pub fn with_items<I>(name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = (V, TagSet)>,
    {
        let stack = Self::named(name);
        for (value, tags) in items {
            stack.arena.append(value, tags);
        }
        stack
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(closed(&self.name));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
    /// Live items regardless of tags. A plain counter read, so under
    /// concurrent use it is only a hint.
    pub fn len(&self) -> usize {
        self.arena.live()
    }

    pub fn push(&self, value: V, tags: TagSet) -> Result<()> {
        self.check_open()?;
        let order = self.arena.append(value, tags);
        trace!(stack = %self.name, order, "pushed");
        Ok(())
    }
    pub fn push_all<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = (V, TagSet)>,
    {
        for (value, tags) in items {
            self.push(value, tags)?;
        }
        Ok(())
    }
    pub fn pop(&self) -> Result<Option<Arc<Item<V>>>> {
        self.pop_matching(&Query::everything())
    }
    pub fn pop_matching(&self, query: &Query) -> Result<Option<Arc<Item<V>>>> {
        self.check_open()?;
        for (index, item) in self.arena.walk() {
            if !item.matches(query) {
                continue;
            }
            // losing the race just means the next candidate is ours to try
            if let Some(taken) = self.arena.tombstone(index) {
                return Ok(Some(taken));
            }
        }
        Ok(None)
    }
    pub fn peek(&self, query: &Query, depth: usize) -> Result<Option<Arc<Item<V>>>> {
        self.check_open()?;
        Ok(self
            .arena
            .walk()
            .filter(|(_, item)| item.matches(query))
            .nth(depth)
            .map(|(_, item)| item))
    }
    pub fn size(&self, query: &Query) -> Result<usize> {
        self.check_open()?;
        Ok(self
            .arena
            .walk()
            .filter(|(_, item)| item.matches(query))
            .count())
    }
    pub fn is_empty(&self, query: &Query) -> Result<bool> {
        Ok(self.peek(query, 0)?.is_none())
    }
    pub fn cursor(&self, query: Query) -> Result<ConcurrentCursor<'_, V>> {
        self.check_open()?;
        Ok(ConcurrentCursor {
            stack: self,
            walk: self.arena.walk(),
            query,
            last: None,
        })
    }
    pub fn for_each<F>(&self, query: Query, mut action: F) -> Result<()>
    where
        F: FnMut(&Item<V>),
    {
        for item in self.cursor(query)? {
            action(&item);
        }
        Ok(())
    }
    pub fn clear(&self, query: &Query) -> Result<usize> {
        self.check_open()?;
        let removed = self
            .arena
            .walk()
            .filter(|(index, item)| item.matches(query) && self.arena.tombstone(*index).is_some())
            .count();
        debug!(stack = %self.name, %query, removed, "cleared");
        Ok(removed)
    }
    /// Marks the stack closed and removes everything still live, dropping
    /// every value nobody else holds. Must not run concurrently with other
    /// operations on this stack. A second call returns `Ok(())` without
    /// doing anything.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let released = self
            .arena
            .walk()
            .filter(|(index, _)| self.arena.tombstone(*index).is_some())
            .count();
        debug!(stack = %self.name, released, "closed concurrent stack");
        Ok(())
    }
}

impl<V> Default for ConcurrentTagStack<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for ConcurrentTagStack<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ConcurrentTagStack")
            .field("name", &self.name)
            .field("live", &self.arena.live())
            .field("reserved", &self.arena.reserved())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<V> TagStack<V> for ConcurrentTagStack<V> {
    type Cursor<'s>
        = ConcurrentCursor<'s, V>
    where
        Self: 's;

    fn name(&self) -> &str {
        &self.name
    }
    fn is_closed(&self) -> bool {
        ConcurrentTagStack::is_closed(self)
    }
    fn len(&self) -> usize {
        ConcurrentTagStack::len(self)
    }
    fn push(&mut self, value: V, tags: TagSet) -> Result<()> {
        ConcurrentTagStack::push(self, value, tags)
    }
    fn pop(&mut self) -> Result<Option<Arc<Item<V>>>> {
        ConcurrentTagStack::pop(self)
    }
    fn pop_matching(&mut self, query: &Query) -> Result<Option<Arc<Item<V>>>> {
        ConcurrentTagStack::pop_matching(self, query)
    }
    fn peek(&self, query: &Query, depth: usize) -> Result<Option<Arc<Item<V>>>> {
        ConcurrentTagStack::peek(self, query, depth)
    }
    fn size(&self, query: &Query) -> Result<usize> {
        ConcurrentTagStack::size(self, query)
    }
    fn cursor(&mut self, query: Query) -> Result<ConcurrentCursor<'_, V>> {
        ConcurrentTagStack::cursor(self, query)
    }
    fn clear(&mut self, query: &Query) -> Result<usize> {
        ConcurrentTagStack::clear(self, query)
    }
    /// Exclusive access lets closing also hand the slot memory back.
    fn close(&mut self) -> Result<()> {
        ConcurrentTagStack::close(self)?;
        self.arena = Arena::new();
        Ok(())
    }
}

/// Cursor over a [`ConcurrentTagStack`]. Sees the items that were pushed
/// before it was created and skips those removed before it reaches them.
pub struct ConcurrentCursor<'s, V> {
    stack: &'s ConcurrentTagStack<V>,
    walk: Walk<'s, V>,
    query: Query,
    last: Option<usize>,
}

impl<V> Iterator for ConcurrentCursor<'_, V> {
    type Item = Arc<Item<V>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stack.is_closed() {
            self.last = None;
            return None;
        }
        let query = &self.query;
        let Some((index, item)) = self.walk.find(|(_, item)| item.matches(query)) else {
            // an exhausted cursor has nothing left to remove
            self.last = None;
            return None;
        };
        self.last = Some(index);
        Some(item)
    }
}

impl<V> StackCursor<V> for ConcurrentCursor<'_, V> {
    fn query(&self) -> &Query {
        &self.query
    }
    fn remove(&mut self) -> Result<()> {
        self.stack.check_open()?;
        let index = self.last.take().ok_or_else(|| {
            TagStackError::CursorProtocol("remove() without a preceding next()".to_string())
        })?;
        if self.stack.arena.tombstone(index).is_some() {
            return Ok(());
        }
        let order = order_at(index);
        debug!(stack = %self.stack.name, order, "lost removal race");
        Err(TagStackError::AlreadyRemoved { order })
    }
}
