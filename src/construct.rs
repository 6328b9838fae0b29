// a tag set is shared by every item pushed with it, so it lives behind an Arc
use std::sync::Arc;

// tags are kept in hash sets using a fast non-cryptographic hasher
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::hash_set::Iter;
use std::collections::{HashMap, HashSet};

// items are ordered by their order key only
use std::cmp::Ordering;

// used to print out readable forms of a construct
use std::fmt;

// our own stuff that we need
use crate::error::{Result, TagStackError};
use crate::query::Query;

pub type TagHasher = BuildHasherDefault<SeaHasher>;

// ------------- Tag -------------
/// A classification label. Equal names give equal tags, and cloning a tag
/// only bumps a reference count on the shared name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Tag {
    name: Arc<str>,
}

impl Tag {
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(TagStackError::Construction(
                "a tag needs a non-empty name".to_string(),
            ));
        }
        Ok(Self {
            name: Arc::from(name),
        })
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Builds a tag set from names, duplicates collapse into one tag.
    pub fn set_of<I, S>(names: I) -> Result<TagSet>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(Tag::new).collect()
    }
}
impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ------------- TagSet -------------
/// Immutable, duplicate-free set of tags.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct TagSet {
    tags: Arc<HashSet<Tag, TagHasher>>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.tags.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
    pub fn contains(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }
    pub fn iter(&self) -> Iter<'_, Tag> {
        self.tags.iter()
    }
    // The three membership tests below cost O(|required|) lookups.
    pub fn contains_all(&self, required: &TagSet) -> bool {
        required.iter().all(|tag| self.contains(tag))
    }
    pub fn contains_any(&self, wanted: &TagSet) -> bool {
        wanted.iter().any(|tag| self.contains(tag))
    }
    pub fn contains_none(&self, unwanted: &TagSet) -> bool {
        !self.contains_any(unwanted)
    }
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.iter().map(Tag::name).collect();
        names.sort_unstable();
        names
    }
}
impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self {
            tags: Arc::new(iter.into_iter().collect()),
        }
    }
}
impl From<Tag> for TagSet {
    fn from(tag: Tag) -> Self {
        std::iter::once(tag).collect()
    }
}
impl<const N: usize> From<[Tag; N]> for TagSet {
    fn from(tags: [Tag; N]) -> Self {
        tags.into_iter().collect()
    }
}
impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = Iter<'a, Tag>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}}}", self.sorted_names().join(","))
    }
}

// ------------- TagKeeper -------------
/// Interns tags so that every name is allocated once.
#[derive(Debug, Default)]
pub struct TagKeeper {
    kept: HashMap<String, Tag, TagHasher>,
}

impl TagKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the kept tag for `name` and whether it was kept before.
    pub fn keep(&mut self, name: &str) -> Result<(Tag, bool)> {
        if let Some(kept) = self.kept.get(name) {
            return Ok((kept.clone(), true));
        }
        let tag = Tag::new(name)?;
        self.kept.insert(name.to_owned(), tag.clone());
        Ok((tag, false))
    }
    pub fn keep_set<I, S>(&mut self, names: I) -> Result<TagSet>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| self.keep(name.as_ref()).map(|(tag, _)| tag))
            .collect()
    }
    pub fn get(&self, name: &str) -> Option<Tag> {
        self.kept.get(name).cloned()
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- Item -------------
/// The key handed to the first item pushed onto an engine. Every later push
/// gets a strictly smaller key, so sorting by key ascending gives LIFO order.
pub const TOP_ORDER: u64 = u64::MAX;

pub(crate) fn order_at(index: usize) -> u64 {
    TOP_ORDER - index as u64
}

/// A pushed value together with its tags and order key. Never mutated.
#[derive(Debug)]
pub struct Item<V> {
    order: u64,
    tags: TagSet,
    value: V,
}

impl<V> Item<V> {
    pub(crate) fn new(order: u64, value: V, tags: TagSet) -> Self {
        Self { order, tags, value }
    }
    pub fn order(&self) -> u64 {
        self.order
    }
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }
    pub fn value(&self) -> &V {
        &self.value
    }
    pub fn matches(&self, query: &Query) -> bool {
        query.evaluate(&self.tags)
    }
}
impl<V> PartialEq for Item<V> {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}
impl<V> Eq for Item<V> {}
impl<V> Ord for Item<V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order.cmp(&other.order)
    }
}
impl<V> PartialOrd for Item<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<V: fmt::Display> fmt::Display for Item<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}, {}]", self.order, self.tags, self.value)
    }
}
