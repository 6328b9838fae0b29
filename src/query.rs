//! Pure predicates over an item's tag set.
//!
//! A [`Query`] decides which items a size, peek, pop or cursor call sees.
//! Evaluation only looks at the tag set it is given, never at the engine,
//! so the same query can be evaluated from any number of threads.
//!
//! Conventions for an empty tag set argument:
//! * `all_tags(∅)` matches every item (the empty set is a subset of anything).
//! * `any_tag(∅)` matches no item (nothing intersects the empty set).
//! * `none_of_tags(∅)` matches every item.
//!
//! `Query::everything()` is shorthand for `all_tags(∅)`.

use std::fmt;

use crate::construct::{Tag, TagSet};
use crate::error::{Result, TagStackError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    /// Item carries every tag of the set.
    AllOf(TagSet),
    /// Item carries at least one tag of the set.
    AnyOf(TagSet),
    /// Item carries no tag of the set.
    NoneOf(TagSet),
    Not(Box<Query>),
    /// All children hold.
    And(Vec<Query>),
    /// At least one child holds.
    Or(Vec<Query>),
}

impl Query {
    pub fn all_tags(tags: impl Into<TagSet>) -> Self {
        Query::AllOf(tags.into())
    }
    pub fn any_tag(tags: impl Into<TagSet>) -> Self {
        Query::AnyOf(tags.into())
    }
    pub fn none_of_tags(tags: impl Into<TagSet>) -> Self {
        Query::NoneOf(tags.into())
    }
    pub fn everything() -> Self {
        Query::AllOf(TagSet::new())
    }
    /// Shorthand for `all_tags` over a single tag.
    pub fn tagged(tag: &Tag) -> Self {
        Query::AllOf(TagSet::from(tag.clone()))
    }

    pub fn and(self, other: Query) -> Self {
        match self {
            Query::And(mut children) => {
                children.push(other);
                Query::And(children)
            }
            first => Query::And(vec![first, other]),
        }
    }
    pub fn or(self, other: Query) -> Self {
        match self {
            Query::Or(mut children) => {
                children.push(other);
                Query::Or(children)
            }
            first => Query::Or(vec![first, other]),
        }
    }
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        match self {
            Query::Not(inner) => *inner,
            query => Query::Not(Box::new(query)),
        }
    }
    /// Conjunction of several queries. An empty list is rejected.
    pub fn all<I: IntoIterator<Item = Query>>(queries: I) -> Result<Self> {
        let children: Vec<Query> = queries.into_iter().collect();
        if children.is_empty() {
            return Err(TagStackError::Construction(
                "a conjunction needs at least one query".to_string(),
            ));
        }
        Ok(Query::And(children))
    }
    /// Disjunction of several queries. An empty list is rejected.
    pub fn any<I: IntoIterator<Item = Query>>(queries: I) -> Result<Self> {
        let children: Vec<Query> = queries.into_iter().collect();
        if children.is_empty() {
            return Err(TagStackError::Construction(
                "a disjunction needs at least one query".to_string(),
            ));
        }
        Ok(Query::Or(children))
    }

    pub fn evaluate(&self, tags: &TagSet) -> bool {
        match self {
            Query::AllOf(required) => tags.contains_all(required),
            Query::AnyOf(wanted) => tags.contains_any(wanted),
            Query::NoneOf(unwanted) => tags.contains_none(unwanted),
            Query::Not(inner) => !inner.evaluate(tags),
            Query::And(children) => children.iter().all(|child| child.evaluate(tags)),
            Query::Or(children) => children.iter().any(|child| child.evaluate(tags)),
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Query::everything()
    }
}

fn join(f: &mut fmt::Formatter, operator: &str, children: &[Query]) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {operator} ")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Query::AllOf(tags) => write!(f, "all{tags}"),
            Query::AnyOf(tags) => write!(f, "any{tags}"),
            Query::NoneOf(tags) => write!(f, "none{tags}"),
            Query::Not(inner) => write!(f, "not {inner}"),
            Query::And(children) => join(f, "and", children),
            Query::Or(children) => join(f, "or", children),
        }
    }
}
