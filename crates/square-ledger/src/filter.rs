//! Query builder
//!
//! Turns a caller's page request into the structured filter the query
//! service understands. Every filter carries the Public Square protocol tag
//! and the plain-text content type; author and topic constraints are optional.

use crate::types::{Address, RawRecord};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Largest page the query service returns
pub const MAX_PAGE_SIZE: u32 = 100;

/// Tag naming the application protocol
pub const APP_NAME_TAG: &str = "App-Name";

/// Protocol identifier of Public Square posts
pub const APP_NAME: &str = "PublicSquare";

/// Tag carrying the body's media type
pub const CONTENT_TYPE_TAG: &str = "Content-Type";

/// Media type of Public Square post bodies
pub const CONTENT_TYPE: &str = "text/plain";

/// Tag carrying a post's topic
pub const TOPIC_TAG: &str = "Topic";

/// Tag constraint: the named tag must carry one of `values`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    /// Tag name
    pub name: String,
    /// Accepted values
    pub values: Vec<String>,
}

impl TagFilter {
    /// Constraint accepting a single value
    #[inline]
    #[must_use]
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }
}

/// Structured filter sent to the query service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDescription {
    first: u32,
    owners: Vec<Address>,
    tags: Vec<TagFilter>,
}

impl FilterDescription {
    /// Unconstrained filter for a page of `first` records, clamped to
    /// [`MAX_PAGE_SIZE`]
    #[inline]
    #[must_use]
    pub fn new(first: u32) -> Self {
        Self {
            first: first.min(MAX_PAGE_SIZE),
            owners: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Restrict to records owned by `owner`
    #[inline]
    #[must_use]
    pub fn with_owner(mut self, owner: Address) -> Self {
        self.owners.push(owner);
        self
    }

    /// Require tag `name` to equal `value`
    #[inline]
    #[must_use]
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(TagFilter::single(name, value));
        self
    }

    /// Page size
    #[inline]
    #[must_use]
    pub fn first(&self) -> u32 {
        self.first
    }

    /// Owner constraint (empty means any owner)
    #[inline]
    #[must_use]
    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    /// Tag constraints
    #[inline]
    #[must_use]
    pub fn tags(&self) -> &[TagFilter] {
        &self.tags
    }

    /// Whether the filter requires tag `name` to equal `value`
    #[must_use]
    pub fn requires_tag(&self, name: &str, value: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.name == name && t.values.len() == 1 && t.values[0] == value)
    }

    /// Whether `record` satisfies every constraint
    ///
    /// Mirrors the query service: a tag constraint matches when any tag of
    /// that name carries an accepted value.
    #[must_use]
    pub fn matches(&self, record: &RawRecord) -> bool {
        let owner_ok = self.owners.is_empty() || self.owners.contains(&record.owner);
        owner_ok
            && self
                .tags
                .iter()
                .all(|t| record.tags.contains_any(&t.name, &t.values))
    }

    /// GraphQL variables for [`crate::TRANSACTIONS_QUERY`]
    #[must_use]
    pub fn to_variables(&self) -> Value {
        let owners = if self.owners.is_empty() {
            Value::Null
        } else {
            json!(self.owners)
        };

        json!({
            "first": self.first,
            "owners": owners,
            "tags": self.tags,
        })
    }
}

/// Caller-facing page request for Public Square posts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilter {
    /// Requested page size, defaults to [`MAX_PAGE_SIZE`]
    pub count: Option<u32>,
    /// Only posts by this author
    pub author: Option<Address>,
    /// Only posts tagged with this topic
    pub topic: Option<String>,
}

impl PostFilter {
    /// Request a full page of all posts
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// With author constraint
    #[inline]
    #[must_use]
    pub fn with_author(mut self, author: impl Into<Address>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// With topic constraint
    #[inline]
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Build the filter description
    #[must_use]
    pub fn build(&self) -> FilterDescription {
        let mut description = FilterDescription::new(self.count.unwrap_or(MAX_PAGE_SIZE))
            .with_tag(APP_NAME_TAG, APP_NAME)
            .with_tag(CONTENT_TYPE_TAG, CONTENT_TYPE);

        if let Some(author) = &self.author {
            description = description.with_owner(author.clone());
        }

        if let Some(topic) = &self.topic {
            description = description.with_tag(TOPIC_TAG, topic.clone());
        }

        description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Tags, TxId};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn record(owner: &str, tags: &[(&str, &str)]) -> RawRecord {
        RawRecord {
            id: TxId::new("tx"),
            owner: Address::new(owner),
            block: None,
            data_size: 0,
            tags: tags.iter().copied().collect::<Tags>(),
        }
    }

    #[test]
    fn default_filter_requests_full_page() {
        let description = PostFilter::new().build();

        assert_eq!(description.first(), MAX_PAGE_SIZE);
        assert!(description.owners().is_empty());
        assert_eq!(description.tags().len(), 2);
    }

    #[test]
    fn author_and_topic_add_constraints() {
        let description = PostFilter::new()
            .with_author("abc123")
            .with_topic("arweave")
            .with_count(10)
            .build();

        assert_eq!(description.first(), 10);
        assert_eq!(description.owners(), &[Address::new("abc123")]);
        assert!(description.requires_tag(TOPIC_TAG, "arweave"));
    }

    #[test]
    fn variables_render_null_owners_when_unconstrained() {
        let vars = PostFilter::new().with_count(5).build().to_variables();

        assert_eq!(vars["first"], 5);
        assert!(vars["owners"].is_null());
        assert_eq!(vars["tags"][0]["name"], APP_NAME_TAG);
        assert_eq!(vars["tags"][0]["values"][0], APP_NAME);
    }

    #[test]
    fn variables_list_owners() {
        let vars = PostFilter::new().with_author("abc123").build().to_variables();
        assert_eq!(vars["owners"][0], "abc123");
    }

    #[test]
    fn matches_requires_every_tag() {
        let description = PostFilter::new().with_topic("arweave").build();

        let tagged = record(
            "a",
            &[
                (APP_NAME_TAG, APP_NAME),
                (CONTENT_TYPE_TAG, CONTENT_TYPE),
                (TOPIC_TAG, "arweave"),
            ],
        );
        let untagged = record("a", &[(APP_NAME_TAG, APP_NAME), (CONTENT_TYPE_TAG, CONTENT_TYPE)]);

        assert!(description.matches(&tagged));
        assert!(!description.matches(&untagged));
    }

    #[test]
    fn matches_checks_owner() {
        let description = FilterDescription::new(1).with_owner(Address::new("a"));

        assert!(description.matches(&record("a", &[])));
        assert!(!description.matches(&record("b", &[])));
    }

    proptest! {
        #[test]
        fn prop_page_size_never_exceeds_limit(
            count in proptest::option::of(any::<u32>()),
            author in proptest::option::of("[a-zA-Z0-9_-]{1,43}"),
            topic in proptest::option::of("[a-z]{1,16}"),
        ) {
            let filter = PostFilter { count, author: author.map(Address::new), topic };
            let description = filter.build();

            prop_assert!(description.first() <= MAX_PAGE_SIZE);
            prop_assert!(description.requires_tag(APP_NAME_TAG, APP_NAME));
            prop_assert!(description.requires_tag(CONTENT_TYPE_TAG, CONTENT_TYPE));
        }
    }
}
