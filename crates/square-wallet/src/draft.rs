//! Post drafts
//!
//! A draft is the body plus the tag set every Public Square post declares.

use crate::error::SubmissionFailure;
use serde::{Deserialize, Serialize};
use square_ledger::{Tag, APP_NAME, APP_NAME_TAG, CONTENT_TYPE, CONTENT_TYPE_TAG, TOPIC_TAG};

/// Tag carrying the protocol version
pub const VERSION_TAG: &str = "Version";

/// Public Square protocol version written by this client
pub const PROTOCOL_VERSION: &str = "1.0.1";

/// Tag carrying the record kind
pub const TYPE_TAG: &str = "Type";

const POST_TYPE: &str = "post";

/// Unsigned post awaiting submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    /// Plain-text body
    pub body: String,
    /// Optional topic
    pub topic: Option<String>,
}

impl PostDraft {
    /// Draft without topic
    #[inline]
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            topic: None,
        }
    }

    /// With topic; blank topics are dropped
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        let trimmed = topic.trim();
        self.topic = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Reject drafts the wallet should never see
    pub fn validate(&self) -> Result<(), SubmissionFailure> {
        if self.body.trim().is_empty() {
            return Err(SubmissionFailure::EmptyBody);
        }
        Ok(())
    }

    /// Tags declared on the transaction
    #[must_use]
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags = vec![
            Tag::new(APP_NAME_TAG, APP_NAME),
            Tag::new(CONTENT_TYPE_TAG, CONTENT_TYPE),
            Tag::new(VERSION_TAG, PROTOCOL_VERSION),
            Tag::new(TYPE_TAG, POST_TYPE),
        ];
        if let Some(topic) = &self.topic {
            tags.push(Tag::new(TOPIC_TAG, topic.clone()));
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn draft_tags_carry_protocol() {
        let tags = PostDraft::new("gm").tags();

        assert_eq!(tags.len(), 4);
        assert_eq!(tags[0], Tag::new(APP_NAME_TAG, APP_NAME));
        assert_eq!(tags[1], Tag::new(CONTENT_TYPE_TAG, CONTENT_TYPE));
        assert!(tags.iter().all(|t| t.name != TOPIC_TAG));
    }

    #[test]
    fn topic_is_trimmed_and_tagged() {
        let draft = PostDraft::new("gm").with_topic("  arweave ");

        assert_eq!(draft.topic.as_deref(), Some("arweave"));
        assert_eq!(draft.tags().last(), Some(&Tag::new(TOPIC_TAG, "arweave")));
    }

    #[test]
    fn blank_topic_is_dropped() {
        let draft = PostDraft::new("gm").with_topic("   ");
        assert_eq!(draft.topic, None);
    }

    #[test]
    fn empty_body_is_rejected() {
        assert!(matches!(
            PostDraft::new("  ").validate(),
            Err(SubmissionFailure::EmptyBody)
        ));
        assert!(PostDraft::new("gm").validate().is_ok());
    }
}
