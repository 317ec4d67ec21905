//! Terminal rendering of posts and identities

use chrono::{DateTime, Utc};
use square_feed::{AuthorIdentity, PostSnapshot, UNCONFIRMED};
use std::fmt::Write;

/// When a post was mined, or `pending`
pub(crate) fn when(snapshot: &PostSnapshot) -> String {
    if snapshot.submitted_at_millis == UNCONFIRMED {
        return "pending".to_string();
    }
    DateTime::<Utc>::from_timestamp_millis(snapshot.submitted_at_millis)
        .map_or_else(|| "pending".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// Multi-line text block for one post
pub(crate) fn post(snapshot: &PostSnapshot) -> String {
    let mut out = String::new();
    let author = snapshot
        .author_display
        .clone()
        .unwrap_or_else(|| snapshot.author.to_string());

    let _ = write!(out, "{author} · {}", when(snapshot));
    if snapshot.confirmation_height != UNCONFIRMED {
        let _ = write!(out, " · block {}", snapshot.confirmation_height);
    }
    if let Some(topic) = &snapshot.topic {
        let _ = write!(out, " · #{topic}");
    }
    let _ = writeln!(out, "\n  id {}", snapshot.id);

    match (&snapshot.body, &snapshot.body_fetch_error) {
        (Some(body), _) => {
            for line in body.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
        (None, Some(err)) => {
            let _ = writeln!(out, "  (body unavailable: {err})");
        }
        (None, None) => {
            let _ = writeln!(out, "  ({} bytes, loading)", snapshot.byte_length);
        }
    }
    out
}

/// One-block summary of an author identity
pub(crate) fn identity(identity: &AuthorIdentity) -> String {
    let mut out = format!("{} ({})", identity.display_name(), identity.handle());
    if let Some(avatar) = identity.avatar_url() {
        let _ = write!(out, "\n  avatar {avatar}");
    }
    if identity.is_fallback() {
        out.push_str("\n  no profile published");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use square_feed::AuthorProfile;
    use square_ledger::{Address, TxId};

    fn snapshot() -> PostSnapshot {
        PostSnapshot {
            id: TxId::new("tx-1"),
            author: Address::new("abc123"),
            topic: Some("arweave".into()),
            confirmation_height: 1_000,
            submitted_at_millis: 1_700_000_000_000,
            byte_length: 5,
            body: Some("hello\nworld".into()),
            body_fetch_error: None,
            author_display: Some("Ada".into()),
        }
    }

    #[test]
    fn confirmed_post_shows_block_and_time() {
        assert_eq!(
            post(&snapshot()),
            "Ada · 2023-11-14 22:13 UTC · block 1000 · #arweave\n  id tx-1\n  hello\n  world\n"
        );
    }

    #[test]
    fn pending_post_without_body() {
        let mut pending = snapshot();
        pending.confirmation_height = UNCONFIRMED;
        pending.submitted_at_millis = UNCONFIRMED;
        pending.topic = None;
        pending.body = None;
        pending.body_fetch_error = Some("content not found".into());
        pending.author_display = None;

        assert_eq!(
            post(&pending),
            "abc123 · pending\n  id tx-1\n  (body unavailable: content not found)\n"
        );
    }

    #[test]
    fn identity_notes_fallback() {
        let fallback = AuthorIdentity::fallback_for(&Address::new("abc123"));
        assert!(identity(&fallback).ends_with("no profile published"));

        let profile = AuthorIdentity::Profile(AuthorProfile {
            display_name: "Ada".into(),
            handle: "@ada".into(),
            avatar_url: Some("https://arweave.net/img".into()),
        });
        assert_eq!(identity(&profile), "Ada (@ada)\n  avatar https://arweave.net/img");
    }
}
