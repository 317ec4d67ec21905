//! Feed pipeline tests
//!
//! End-to-end runs of load, settle, poll and publish over in-memory services.

use pretty_assertions::assert_eq;
use square_feed::prelude::*;
use square_feed::{AccountProfileLookup, PollError, PollState, ProfileDirectory, ACCOUNT_PROTOCOL, PROTOCOL_NAME_TAG};
use square_ledger::{ContentFetchFailure, TOPIC_TAG};
use square_test_utils::{services, FakeSigner, RecordBuilder, ScriptedLedger, StaticGateway, StaticProfiles};
use square_wallet::{PostDraft, SubmissionFailure};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

fn feed_over(ledger: Arc<ScriptedLedger>, gateway: StaticGateway, profiles: StaticProfiles) -> Feed {
    Feed::new(services(ledger, gateway, profiles), &SquareConfig::default())
}

#[tokio::test]
async fn topic_filter_yields_only_that_topic() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("tx-1", "a").topic("arweave").build(),
        RecordBuilder::new("tx-2", "b").topic("rust").build(),
        RecordBuilder::new("tx-3", "c").topic("arweave").build(),
        RecordBuilder::new("tx-4", "d").build(),
    ]));
    let feed = feed_over(ledger.clone(), StaticGateway::new(), StaticProfiles::new());

    let posts = feed
        .load(&PostFilter::new().with_topic("arweave"))
        .await
        .unwrap();

    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p.topic() == Some("arweave")));
    assert!(ledger.last_filter().unwrap().requires_tag(TOPIC_TAG, "arweave"));
}

#[tokio::test]
async fn author_filter_yields_only_that_author() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("tx-1", "ada").build(),
        RecordBuilder::new("tx-2", "bob").build(),
    ]));
    let feed = feed_over(ledger, StaticGateway::new(), StaticProfiles::new());

    let posts = feed.load(&PostFilter::new().with_author("bob")).await.unwrap();

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].author().as_str(), "bob");
}

#[tokio::test]
async fn records_outside_protocol_are_never_returned() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("tx-1", "a").bare().build(),
        RecordBuilder::new("tx-2", "a").build(),
    ]));
    let feed = feed_over(ledger, StaticGateway::new(), StaticProfiles::new());

    let posts = feed.load(&PostFilter::new()).await.unwrap();

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id().as_str(), "tx-2");
}

#[tokio::test(start_paused = true)]
async fn hanging_body_settles_as_timeout() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("tx-1", "a").build(),
        RecordBuilder::new("tx-2", "a").build(),
    ]));
    let gateway = StaticGateway::new().hang("tx-1").ready("tx-2", "hello");
    let feed = feed_over(ledger, gateway, StaticProfiles::new());

    let posts = feed.load(&PostFilter::new()).await.unwrap();
    let hung = posts[0].settled().await;
    let fine = posts[1].settled().await;

    assert_eq!(hung.body, None);
    assert_eq!(
        posts[0].body_fetch_error(),
        Some(ContentFetchFailure::Timeout { millis: 10_000 })
    );
    assert!(hung.body_fetch_error.is_some());
    assert_eq!(fine.body.as_deref(), Some("hello"));
    assert_eq!(fine.body_fetch_error, None);
}

#[tokio::test]
async fn author_without_profile_gets_abbreviated_address() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("tx-1", "abc123").build(),
        RecordBuilder::new("tx-2", "ada-addr").build(),
    ]));
    let profiles = StaticProfiles::new().with("ada-addr", "Ada", "ada");
    let feed = feed_over(ledger, StaticGateway::new(), profiles);

    let posts = feed.load(&PostFilter::new()).await.unwrap();
    let anonymous = posts[0].identity_settled().await;
    let known = posts[1].identity_settled().await;

    assert!(anonymous.is_fallback());
    assert_eq!(anonymous.display_name(), "abc...123");
    assert_eq!(known.display_name(), "Ada");
    assert_eq!(known.handle(), "@ada");
}

#[tokio::test]
async fn failing_profile_lookup_falls_back() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("tx-1", "abc123").build(),
    ]));
    let profiles = StaticProfiles::new().failing("abc123");
    let feed = feed_over(ledger, StaticGateway::new(), profiles);

    let posts = feed.load(&PostFilter::new()).await.unwrap();

    assert_eq!(posts[0].identity_settled().await.display_name(), "abc...123");
}

#[tokio::test(start_paused = true)]
async fn stalled_profile_document_settles_as_fallback() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("tx-1", "ada-addr").build(),
        RecordBuilder::new("acct-1", "ada-addr")
            .bare()
            .tag(PROTOCOL_NAME_TAG, ACCOUNT_PROTOCOL)
            .build(),
    ]));
    let gateway = StaticGateway::new().ready("tx-1", "hi").hang("acct-1");
    let lookup = AccountProfileLookup::new(ledger.clone(), Arc::new(gateway.clone()));
    let services = Services::new(
        ledger,
        Arc::new(gateway),
        ProfileDirectory::new(Arc::new(lookup), 100).with_lookup_timeout(Duration::from_secs(5)),
    );
    let feed = Feed::new(services, &SquareConfig::default());

    let posts = feed.load(&PostFilter::new()).await.unwrap();
    let identity = posts[0].identity_settled().await;
    let snapshot = posts[0].settled().await;

    assert!(identity.is_fallback());
    assert_eq!(snapshot.author_display.as_deref(), Some("ada-...addr"));
    assert_eq!(snapshot.body.as_deref(), Some("hi"));
}

#[tokio::test]
async fn authors_share_one_profile_lookup() {
    let records = (0..5)
        .map(|n| RecordBuilder::new(format!("tx-{n}"), "ada-addr").build())
        .collect();
    let ledger = Arc::new(ScriptedLedger::with_records(records));
    let profiles = StaticProfiles::new().with("ada-addr", "Ada", "ada");
    let feed = feed_over(ledger, StaticGateway::new(), profiles.clone());

    let posts = feed.load(&PostFilter::new()).await.unwrap();
    for post in &posts {
        post.identity_settled().await;
    }

    assert_eq!(profiles.lookups(), 1);
}

#[tokio::test]
async fn failed_query_is_distinct_from_empty_page() {
    let empty = feed_over(
        Arc::new(ScriptedLedger::with_records(vec![])),
        StaticGateway::new(),
        StaticProfiles::new(),
    );
    let failing = feed_over(
        Arc::new(ScriptedLedger::new().then_status(502)),
        StaticGateway::new(),
        StaticProfiles::new(),
    );

    assert!(empty.load(&PostFilter::new()).await.unwrap().is_empty());
    assert!(matches!(
        failing.load(&PostFilter::new()).await,
        Err(FeedError::Query(_))
    ));
}

#[tokio::test]
async fn unconfirmed_records_carry_sentinels() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("tx-1", "a").build(),
        RecordBuilder::new("tx-2", "a").confirmed(1_200_000, 1_700_000_000).build(),
    ]));
    let feed = feed_over(ledger, StaticGateway::new(), StaticProfiles::new());

    let posts = feed.load(&PostFilter::new()).await.unwrap();

    assert_eq!(posts[0].confirmation_height(), -1);
    assert_eq!(posts[0].submitted_at_millis(), -1);
    assert_eq!(posts[1].confirmation_height(), 1_200_000);
    assert_eq!(posts[1].submitted_at_millis(), 1_700_000_000_000);
}

#[tokio::test(start_paused = true)]
async fn submitted_post_found_on_third_cycle() {
    let older = RecordBuilder::new("old-1", "a").confirmed(1, 1).build();
    let ledger = Arc::new(
        ScriptedLedger::new()
            .then_records(vec![older.clone()])
            .then_records(vec![older.clone()])
            .then_records(vec![older, RecordBuilder::new("new-1", "me").build()]),
    );
    let feed = feed_over(ledger.clone(), StaticGateway::new(), StaticProfiles::new());
    let poller = feed.new_poller();
    let started = tokio::time::Instant::now();

    let outcome = feed
        .await_with(&poller, &TxId::new("new-1"), &PostFilter::new())
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 3);
    assert_eq!(ledger.calls(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(12));
    assert_eq!(outcome.posts[0].id().as_str(), "new-1");
    assert_eq!(feed.posts()[0].id().as_str(), "new-1");
    assert_eq!(poller.state(), PollState::Found { attempts: 3 });
}

#[tokio::test(start_paused = true)]
async fn concurrent_submissions_poll_independently() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("first", "me").build(),
    ]));
    let feed = Arc::new(feed_over(ledger, StaticGateway::new(), StaticProfiles::new()));
    let first = feed.new_poller();
    let second = Arc::new(feed.new_poller());
    let mut second_states = second.subscribe();

    let pending = tokio::spawn({
        let feed = feed.clone();
        let second = second.clone();
        async move {
            feed.await_with(&second, &TxId::new("second"), &PostFilter::new())
                .await
        }
    });
    second_states.changed().await.unwrap();

    let outcome = feed
        .await_with(&first, &TxId::new("first"), &PostFilter::new())
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 1);
    assert_eq!(first.state(), PollState::Found { attempts: 1 });
    assert!(matches!(second.state(), PollState::Polling { .. }));
    pending.abort();
}

#[tokio::test(start_paused = true)]
async fn rejected_poll_query_ends_wait() {
    let ledger = Arc::new(ScriptedLedger::new().then_status(400));
    let feed = feed_over(ledger.clone(), StaticGateway::new(), StaticProfiles::new());

    let err = feed
        .await_post(&TxId::new("new-1"), &PostFilter::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FeedError::Poll(PollError::Failed { attempts: 1, .. })
    ));
    assert_eq!(ledger.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn publish_dispatches_then_polls() {
    let ledger = Arc::new(
        ScriptedLedger::new()
            .then_records(vec![])
            .then_records(vec![RecordBuilder::new("new-1", "me").topic("gm").build()]),
    );
    let feed = feed_over(ledger.clone(), StaticGateway::new(), StaticProfiles::new());
    let signer = FakeSigner::accepting("new-1");
    let draft = PostDraft::new("good morning").with_topic("gm");

    let outcome = feed
        .publish(&signer, &draft, &PostFilter::new().with_topic("gm"))
        .await
        .unwrap();

    assert_eq!(signer.drafts(), vec![draft]);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(feed.len(), 1);
}

#[tokio::test]
async fn rejected_submission_never_polls() {
    let ledger = Arc::new(ScriptedLedger::new());
    let feed = feed_over(ledger.clone(), StaticGateway::new(), StaticProfiles::new());
    let signer = FakeSigner::rejecting("user declined");

    let err = feed
        .publish(&signer, &PostDraft::new("hi"), &PostFilter::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FeedError::Submission(SubmissionFailure::Rejected(_))
    ));
    assert_eq!(ledger.calls(), 0);
}

#[tokio::test]
async fn empty_draft_is_refused_before_wallet() {
    let feed = feed_over(
        Arc::new(ScriptedLedger::new()),
        StaticGateway::new(),
        StaticProfiles::new(),
    );
    let signer = FakeSigner::accepting("never");

    let err = feed
        .publish(&signer, &PostDraft::new("   "), &PostFilter::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FeedError::Submission(SubmissionFailure::EmptyBody)));
    assert!(signer.drafts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn polling_gives_up_at_bound() {
    let ledger = Arc::new(ScriptedLedger::new());
    let config = SquareConfig::default().with_poll_max_attempts(4);
    let feed = Feed::new(
        services(ledger.clone(), StaticGateway::new(), StaticProfiles::new()),
        &config,
    );

    let err = feed
        .await_post(&TxId::new("lost"), &PostFilter::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FeedError::Poll(PollError::Expired { attempts: 4, .. })
    ));
    assert_eq!(ledger.calls(), 4);
}

#[tokio::test]
async fn settled_callback_reaches_live_consumer() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("tx-1", "a").build(),
    ]));
    let feed = feed_over(ledger, StaticGateway::new().ready("tx-1", "hi"), StaticProfiles::new());
    let posts = feed.load(&PostFilter::new()).await.unwrap();
    let guard = ConsumerGuard::new();
    let (tx, rx) = oneshot::channel();

    posts[0]
        .watch(&guard, move |snapshot| {
            let _ = tx.send(snapshot);
        })
        .await
        .unwrap();

    assert_eq!(rx.await.unwrap().body.as_deref(), Some("hi"));
}

#[tokio::test(start_paused = true)]
async fn torn_down_consumer_is_not_notified() {
    let ledger = Arc::new(ScriptedLedger::with_records(vec![
        RecordBuilder::new("tx-1", "a").build(),
    ]));
    let feed = feed_over(ledger, StaticGateway::new().hang("tx-1"), StaticProfiles::new());
    let posts = feed.load(&PostFilter::new()).await.unwrap();
    let delivered = Arc::new(AtomicUsize::new(0));

    let guard = ConsumerGuard::new();
    let handle = posts[0].watch(&guard, {
        let delivered = delivered.clone();
        move |_| {
            delivered.fetch_add(1, Ordering::SeqCst);
        }
    });
    drop(guard);
    handle.await.unwrap();

    assert_eq!(delivered.load(Ordering::SeqCst), 0);
    assert!(posts[0].is_settled());
    assert!(posts[0].body_fetch_error().is_some());
}
