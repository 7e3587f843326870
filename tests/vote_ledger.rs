use async_trait::async_trait;
use color_eyre::eyre::{eyre, Report};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vaas_backlog::db::{
    session::{SessionId, VotingDocument, VotingSettings},
    vote::{UserId, Vote, VotingId, WorkItemId},
    DocumentStore,
};
use vaas_backlog::managers::document::MemoryDocumentStore;
use vaas_backlog::services::vote::{LedgerError, VoteLedger, VoteRejection};

fn settings(enabled: bool, paused: bool, multiple: bool) -> VotingSettings {
    VotingSettings {
        is_voting_enabled: enabled,
        is_voting_paused: paused,
        is_multiple_voting_enabled: multiple,
    }
}

fn vote(user: &str, item: i64) -> Vote {
    Vote::new(
        UserId(user.to_owned()),
        VotingId("round-1".to_owned()),
        WorkItemId(item),
    )
}

async fn ledger_with(
    voting: Option<VotingSettings>,
    votes: Vec<Vote>,
) -> (Arc<MemoryDocumentStore>, VoteLedger) {
    let store = Arc::new(MemoryDocumentStore::new());
    let session = SessionId::new();
    store
        .insert(VotingDocument {
            id: session.clone(),
            voting,
            votes,
            version: 0,
        })
        .await;
    let mut ledger = VoteLedger::new(store.clone(), session, 3);
    ledger.load().await.unwrap();
    (store, ledger)
}

fn rejection(result: Result<(), LedgerError>) -> VoteRejection {
    match result {
        Err(LedgerError::Rejected(rejection)) => rejection,
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_load_missing_document_is_empty() {
    let store = Arc::new(MemoryDocumentStore::new());
    let mut ledger = VoteLedger::new(store, SessionId::new(), 3);
    ledger.load().await.unwrap();
    assert!(ledger.votes().is_empty());
}

#[tokio::test]
async fn test_add_persists_vote() {
    let (store, mut ledger) = ledger_with(Some(settings(true, false, false)), vec![]).await;
    ledger.add(vote("ada", 7), 3).await.unwrap();

    assert_eq!(ledger.count_for_user(&UserId("ada".to_owned())), 1);
    let stored = store.get_document(ledger.session_id()).await.unwrap().unwrap();
    assert_eq!(stored.votes, vec![vote("ada", 7)]);
}

#[tokio::test]
async fn test_duplicate_vote_leaves_votes_unchanged() {
    let (store, mut ledger) =
        ledger_with(Some(settings(true, false, false)), vec![vote("ada", 7)]).await;

    let result = ledger.add(vote("ada", 7), 5).await;
    assert_eq!(rejection(result), VoteRejection::DuplicateVote);

    let stored = store.get_document(ledger.session_id()).await.unwrap().unwrap();
    assert_eq!(stored.votes, vec![vote("ada", 7)]);
    assert_eq!(ledger.votes(), &[vote("ada", 7)]);
}

#[tokio::test]
async fn test_multiple_voting_allows_repeat() {
    let (_, mut ledger) =
        ledger_with(Some(settings(true, false, true)), vec![vote("ada", 7)]).await;
    ledger.add(vote("ada", 7), 5).await.unwrap();
    assert_eq!(ledger.tally().get(&WorkItemId(7)), Some(&2));
}

#[tokio::test]
async fn test_quota_exceeded() {
    let (_, mut ledger) = ledger_with(
        Some(settings(true, false, true)),
        vec![vote("ada", 1), vote("ada", 2), vote("bob", 1)],
    )
    .await;
    assert_eq!(ledger.count_for_user(&UserId("ada".to_owned())), 2);

    let result = ledger.add(vote("ada", 3), 2).await;
    assert_eq!(rejection(result), VoteRejection::QuotaExceeded);
    // bob still has room
    ledger.add(vote("bob", 3), 2).await.unwrap();
}

#[tokio::test]
async fn test_closed_and_paused_sessions_reject() {
    let (_, mut ledger) = ledger_with(Some(settings(false, false, false)), vec![]).await;
    assert_eq!(rejection(ledger.add(vote("ada", 1), 3).await), VoteRejection::SessionClosed);

    let (_, mut ledger) = ledger_with(Some(settings(true, true, false)), vec![]).await;
    assert_eq!(rejection(ledger.add(vote("ada", 1), 3).await), VoteRejection::SessionPaused);

    let (_, mut ledger) = ledger_with(None, vec![]).await;
    assert_eq!(rejection(ledger.add(vote("ada", 1), 3).await), VoteRejection::SessionClosed);
}

#[tokio::test]
async fn test_remove_takes_first_match_only() {
    let (store, mut ledger) = ledger_with(
        Some(settings(true, false, true)),
        vec![vote("bob", 7), vote("ada", 7), vote("ada", 7), vote("ada", 8)],
    )
    .await;

    let removed = ledger
        .remove(WorkItemId(7), &UserId("ada".to_owned()))
        .await
        .unwrap();
    assert!(removed);

    let stored = store.get_document(ledger.session_id()).await.unwrap().unwrap();
    assert_eq!(
        stored.votes,
        vec![vote("bob", 7), vote("ada", 7), vote("ada", 8)]
    );
}

#[tokio::test]
async fn test_remove_without_voting_configuration() {
    let (_, mut ledger) = ledger_with(None, vec![vote("ada", 7)]).await;
    let result = ledger.remove(WorkItemId(7), &UserId("ada".to_owned())).await;
    assert!(matches!(
        result,
        Err(LedgerError::Rejected(VoteRejection::SessionClosed))
    ));
}

#[tokio::test]
async fn test_remove_from_disabled_session() {
    let (store, mut ledger) =
        ledger_with(Some(settings(false, false, false)), vec![vote("ada", 7)]).await;
    let result = ledger.remove(WorkItemId(7), &UserId("ada".to_owned())).await;
    assert!(matches!(
        result,
        Err(LedgerError::Rejected(VoteRejection::SessionClosed))
    ));

    let stored = store.get_document(ledger.session_id()).await.unwrap().unwrap();
    assert_eq!(stored.votes, vec![vote("ada", 7)]);
}

#[test]
fn test_ledger_error_messages() {
    let rejected = LedgerError::from(VoteRejection::QuotaExceeded);
    assert_eq!(rejected.to_string(), VoteRejection::QuotaExceeded.to_string());

    let store = LedgerError::from(eyre!("connection reset"));
    assert!(matches!(store, LedgerError::Store(_)));
    assert_eq!(
        store.to_string(),
        "voting document store failed: connection reset"
    );
}

/// Simulates another voter writing between our read and our write, once.
struct RacingStore {
    inner: MemoryDocumentStore,
    raced: AtomicBool,
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn get_document(&self, id: &SessionId) -> Result<Option<VotingDocument>, Report> {
        self.inner.get_document(id).await
    }

    async fn update_document(&self, doc: VotingDocument) -> Result<VotingDocument, Report> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let mut theirs = self.inner.get_document(&doc.id).await?.unwrap();
            theirs.votes.push(vote("eve", 99));
            self.inner.update_document(theirs).await?;
        }
        self.inner.update_document(doc).await
    }

    async fn get_all_documents(&self) -> Result<Vec<VotingDocument>, Report> {
        self.inner.get_all_documents().await
    }
}

#[tokio::test]
async fn test_concurrent_write_is_retried_without_losing_votes() {
    let inner = MemoryDocumentStore::new();
    let session = SessionId::new();
    inner
        .insert(VotingDocument::new(session.clone(), settings(true, false, false)))
        .await;
    let store = Arc::new(RacingStore {
        inner,
        raced: AtomicBool::new(false),
    });

    let mut ledger = VoteLedger::new(store, session, 3);
    ledger.add(vote("ada", 1), 3).await.unwrap();
    assert_eq!(ledger.votes(), &[vote("eve", 99), vote("ada", 1)]);
}

/// Refuses writes to one document.
struct BrokenDocument {
    inner: MemoryDocumentStore,
    broken: SessionId,
}

#[async_trait]
impl DocumentStore for BrokenDocument {
    async fn get_document(&self, id: &SessionId) -> Result<Option<VotingDocument>, Report> {
        self.inner.get_document(id).await
    }

    async fn update_document(&self, doc: VotingDocument) -> Result<VotingDocument, Report> {
        if doc.id == self.broken {
            return Err(eyre!("storage unavailable"));
        }
        self.inner.update_document(doc).await
    }

    async fn get_all_documents(&self) -> Result<Vec<VotingDocument>, Report> {
        self.inner.get_all_documents().await
    }
}

#[tokio::test]
async fn test_remove_all_for_user_is_best_effort() {
    let inner = MemoryDocumentStore::new();
    let sessions: Vec<SessionId> = ["a", "b", "c"]
        .iter()
        .map(|id| SessionId(id.to_string()))
        .collect();
    for session in &sessions {
        let mut doc = VotingDocument::new(session.clone(), settings(true, false, true));
        doc.votes = vec![vote("ada", 1), vote("bob", 1), vote("ada", 2)];
        inner.insert(doc).await;
    }
    let store = Arc::new(BrokenDocument {
        inner,
        broken: sessions[1].clone(),
    });

    let ada = UserId("ada".to_owned());
    let mut ledger = VoteLedger::new(store.clone(), sessions[0].clone(), 3);
    ledger.load().await.unwrap();
    let summary = ledger.remove_all_for_user(&ada).await.unwrap();

    assert_eq!(summary.updated, vec![sessions[0].clone(), sessions[2].clone()]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, sessions[1]);
    assert_eq!(ledger.count_for_user(&ada), 0);

    for session in &summary.updated {
        let mut reloaded = VoteLedger::new(store.clone(), session.clone(), 3);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.count_for_user(&ada), 0);
        assert_eq!(reloaded.count_for_user(&UserId("bob".to_owned())), 1);
    }

    let untouched = store.get_document(&sessions[1]).await.unwrap().unwrap();
    assert_eq!(untouched.votes_by(&ada), 2);
}
