mod integration_db;

use integration_db::IntegrationTestDb;
use std::sync::Arc;
use vaas_backlog::db::{
    is_version_conflict,
    session::{SessionId, VotingDocument, VotingSettings},
    vote::{UserId, Vote, VotingId, WorkItemId},
    DocumentStore,
};
use vaas_backlog::services::vote::VoteLedger;

fn open_voting() -> VotingSettings {
    VotingSettings {
        is_voting_enabled: true,
        is_voting_paused: false,
        is_multiple_voting_enabled: false,
    }
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn document_round_trip_and_version_check() {
    let db = IntegrationTestDb::new().await;
    let store = db.store();

    let doc = VotingDocument::new(SessionId::new(), open_voting());
    let created = store.update_document(doc.clone()).await.unwrap();
    assert_eq!(created.version, 1);

    let loaded = store.get_document(&doc.id).await.unwrap().unwrap();
    assert_eq!(loaded, created);

    let updated = store.update_document(loaded.clone()).await.unwrap();
    assert_eq!(updated.version, 2);

    let err = store.update_document(loaded).await.unwrap_err();
    assert!(is_version_conflict(&err));

    assert_eq!(store.get_all_documents().await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn ledger_on_postgres() {
    let db = IntegrationTestDb::new().await;
    let store = Arc::new(db.store());
    let session = SessionId::new();
    store
        .update_document(VotingDocument::new(session.clone(), open_voting()))
        .await
        .unwrap();

    let mut ledger = VoteLedger::new(store.clone(), session.clone(), 3);
    let user = UserId("user".to_owned());
    ledger
        .add(
            Vote::new(user.clone(), VotingId("v1".to_owned()), WorkItemId(12)),
            3,
        )
        .await
        .unwrap();

    let mut reloaded = VoteLedger::new(store, session, 3);
    reloaded.load().await.unwrap();
    assert_eq!(reloaded.count_for_user(&user), 1);
}
