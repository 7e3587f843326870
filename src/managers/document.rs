use crate::db::session::{SessionId, VotingDocument};
use crate::db::{DocumentStore, VersionConflict};
use async_trait::async_trait;
use color_eyre::eyre::Report;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Document store kept in process memory, with the same version semantics as Postgres.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<SessionId, VotingDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `doc` unconditionally, replacing whatever was there.
    pub async fn insert(&self, mut doc: VotingDocument) -> VotingDocument {
        let mut documents = self.documents.lock().await;
        doc.version = documents.get(&doc.id).map_or(1, |old| old.version + 1);
        documents.insert(doc.id.clone(), doc.clone());
        doc
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(&self, id: &SessionId) -> Result<Option<VotingDocument>, Report> {
        Ok(self.documents.lock().await.get(id).cloned())
    }

    async fn update_document(&self, mut doc: VotingDocument) -> Result<VotingDocument, Report> {
        let mut documents = self.documents.lock().await;
        let stored_version = documents.get(&doc.id).map_or(0, |stored| stored.version);
        if stored_version != doc.version {
            debug!(id = doc.id.as_str(), stored_version, "Rejecting stale write");
            return Err(VersionConflict {
                id: doc.id,
                expected: doc.version,
            }
            .into());
        }
        doc.version += 1;
        documents.insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }

    async fn get_all_documents(&self) -> Result<Vec<VotingDocument>, Report> {
        let mut all: Vec<VotingDocument> = self.documents.lock().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(all)
    }
}
