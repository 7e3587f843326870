pub mod postgres;
pub mod session;
pub mod vote;

use async_trait::async_trait;
use color_eyre::eyre::Report;
use session::{SessionId, VotingDocument};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use thiserror::Error;

/// A write carried a version that is no longer the stored one.
#[derive(Debug, Error)]
#[error("voting document {id} changed concurrently (expected version {expected})")]
pub struct VersionConflict {
    pub id: SessionId,
    pub expected: i64,
}

/// Key-value store holding one voting document per session.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, id: &SessionId) -> Result<Option<VotingDocument>, Report>;

    /// Writes `doc` if its version matches the stored one (0 creates), returning
    /// the stored document with its new version. Fails with [`VersionConflict`].
    async fn update_document(&self, doc: VotingDocument) -> Result<VotingDocument, Report>;

    async fn get_all_documents(&self) -> Result<Vec<VotingDocument>, Report>;
}

pub fn is_version_conflict(report: &Report) -> bool {
    report.downcast_ref::<VersionConflict>().is_some()
}

pub async fn new_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    new_pool_with(database_url.parse()?).await
}

pub async fn new_pool_with(connect_options: PgConnectOptions) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5 as u32)
        .connect_with(connect_options)
        .await
}
