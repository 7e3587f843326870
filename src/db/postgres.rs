use super::session::{SessionId, VotingDocument};
use super::{DocumentStore, VersionConflict};
use async_trait::async_trait;
use color_eyre::eyre::Report;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};

#[derive(FromRow)]
struct DocumentRow {
    version: i64,
    body: Json<VotingDocument>,
}

impl DocumentRow {
    fn into_document(self) -> VotingDocument {
        let DocumentRow {
            version,
            body: Json(mut doc),
        } = self;
        doc.version = version;
        doc
    }
}

/// Voting documents stored as jsonb next to a version column.
#[derive(Clone, Debug)]
pub struct PgDocumentStore(pub PgPool);

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self(pool)
    }

    pub async fn migrate(&self) -> Result<(), Report> {
        sqlx::migrate!("./migrations").run(&self.0).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip(self), fields(id = id.as_str()))]
    async fn get_document(&self, id: &SessionId) -> Result<Option<VotingDocument>, Report> {
        debug!("Get voting document");
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT version, body FROM voting_documents WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.0)
                .await?;
        Ok(row.map(DocumentRow::into_document))
    }

    #[instrument(skip(self, doc), fields(id = doc.id.as_str(), version = doc.version))]
    async fn update_document(&self, doc: VotingDocument) -> Result<VotingDocument, Report> {
        let row: Option<(i64,)> = if doc.version == 0 {
            debug!("Insert voting document");
            sqlx::query_as(
                r#"
                INSERT INTO voting_documents (id, version, body) VALUES ($1, 1, $2)
                ON CONFLICT (id) DO NOTHING
                RETURNING version
                "#,
            )
            .bind(doc.id.as_str())
            .bind(Json(&doc))
            .fetch_optional(&self.0)
            .await?
        } else {
            debug!("Update voting document");
            sqlx::query_as(
                r#"
                UPDATE voting_documents SET body = $2, version = version + 1
                WHERE id = $1 AND version = $3
                RETURNING version
                "#,
            )
            .bind(doc.id.as_str())
            .bind(Json(&doc))
            .bind(doc.version)
            .fetch_optional(&self.0)
            .await?
        };

        match row {
            Some((version,)) => Ok(VotingDocument { version, ..doc }),
            None => Err(VersionConflict {
                id: doc.id,
                expected: doc.version,
            }
            .into()),
        }
    }

    #[instrument(skip(self))]
    async fn get_all_documents(&self) -> Result<Vec<VotingDocument>, Report> {
        let rows: Vec<DocumentRow> =
            sqlx::query_as("SELECT version, body FROM voting_documents ORDER BY id")
                .fetch_all(&self.0)
                .await?;
        debug!("Loaded {} voting documents", rows.len());
        Ok(rows.into_iter().map(DocumentRow::into_document).collect())
    }
}
