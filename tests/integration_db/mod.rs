use dotenv::dotenv;
use lazy_static::lazy_static;
use sqlx::{postgres::PgConnectOptions, PgPool};
use tokio::sync::Mutex;
use tracing::{debug, span};
use vaas_backlog::db::{self, postgres::PgDocumentStore};

lazy_static! {
    static ref CREATE_DB_MUTEX: Mutex<()> = Mutex::new(());
}

async fn create_test_db(pool: PgPool, test_db: &str) {
    let _lock = CREATE_DB_MUTEX.lock().await;
    debug!("Creating new test db");

    sqlx::query(&format!("DROP DATABASE IF EXISTS {}", test_db))
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(&format!("CREATE DATABASE {}", test_db))
        .execute(&pool)
        .await
        .unwrap();
}

async fn drop_test_db(pool: PgPool, test_db: &str) {
    let _lock = CREATE_DB_MUTEX.lock().await;
    debug!("Dropping test db");
    sqlx::query(&format!("DROP DATABASE {}", test_db))
        .execute(&pool)
        .await
        .unwrap();
}

/// A throwaway database with the voting document schema applied.
pub struct IntegrationTestDb {
    db_name: String,
    store: PgDocumentStore,
    template_connect_options: PgConnectOptions,
}

impl IntegrationTestDb {
    pub async fn new() -> Self {
        dotenv().ok();
        let template_connect_options: PgConnectOptions = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set")
            .parse()
            .unwrap();

        // Creating test database with random name
        let db_name = format!("integration_{}", uuid::Uuid::new_v4().simple());
        let span = span!(tracing::Level::DEBUG, "test_db", test_db = db_name.as_str());
        let _enter = span.enter();
        let template_pool = db::new_pool_with(template_connect_options.clone())
            .await
            .unwrap();
        create_test_db(template_pool, &db_name).await;

        let integration_options = template_connect_options.clone().database(&db_name);
        let pool = db::new_pool_with(integration_options).await.unwrap();
        let store = PgDocumentStore::new(pool);
        store.migrate().await.unwrap();

        Self {
            db_name,
            store,
            template_connect_options,
        }
    }

    pub fn store(&self) -> PgDocumentStore {
        self.store.clone()
    }
}

impl Drop for IntegrationTestDb {
    fn drop(&mut self) {
        // Cleanup test db after test is finished
        let db_name = self.db_name.clone();
        let template_connect_options = self.template_connect_options.clone();
        let cleanup = std::thread::spawn(move || {
            let span = span!(tracing::Level::DEBUG, "test_db", test_db = db_name.as_str());
            let _enter = span.enter();
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                let template_pool = db::new_pool_with(template_connect_options)
                    .await
                    .unwrap();
                drop_test_db(template_pool, &db_name).await;
                debug!("Dropped test db");
            });
        });
        let _ = cleanup.join();
    }
}
