//! I define the shared application state: the wired service
//! graph behind the http handlers.
//!

use std::sync::Arc;

use kosha_accounts::{
    files::UserFileStore, AccountReadRepo, AccountWriteRepo, InvitationRepo, RoleRepo,
    UserReadRepo, UserWriteRepo, WebIdGenerator,
};
use kosha_index::{MembershipIndex, MokaStatCache};
use kosha_journal::{EventDispatcher, EventStore, UnitOfWorkFactory};
use kosha_repo_fs::FsResourceStore;
use kosha_storage::{StatCacheInvalidator, StorageService};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tracing::info;

use crate::config::AppConfig;

/// The wired service graph shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The resource/container service.
    pub storage: StorageService,

    /// User read repo.
    pub users_read: UserReadRepo,

    /// User write repo.
    pub users_write: UserWriteRepo,

    /// Account read repo.
    pub accounts_read: AccountReadRepo,

    /// Account write repo.
    pub accounts_write: AccountWriteRepo,

    /// Invitation repo.
    pub invitations: InvitationRepo,

    /// Role repo.
    pub roles: Arc<RoleRepo>,
}

impl AppState {
    /// Wire the full service graph from given configuration.
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        if let Some(parent) = config.storage.db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(&config.storage.db_path)
                    .create_if_missing(true),
            )
            .await?;
        info!("Opened database at {:?}.", config.storage.db_path);

        Self::init_with_pool(config, pool).await
    }

    /// Wire the full service graph over given pool. Split out
    /// so tests can pass an in-memory database.
    pub async fn init_with_pool(config: &AppConfig, pool: SqlitePool) -> anyhow::Result<Self> {
        let events = EventStore::new(pool.clone());
        events.init_schema().await?;

        let index = MembershipIndex::new(pool.clone());
        index.init_schema().await?;

        kosha_accounts::schema::init_schema(&pool).await?;

        let stat_cache = MokaStatCache::default().into_shared();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Arc::new(StatCacheInvalidator::new(stat_cache.clone())));
        let uow_factory = UnitOfWorkFactory::new(events, Arc::new(dispatcher));

        let storage = StorageService::new(
            FsResourceStore::new(&config.storage.base_dir),
            index,
            stat_cache,
            uow_factory.clone(),
        );

        let users_read = UserReadRepo::new(pool.clone());
        let accounts_read = AccountReadRepo::new(pool.clone());
        let roles = Arc::new(RoleRepo::new(pool.clone()));
        let webid_gen = WebIdGenerator::new(config.base_uri())
            .map_err(|e| anyhow::anyhow!("Invalid base uri: {e}"))?;

        let users_write = UserWriteRepo::new(
            pool.clone(),
            uow_factory.clone(),
            users_read.clone(),
            UserFileStore::new(&config.storage.base_dir),
            webid_gen,
        );
        let accounts_write = AccountWriteRepo::new(
            pool.clone(),
            uow_factory.clone(),
            accounts_read.clone(),
            users_read.clone(),
            roles.clone(),
        );
        let invitations = InvitationRepo::new(
            pool,
            uow_factory,
            accounts_read.clone(),
            accounts_write.clone(),
            roles.clone(),
        );

        Ok(Self {
            storage,
            users_read,
            users_write,
            accounts_read,
            accounts_write,
            invitations,
            roles,
        })
    }
}
