//! I define the read repos of the accounts subsystem: cached
//! relational lookups over users, accounts, roles, members,
//! and invitations.
//!

use std::time::Duration;

use kosha_space::{
    account::{Account, AccountMember, Role},
    user::{User, UserStatus},
    OpaqueId,
};
use moka::future::{Cache, CacheBuilder};
use sqlx::SqlitePool;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    error::AccountsError,
    schema::{decode_account, decode_member, decode_role, decode_user},
};

/// Ttl of read-model cache entries.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Entry capacity of read-model caches.
const CACHE_CAPACITY: u64 = 10_000;

/// A filter over user listings.
#[derive(Debug, Clone, Default)]
pub struct UserListFilter {
    /// Restrict to users with this status.
    pub status: Option<UserStatus>,

    /// Restrict to users whose email starts with this prefix.
    pub email_prefix: Option<String>,

    /// Page size.
    pub limit: u32,

    /// Page offset.
    pub offset: u64,
}

/// The cached user read repo.
///
/// Id lookups are fronted by a bounded ttl+lru cache; the
/// write repo invalidates entries after each successful
/// commit, so reads in the same process observe committed
/// writes.
#[derive(Debug, Clone)]
pub struct UserReadRepo {
    pool: SqlitePool,
    cache: Cache<OpaqueId, User>,
}

impl UserReadRepo {
    /// Create a new repo over given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: CacheBuilder::new(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Get the user with given id.
    pub async fn get_by_id(&self, id: OpaqueId) -> Result<Option<User>, AccountsError> {
        if let Some(user) = self.cache.get(&id).await {
            return Ok(Some(user));
        }

        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let user = decode_user(&row)?;
                self.cache.insert(id, user.clone()).await;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Get the user with given webid.
    pub async fn get_by_webid(&self, webid: &str) -> Result<Option<User>, AccountsError> {
        let row = sqlx::query("SELECT * FROM users WHERE webid = ?1")
            .bind(webid)
            .fetch_optional(&self.pool)
            .await?;
        self.decode_and_cache(row).await
    }

    /// Get the user with given email. Emails compare
    /// case-sensitively, exactly as stored.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, AccountsError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        self.decode_and_cache(row).await
    }

    /// Check whether a user with given id exists.
    pub async fn exists(&self, id: OpaqueId) -> Result<bool, AccountsError> {
        Ok(self.get_by_id(id).await?.is_some())
    }

    /// List users matching given filter, ordered by id.
    pub async fn list(&self, filter: &UserListFilter) -> Result<Vec<User>, AccountsError> {
        let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM users WHERE 1 = 1");
        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status.as_str());
        }
        if let Some(prefix) = &filter.email_prefix {
            let mut escaped = String::with_capacity(prefix.len());
            for c in prefix.chars() {
                if matches!(c, '%' | '_' | '\\') {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            qb.push(" AND email LIKE ");
            qb.push_bind(format!("{}%", escaped));
            qb.push(" ESCAPE '\\'");
        }
        qb.push(" ORDER BY id ASC LIMIT ");
        qb.push_bind(filter.limit.max(1) as i64);
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(decode_user).collect()
    }

    /// Drop the cached entry of given user.
    pub async fn invalidate(&self, id: OpaqueId) {
        self.cache.invalidate(&id).await;
        debug!("Invalidated cached user {}.", id);
    }

    async fn decode_and_cache(
        &self,
        row: Option<sqlx::sqlite::SqliteRow>,
    ) -> Result<Option<User>, AccountsError> {
        match row {
            Some(row) => {
                let user = decode_user(&row)?;
                self.cache.insert(user.id, user.clone()).await;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}

/// The role repo. The system role set is immutable, so it is
/// loaded eagerly on first access and cached for the process
/// lifetime.
#[derive(Debug)]
pub struct RoleRepo {
    pool: SqlitePool,
    roles: OnceCell<Vec<Role>>,
}

impl RoleRepo {
    /// Create a new repo over given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            roles: OnceCell::new(),
        }
    }

    /// Get all roles.
    pub async fn get_all(&self) -> Result<&[Role], AccountsError> {
        let roles = self
            .roles
            .get_or_try_init(|| async {
                let rows = sqlx::query("SELECT * FROM roles ORDER BY id ASC")
                    .fetch_all(&self.pool)
                    .await?;
                rows.iter().map(decode_role).collect()
            })
            .await?;
        Ok(roles)
    }

    /// Get the role with given id.
    pub async fn get(&self, role_id: &str) -> Result<Option<Role>, AccountsError> {
        Ok(self
            .get_all()
            .await?
            .iter()
            .find(|r| r.id == role_id)
            .cloned())
    }
}

/// The cached account read repo.
#[derive(Debug, Clone)]
pub struct AccountReadRepo {
    pool: SqlitePool,
    cache: Cache<OpaqueId, Account>,
}

impl AccountReadRepo {
    /// Create a new repo over given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: CacheBuilder::new(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Get the account with given id.
    pub async fn get_by_id(&self, id: OpaqueId) -> Result<Option<Account>, AccountsError> {
        if let Some(account) = self.cache.get(&id).await {
            return Ok(Some(account));
        }

        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let account = decode_account(&row)?;
                self.cache.insert(id, account.clone()).await;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    /// List the members of given account, in joining order.
    pub async fn list_members(
        &self,
        account_id: OpaqueId,
    ) -> Result<Vec<AccountMember>, AccountsError> {
        let rows = sqlx::query(
            "SELECT * FROM account_members WHERE account_id = ?1 ORDER BY joined_at ASC, id ASC",
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_member).collect()
    }

    /// Get the membership of given user in given account.
    pub async fn get_member(
        &self,
        account_id: OpaqueId,
        user_id: OpaqueId,
    ) -> Result<Option<AccountMember>, AccountsError> {
        let row = sqlx::query(
            "SELECT * FROM account_members WHERE account_id = ?1 AND user_id = ?2",
        )
        .bind(account_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(decode_member).transpose()
    }

    /// Drop the cached entry of given account.
    pub async fn invalidate(&self, id: OpaqueId) {
        self.cache.invalidate(&id).await;
    }
}
