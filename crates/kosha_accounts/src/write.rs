//! I define the write models of the accounts subsystem. All
//! writes validate first, mutate the relational rows, emit
//! domain events through the journal, and invalidate the read
//! caches after a successful commit.
//!

use std::sync::Arc;

use chrono::{Duration, Utc};
use kosha_journal::UnitOfWorkFactory;
use kosha_space::{
    account::{roles, Account, AccountMember, AccountSettings},
    event::DomainEvent,
    invitation::{Invitation, InvitationStatus},
    user::{User, UserProfile, UserStatus},
    OpaqueId,
};
use rand::RngCore;
use sqlx::SqlitePool;
use tracing::debug;

use crate::{
    error::AccountsError,
    files::UserFileStore,
    read::{AccountReadRepo, RoleRepo, UserReadRepo},
    webid::WebIdGenerator,
};

/// Default validity of an invitation.
pub fn default_invitation_validity() -> Duration {
    Duration::days(7)
}

/// Attributes of a user registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Registered email.
    pub email: String,

    /// Initial profile. The profile name must be non-empty.
    pub profile: UserProfile,
}

/// The user write repo.
#[derive(Debug, Clone)]
pub struct UserWriteRepo {
    pool: SqlitePool,
    uow_factory: UnitOfWorkFactory,
    read: UserReadRepo,
    files: UserFileStore,
    webid_gen: WebIdGenerator,
}

impl UserWriteRepo {
    /// Create a new repo over given collaborators.
    pub fn new(
        pool: SqlitePool,
        uow_factory: UnitOfWorkFactory,
        read: UserReadRepo,
        files: UserFileStore,
        webid_gen: WebIdGenerator,
    ) -> Self {
        Self {
            pool,
            uow_factory,
            read,
            files,
            webid_gen,
        }
    }

    /// Register a new user: mint a unique webid, persist the
    /// row and the per-user documents, and log
    /// `user_registered`.
    #[tracing::instrument(skip_all, fields(email = %new_user.email))]
    pub async fn create(&self, new_user: NewUser) -> Result<User, AccountsError> {
        User::validate_registration(&new_user.email, &new_user.profile.name)
            .map_err(AccountsError::invalid)?;

        if self.read.get_by_email(&new_user.email).await?.is_some() {
            return Err(AccountsError::already_exists("user", &new_user.email));
        }

        let id = OpaqueId::generate();
        let webid = self
            .webid_gen
            .ensure_unique(&self.webid_gen.generate(&id.to_string()), &self.read)
            .await?;

        let now = Utc::now();
        let user = User {
            id,
            webid: webid.clone(),
            email: new_user.email,
            profile: new_user.profile,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, webid, email, profile, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.webid)
        .bind(&user.email)
        .bind(serde_json::to_string(&user.profile).expect("Profile serialization must not fail."))
        .bind(user.status.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        self.files.write_profile(&user).await?;
        let document =
            self.webid_gen
                .generate_document(&webid, &user.email, &user.profile.name)?;
        self.files.write_webid_document(user.id, &document).await?;

        let mut uow = self.uow_factory.begin();
        uow.register(&DomainEvent::UserRegistered {
            id: user.id,
            email: user.email.clone(),
            webid: user.webid.clone(),
        });
        uow.commit().await?;
        self.read.invalidate(user.id).await;

        debug!("Registered user {} with webid {}.", user.id, user.webid);
        Ok(user)
    }

    /// Replace the profile of given user.
    #[tracing::instrument(skip(self, profile))]
    pub async fn update_profile(
        &self,
        id: OpaqueId,
        profile: UserProfile,
    ) -> Result<User, AccountsError> {
        let mut user = self
            .read
            .get_by_id(id)
            .await?
            .ok_or_else(|| AccountsError::not_found("user", id))?;
        if user.status == UserStatus::Deleted {
            return Err(AccountsError::invalid("Cannot update a deleted user."));
        }
        if profile.name.trim().is_empty() {
            return Err(AccountsError::invalid("User name must not be empty."));
        }

        user.profile = profile;
        user.updated_at = Utc::now();

        sqlx::query("UPDATE users SET profile = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(
                serde_json::to_string(&user.profile)
                    .expect("Profile serialization must not fail."),
            )
            .bind(user.updated_at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        self.files.write_profile(&user).await?;

        let mut uow = self.uow_factory.begin();
        uow.register(&DomainEvent::UserProfileUpdated { id });
        uow.commit().await?;
        self.read.invalidate(id).await;

        Ok(user)
    }

    /// Soft-delete given user: the row stays (keeping webid
    /// and email reserved), the per-user documents are
    /// removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: OpaqueId) -> Result<(), AccountsError> {
        let user = self
            .read
            .get_by_id(id)
            .await?
            .ok_or_else(|| AccountsError::not_found("user", id))?;
        if user.status == UserStatus::Deleted {
            return Err(AccountsError::not_found("user", id));
        }

        sqlx::query("UPDATE users SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(UserStatus::Deleted.as_str())
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        self.files.delete_user_data(id).await?;

        let mut uow = self.uow_factory.begin();
        uow.register(&DomainEvent::UserDeleted { id });
        uow.commit().await?;
        self.read.invalidate(id).await;
        Ok(())
    }
}

/// Attributes of an account creation.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Owning user.
    pub owner_user_id: OpaqueId,

    /// Non-empty display name.
    pub name: String,

    /// Description.
    pub description: String,

    /// Settings; defaults apply when absent.
    pub settings: Option<AccountSettings>,
}

/// The account write repo.
#[derive(Debug, Clone)]
pub struct AccountWriteRepo {
    pool: SqlitePool,
    uow_factory: UnitOfWorkFactory,
    read: AccountReadRepo,
    users: UserReadRepo,
    roles: Arc<RoleRepo>,
}

impl AccountWriteRepo {
    /// Create a new repo over given collaborators.
    pub fn new(
        pool: SqlitePool,
        uow_factory: UnitOfWorkFactory,
        read: AccountReadRepo,
        users: UserReadRepo,
        roles: Arc<RoleRepo>,
    ) -> Self {
        Self {
            pool,
            uow_factory,
            read,
            users,
            roles,
        }
    }

    /// Create an account, with its owner as the first member.
    #[tracing::instrument(skip_all, fields(owner = %new_account.owner_user_id))]
    pub async fn create(&self, new_account: NewAccount) -> Result<Account, AccountsError> {
        Account::validate_name(&new_account.name).map_err(AccountsError::invalid)?;
        if self
            .users
            .get_by_id(new_account.owner_user_id)
            .await?
            .is_none()
        {
            return Err(AccountsError::not_found("user", new_account.owner_user_id));
        }

        let now = Utc::now();
        let account = Account {
            id: OpaqueId::generate(),
            owner_user_id: new_account.owner_user_id,
            name: new_account.name,
            description: new_account.description,
            settings: new_account.settings.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner_user_id, name, description, settings, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.owner_user_id.to_string())
        .bind(&account.name)
        .bind(&account.description)
        .bind(
            serde_json::to_string(&account.settings)
                .expect("Settings serialization must not fail."),
        )
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO account_members (id, account_id, user_id, role_id, invited_by, joined_at)
            VALUES (?1, ?2, ?3, ?4, NULL, ?5)
            "#,
        )
        .bind(OpaqueId::generate().to_string())
        .bind(account.id.to_string())
        .bind(account.owner_user_id.to_string())
        .bind(roles::OWNER)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut uow = self.uow_factory.begin();
        uow.register(&DomainEvent::AccountCreated {
            id: account.id,
            owner_user_id: account.owner_user_id,
        });
        uow.register(&DomainEvent::MemberAdded {
            account_id: account.id,
            user_id: account.owner_user_id,
            role_id: roles::OWNER.to_owned(),
        });
        uow.commit().await?;
        self.read.invalidate(account.id).await;

        Ok(account)
    }

    /// Delete given account, cascading to its members and
    /// invitations in one transaction.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: OpaqueId) -> Result<(), AccountsError> {
        if self.read.get_by_id(id).await?.is_none() {
            return Err(AccountsError::not_found("account", id));
        }

        let mut tx = self.pool.begin().await?;
        for sql in [
            "DELETE FROM account_members WHERE account_id = ?1",
            "DELETE FROM invitations WHERE account_id = ?1",
            "DELETE FROM accounts WHERE id = ?1",
        ] {
            sqlx::query(sql)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        let mut uow = self.uow_factory.begin();
        uow.register(&DomainEvent::AccountDeleted { id });
        uow.commit().await?;
        self.read.invalidate(id).await;
        Ok(())
    }

    /// Add given user as a member of given account.
    #[tracing::instrument(skip(self))]
    pub async fn add_member(
        &self,
        account_id: OpaqueId,
        user_id: OpaqueId,
        role_id: &str,
        invited_by: Option<OpaqueId>,
    ) -> Result<AccountMember, AccountsError> {
        let account = self
            .read
            .get_by_id(account_id)
            .await?
            .ok_or_else(|| AccountsError::not_found("account", account_id))?;
        if self.users.get_by_id(user_id).await?.is_none() {
            return Err(AccountsError::not_found("user", user_id));
        }
        if self.roles.get(role_id).await?.is_none() {
            return Err(AccountsError::invalid(format!("Unknown role: {role_id}")));
        }
        if self.read.get_member(account_id, user_id).await?.is_some() {
            return Err(AccountsError::already_exists(
                "account member",
                format!("({account_id}, {user_id})"),
            ));
        }
        let member_count = self.read.list_members(account_id).await?.len() as u32;
        if member_count >= account.settings.max_members {
            return Err(AccountsError::invalid("Account member limit reached."));
        }

        let member = AccountMember {
            id: OpaqueId::generate(),
            account_id,
            user_id,
            role_id: role_id.to_owned(),
            invited_by,
            joined_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO account_members (id, account_id, user_id, role_id, invited_by, joined_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(member.id.to_string())
        .bind(member.account_id.to_string())
        .bind(member.user_id.to_string())
        .bind(&member.role_id)
        .bind(member.invited_by.map(|id| id.to_string()))
        .bind(member.joined_at)
        .execute(&self.pool)
        .await?;

        let mut uow = self.uow_factory.begin();
        uow.register(&DomainEvent::MemberAdded {
            account_id,
            user_id,
            role_id: member.role_id.clone(),
        });
        uow.commit().await?;
        self.read.invalidate(account_id).await;

        Ok(member)
    }

    /// Remove given user from given account. The owner cannot
    /// be removed.
    #[tracing::instrument(skip(self))]
    pub async fn remove_member(
        &self,
        account_id: OpaqueId,
        user_id: OpaqueId,
    ) -> Result<(), AccountsError> {
        let account = self
            .read
            .get_by_id(account_id)
            .await?
            .ok_or_else(|| AccountsError::not_found("account", account_id))?;
        if account.owner_user_id == user_id {
            return Err(AccountsError::invalid(
                "The account owner cannot be removed.",
            ));
        }
        if self.read.get_member(account_id, user_id).await?.is_none() {
            return Err(AccountsError::not_found(
                "account member",
                format!("({account_id}, {user_id})"),
            ));
        }

        sqlx::query("DELETE FROM account_members WHERE account_id = ?1 AND user_id = ?2")
            .bind(account_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        let mut uow = self.uow_factory.begin();
        uow.register(&DomainEvent::MemberRemoved {
            account_id,
            user_id,
        });
        uow.commit().await?;
        self.read.invalidate(account_id).await;
        Ok(())
    }
}

/// The invitation repo.
#[derive(Debug, Clone)]
pub struct InvitationRepo {
    pool: SqlitePool,
    uow_factory: UnitOfWorkFactory,
    accounts: AccountReadRepo,
    members: AccountWriteRepo,
    roles: Arc<RoleRepo>,
}

impl InvitationRepo {
    /// Create a new repo over given collaborators.
    pub fn new(
        pool: SqlitePool,
        uow_factory: UnitOfWorkFactory,
        accounts: AccountReadRepo,
        members: AccountWriteRepo,
        roles: Arc<RoleRepo>,
    ) -> Self {
        Self {
            pool,
            uow_factory,
            accounts,
            members,
            roles,
        }
    }

    /// Issue an invitation of given email into given account.
    #[tracing::instrument(skip(self, email), fields(account_id = %account_id))]
    pub async fn create(
        &self,
        account_id: OpaqueId,
        email: &str,
        role_id: &str,
        invited_by: OpaqueId,
        validity: Duration,
    ) -> Result<Invitation, AccountsError> {
        let account = self
            .accounts
            .get_by_id(account_id)
            .await?
            .ok_or_else(|| AccountsError::not_found("account", account_id))?;
        if !account.settings.allow_invitations {
            return Err(AccountsError::invalid(
                "Account does not allow invitations.",
            ));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(AccountsError::invalid("Invalid invitation email."));
        }
        if self.roles.get(role_id).await?.is_none() {
            return Err(AccountsError::invalid(format!("Unknown role: {role_id}")));
        }

        let now = Utc::now();
        let invitation = Invitation {
            id: OpaqueId::generate(),
            account_id,
            email: email.to_owned(),
            role_id: role_id.to_owned(),
            token: fresh_token(),
            invited_by,
            status: InvitationStatus::Pending,
            expires_at: now + validity,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO invitations
                (id, account_id, email, role_id, token, invited_by, status, expires_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(invitation.id.to_string())
        .bind(invitation.account_id.to_string())
        .bind(&invitation.email)
        .bind(&invitation.role_id)
        .bind(&invitation.token)
        .bind(invitation.invited_by.to_string())
        .bind(invitation.status.as_str())
        .bind(invitation.expires_at)
        .bind(invitation.created_at)
        .execute(&self.pool)
        .await?;

        let mut uow = self.uow_factory.begin();
        uow.register(&DomainEvent::InvitationCreated {
            id: invitation.id,
            account_id,
            email: invitation.email.clone(),
        });
        uow.commit().await?;

        Ok(invitation)
    }

    /// Get the invitation carrying given token. A pending
    /// invitation past its expiry is reported, and persisted,
    /// as expired.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<Invitation>, AccountsError> {
        let row = sqlx::query("SELECT * FROM invitations WHERE token = ?1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut invitation = crate::schema::decode_invitation(&row)?;
        if invitation.expire_if_due(Utc::now()) {
            self.persist_status(&invitation).await?;
        }
        Ok(Some(invitation))
    }

    /// Accept the invitation carrying given token, on behalf
    /// of given user. Succeeds exactly once per invitation.
    #[tracing::instrument(skip(self, token))]
    pub async fn accept(
        &self,
        token: &str,
        user_id: OpaqueId,
    ) -> Result<AccountMember, AccountsError> {
        let mut invitation = self
            .get_by_token(token)
            .await?
            .ok_or_else(|| AccountsError::not_found("invitation", "token"))?;

        invitation.accept()?;

        let member = self
            .members
            .add_member(
                invitation.account_id,
                user_id,
                &invitation.role_id,
                Some(invitation.invited_by),
            )
            .await?;

        self.persist_status(&invitation).await?;

        let mut uow = self.uow_factory.begin();
        uow.register(&DomainEvent::InvitationAccepted { id: invitation.id });
        uow.commit().await?;

        Ok(member)
    }

    /// Revoke given invitation. An accepted invitation cannot
    /// be revoked.
    #[tracing::instrument(skip(self))]
    pub async fn revoke(&self, id: OpaqueId) -> Result<(), AccountsError> {
        let row = sqlx::query("SELECT * FROM invitations WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AccountsError::not_found("invitation", id))?;

        let mut invitation = crate::schema::decode_invitation(&row)?;
        invitation.revoke()?;
        self.persist_status(&invitation).await?;

        let mut uow = self.uow_factory.begin();
        uow.register(&DomainEvent::InvitationRevoked { id });
        uow.commit().await?;
        Ok(())
    }

    async fn persist_status(&self, invitation: &Invitation) -> Result<(), AccountsError> {
        sqlx::query("UPDATE invitations SET status = ?1 WHERE id = ?2")
            .bind(invitation.status.as_str())
            .bind(invitation.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Mint a fresh globally-unique invitation token.
fn fresh_token() -> String {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    hex::encode(raw)
}

// ----------------------------------------
//                                      tests
// ----------------------------------------
