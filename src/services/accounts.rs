use crate::entities::users::PlanTier;
use crate::entities::{billings, conversations, prelude::*, users};
use crate::services::identity::{IdentityError, IdentityProvider};
use crate::utils::auth::Claims;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_THEME: &str = "system";

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("Este email já está cadastrado")]
    EmailTaken,

    #[error("Email ou senha incorretos")]
    InvalidCredentials,

    #[error("Token inválido ou ausente")]
    Unauthenticated,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Usuário não encontrado")]
    NotFound,

    #[error("identity provider error: {0}")]
    Identity(IdentityError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl From<IdentityError> for AccountError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::EmailTaken => AccountError::EmailTaken,
            IdentityError::InvalidCredentials => AccountError::InvalidCredentials,
            IdentityError::InvalidToken => AccountError::Unauthenticated,
            IdentityError::NotFound => AccountError::NotFound,
            IdentityError::Database(e) => AccountError::Database(e),
            other => AccountError::Identity(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Only non-empty fields are applied.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct AccountService {
    db: DatabaseConnection,
    identity: Arc<dyn IdentityProvider>,
}

impl AccountService {
    pub fn new(db: DatabaseConnection, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { db, identity }
    }

    /// Create credentials, then the profile. A failed profile insert removes
    /// the credentials again so the email can be reused.
    pub async fn register(&self, account: NewAccount) -> Result<users::Model, AccountError> {
        let email = normalize_email(&account.email);
        let name = account.name.trim().to_string();

        let existing = Users::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let identity = self
            .identity
            .create_user(&email, &account.password, &name)
            .await?;

        let now = Utc::now();
        let profile = users::ActiveModel {
            id: Set(identity.uid.clone()),
            name: Set(name),
            email: Set(email),
            phone: Set(None),
            photo_url: Set(None),
            plan: Set(PlanTier::Free),
            plan_expires_at: Set(None),
            email_verified: Set(false),
            manual_signup: Set(true),
            notifications_enabled: Set(true),
            theme: Set(DEFAULT_THEME.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match profile.insert(&self.db).await {
            Ok(user) => {
                tracing::info!("👤 Registered user {}", user.id);
                Ok(user)
            }
            Err(e) => {
                if let Err(cleanup) = self.identity.delete_user(&identity.uid).await {
                    tracing::warn!(
                        "Failed to roll back identity {} after profile error: {}",
                        identity.uid,
                        cleanup
                    );
                }
                Err(AccountError::Database(e))
            }
        }
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(String, users::Model), AccountError> {
        let session = self
            .identity
            .sign_in(&normalize_email(email), password)
            .await?;

        // Credentials without a profile are treated like unknown credentials
        let user = Users::find_by_id(session.identity.uid.clone())
            .one(&self.db)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        Ok((session.token, user))
    }

    pub async fn authenticate(&self, token: &str) -> Result<Claims, AccountError> {
        Ok(self.identity.verify_token(token).await?)
    }

    pub async fn profile(&self, uid: &str) -> Result<users::Model, AccountError> {
        Users::find_by_id(uid.to_string())
            .one(&self.db)
            .await?
            .ok_or(AccountError::NotFound)
    }

    pub async fn update_profile(
        &self,
        uid: &str,
        changes: ProfileChanges,
    ) -> Result<users::Model, AccountError> {
        let user = self.profile(uid).await?;

        let name = non_empty(changes.name);
        let mut active: users::ActiveModel = user.into();
        if let Some(name) = &name {
            active.name = Set(name.clone());
        }
        if let Some(phone) = non_empty(changes.phone) {
            active.phone = Set(Some(phone));
        }
        if let Some(photo_url) = non_empty(changes.photo_url) {
            active.photo_url = Set(Some(photo_url));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&self.db).await?;

        if let Some(name) = name {
            self.identity.update_display_name(uid, &name).await?;
        }

        Ok(updated)
    }

    /// Remove credentials, then the profile with its conversations and
    /// billings in one transaction.
    pub async fn delete_account(&self, uid: &str) -> Result<(), AccountError> {
        let identity_found = match self.identity.delete_user(uid).await {
            Ok(()) => true,
            Err(IdentityError::NotFound) => {
                tracing::warn!("No credentials for {} while deleting account", uid);
                false
            }
            Err(e) => return Err(e.into()),
        };

        let txn = self.db.begin().await?;

        let removed_conversations = Conversations::delete_many()
            .filter(conversations::Column::UserId.eq(uid))
            .exec(&txn)
            .await?
            .rows_affected;

        Billings::delete_many()
            .filter(billings::Column::UserId.eq(uid))
            .exec(&txn)
            .await?;

        let removed_users = Users::delete_by_id(uid.to_string())
            .exec(&txn)
            .await?
            .rows_affected;

        txn.commit().await?;

        if removed_users == 0 && !identity_found {
            return Err(AccountError::NotFound);
        }

        tracing::info!(
            "🗑️  Deleted account {} ({} conversations)",
            uid,
            removed_conversations
        );
        Ok(())
    }

    /// Keep a description in the user's history.
    pub async fn record_conversation(
        &self,
        uid: &str,
        prompt: &str,
        description: &str,
    ) -> Result<conversations::Model, AccountError> {
        let conversation = conversations::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(uid.to_string()),
            prompt: Set(prompt.to_string()),
            description: Set(description.to_string()),
            created_at: Set(Utc::now()),
        };
        Ok(conversation.insert(&self.db).await?)
    }
}
