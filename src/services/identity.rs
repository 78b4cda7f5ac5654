//! Credential storage and session tokens.
//!
//! Accounts talk to an [`IdentityProvider`] so the credential backend can be
//! replaced without touching profiles. The bundled provider keeps argon2
//! hashes in the `identities` table and issues HS256 session tokens.

use crate::entities::{identities, prelude::*};
use crate::utils::auth::{Claims, create_jwt, validate_jwt};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("email already registered")]
    EmailTaken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("identity not found")]
    NotFound,

    #[error("invalid session token")]
    InvalidToken,

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub token: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, IdentityError>;

    /// Check the password and open a session. Unknown emails and wrong
    /// passwords are indistinguishable to the caller.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    async fn verify_token(&self, token: &str) -> Result<Claims, IdentityError>;

    async fn update_display_name(&self, uid: &str, display_name: &str)
    -> Result<(), IdentityError>;

    async fn delete_user(&self, uid: &str) -> Result<(), IdentityError>;
}

pub struct LocalIdentityProvider {
    db: DatabaseConnection,
    jwt_secret: SecretString,
}

impl LocalIdentityProvider {
    pub fn new(db: DatabaseConnection, jwt_secret: SecretString) -> Self {
        Self { db, jwt_secret }
    }

    fn hash_password(password: &str) -> Result<String, IdentityError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| IdentityError::Internal(e.to_string()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<identities::Model>, DbErr> {
        Identities::find()
            .filter(identities::Column::Email.eq(email))
            .one(&self.db)
            .await
    }
}

fn to_identity(model: identities::Model) -> Identity {
    Identity {
        uid: model.uid,
        email: model.email,
        display_name: model.display_name,
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, IdentityError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(IdentityError::EmailTaken);
        }

        let record = identities::ActiveModel {
            uid: Set(Uuid::new_v4().to_string()),
            email: Set(email.to_string()),
            password_hash: Set(Self::hash_password(password)?),
            display_name: Set(display_name.to_string()),
            created_at: Set(Utc::now()),
        };

        // The unique index catches a concurrent registration of the same email
        let model = record.insert(&self.db).await.map_err(|e| {
            let message = e.to_string().to_lowercase();
            if message.contains("unique") || message.contains("duplicate") {
                IdentityError::EmailTaken
            } else {
                IdentityError::Database(e)
            }
        })?;

        Ok(to_identity(model))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let record = self
            .find_by_email(email)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        let parsed_hash = PasswordHash::new(&record.password_hash)
            .map_err(|e| IdentityError::Internal(e.to_string()))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| IdentityError::InvalidCredentials)?;

        let token = create_jwt(&record.uid, self.jwt_secret.expose_secret())
            .map_err(|e| IdentityError::Internal(e.to_string()))?;

        Ok(Session {
            identity: to_identity(record),
            token,
        })
    }

    async fn verify_token(&self, token: &str) -> Result<Claims, IdentityError> {
        validate_jwt(token, self.jwt_secret.expose_secret()).map_err(|e| {
            tracing::debug!("Rejected session token: {}", e);
            IdentityError::InvalidToken
        })
    }

    async fn update_display_name(
        &self,
        uid: &str,
        display_name: &str,
    ) -> Result<(), IdentityError> {
        let record = Identities::find_by_id(uid.to_string())
            .one(&self.db)
            .await?
            .ok_or(IdentityError::NotFound)?;

        let mut active: identities::ActiveModel = record.into();
        active.display_name = Set(display_name.to_string());
        active.update(&self.db).await?;
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> Result<(), IdentityError> {
        let result = Identities::delete_by_id(uid.to_string())
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }
}
