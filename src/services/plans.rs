use crate::entities::{prelude::*, users, users::PlanTier};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub const CURRENCY: &str = "BRL";

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlanInfo {
    pub id: PlanTier,
    pub name: String,
    pub price_cents: i64,
    pub currency: String,
    /// `None` for plans that never expire
    pub duration_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlanStatus {
    pub plan: PlanTier,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_premium: bool,
}

impl From<&users::Model> for PlanStatus {
    fn from(user: &users::Model) -> Self {
        Self {
            plan: user.plan,
            expires_at: user.plan_expires_at,
            is_premium: user.plan == PlanTier::Premium,
        }
    }
}

pub struct PlanService {
    db: DatabaseConnection,
    premium_price_cents: i64,
    duration_days: i64,
}

impl PlanService {
    pub fn new(db: DatabaseConnection, premium_price_cents: i64, duration_days: i64) -> Self {
        Self {
            db,
            premium_price_cents,
            duration_days,
        }
    }

    pub fn premium_price_cents(&self) -> i64 {
        self.premium_price_cents
    }

    pub fn duration_days(&self) -> i64 {
        self.duration_days
    }

    pub fn catalog(&self) -> Vec<PlanInfo> {
        vec![
            PlanInfo {
                id: PlanTier::Free,
                name: "Gratuito".to_string(),
                price_cents: 0,
                currency: CURRENCY.to_string(),
                duration_days: None,
            },
            PlanInfo {
                id: PlanTier::Premium,
                name: "Premium".to_string(),
                price_cents: self.premium_price_cents,
                currency: CURRENCY.to_string(),
                duration_days: Some(self.duration_days),
            },
        ]
    }

    /// Current plan of `uid`, downgrading an expired premium plan first.
    pub async fn status(&self, uid: &str) -> Result<PlanStatus, PlanError> {
        self.status_at(uid, Utc::now()).await
    }

    pub async fn status_at(&self, uid: &str, now: DateTime<Utc>) -> Result<PlanStatus, PlanError> {
        // Conditional so a payment landing between read and write is never undone
        let downgraded = Users::update_many()
            .set(downgrade())
            .filter(users::Column::Id.eq(uid))
            .filter(users::Column::Plan.eq(PlanTier::Premium))
            .filter(users::Column::PlanExpiresAt.lte(now))
            .exec(&self.db)
            .await?
            .rows_affected;

        if downgraded > 0 {
            tracing::info!("⏬ Premium plan of {} expired, downgraded to free", uid);
        }

        let user = Users::find_by_id(uid.to_string())
            .one(&self.db)
            .await?
            .ok_or(PlanError::UserNotFound)?;

        Ok(PlanStatus::from(&user))
    }

    /// Set `uid` to premium until `now + days`.
    pub async fn grant_premium(
        &self,
        uid: &str,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<PlanStatus, PlanError> {
        grant_premium_on(&self.db, uid, days, now).await
    }

    /// Downgrade every expired premium user. Returns how many were changed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, PlanError> {
        let result = Users::update_many()
            .set(downgrade())
            .filter(users::Column::Plan.eq(PlanTier::Premium))
            .filter(users::Column::PlanExpiresAt.lte(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

/// Premium grant usable inside a caller's transaction.
pub async fn grant_premium_on<C: ConnectionTrait>(
    conn: &C,
    uid: &str,
    days: i64,
    now: DateTime<Utc>,
) -> Result<PlanStatus, PlanError> {
    let expires_at = now + Duration::days(days);

    let updated = Users::update_many()
        .set(users::ActiveModel {
            plan: Set(PlanTier::Premium),
            plan_expires_at: Set(Some(expires_at)),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(users::Column::Id.eq(uid))
        .exec(conn)
        .await?
        .rows_affected;

    if updated == 0 {
        return Err(PlanError::UserNotFound);
    }

    tracing::info!("⭐ {} is premium until {}", uid, expires_at);

    Ok(PlanStatus {
        plan: PlanTier::Premium,
        expires_at: Some(expires_at),
        is_premium: true,
    })
}

fn downgrade() -> users::ActiveModel {
    users::ActiveModel {
        plan: Set(PlanTier::Free),
        plan_expires_at: Set(None),
        ..Default::default()
    }
}
