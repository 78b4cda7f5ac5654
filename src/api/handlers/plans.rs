use crate::AppState;
use crate::api::error::AppError;
use crate::services::plans::{PlanInfo, PlanStatus};
use crate::utils::auth::Claims;
use axum::{Extension, Json, extract::State};

#[utoipa::path(
    get,
    path = "/plans",
    responses(
        (status = 200, description = "Available plans", body = [PlanInfo])
    ),
    tag = "plans"
)]
pub async fn list_plans(State(state): State<AppState>) -> Json<Vec<PlanInfo>> {
    Json(state.plans.catalog())
}

#[utoipa::path(
    get,
    path = "/plans/status",
    responses(
        (status = 200, description = "Plan of the signed-in user", body = PlanStatus),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "plans"
)]
pub async fn plan_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<PlanStatus>, AppError> {
    Ok(Json(state.plans.status(&claims.sub).await?))
}
