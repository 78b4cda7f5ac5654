pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::accounts::AccountService;
use crate::services::billing::BillingService;
use crate::services::identity::LocalIdentityProvider;
use crate::services::payment::PaymentGateway;
use crate::services::pipeline::{Collaborators, UploadPipeline};
use crate::services::plans::PlanService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::upload::describe_image,
        api::handlers::upload::describe_image_aloud,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::update_profile,
        api::handlers::auth::delete_account,
        api::handlers::plans::list_plans,
        api::handlers::plans::plan_status,
        api::handlers::billing::create_billing,
        api::handlers::billing::payment_webhook,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::upload::DescriptionResponse,
            api::handlers::upload::UploadForm,
            services::pipeline::JsonUpload,
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::RegisterResponse,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::LoginResponse,
            api::handlers::auth::UserProfile,
            api::handlers::auth::UpdateProfileRequest,
            api::handlers::auth::MessageResponse,
            services::plans::PlanInfo,
            services::plans::PlanStatus,
            entities::users::PlanTier,
            entities::billings::BillingStatus,
            api::handlers::billing::BillingResponse,
            api::handlers::billing::WebhookAck,
            services::billing::WebhookEvent,
            services::billing::WebhookData,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "system", description = "Health check"),
        (name = "describe", description = "Image description and speech"),
        (name = "auth", description = "Account endpoints"),
        (name = "plans", description = "Plan catalog and status"),
        (name = "billing", description = "PIX billing and payment notifications")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub pipeline: Arc<UploadPipeline>,
    pub accounts: Arc<AccountService>,
    pub plans: Arc<PlanService>,
    pub billing: Arc<BillingService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire services around the given collaborators. Accounts use the local
    /// identity provider backed by `db`.
    pub fn new(
        db: DatabaseConnection,
        config: AppConfig,
        collaborators: Collaborators,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let identity = Arc::new(LocalIdentityProvider::new(
            db.clone(),
            SecretString::from(config.jwt_secret.expose_secret().to_owned()),
        ));
        let plans = Arc::new(PlanService::new(
            db.clone(),
            config.premium_price_cents,
            config.plan_duration_days,
        ));

        Self {
            pipeline: Arc::new(UploadPipeline::from_config(&config, collaborators)),
            accounts: Arc::new(AccountService::new(db.clone(), identity)),
            billing: Arc::new(BillingService::new(db.clone(), gateway, plans.clone())),
            plans,
            db,
            config: Arc::new(config),
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}

pub fn create_app(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.upload_body_limit());
    let require_auth = || from_fn_with_state(state.clone(), api::middleware::auth::auth_middleware);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::health::health_check))
        .route(
            "/upload",
            post(api::handlers::upload::describe_image).layer(upload_limit.clone()),
        )
        .route(
            "/upload/audio",
            post(api::handlers::upload::describe_image_aloud).layer(upload_limit),
        )
        .route("/auth/register", post(api::handlers::auth::register))
        .route("/auth/login", post(api::handlers::auth::login))
        .route(
            "/auth/profile/:uid",
            put(api::handlers::auth::update_profile).layer(require_auth()),
        )
        .route(
            "/auth/delete/:uid",
            delete(api::handlers::auth::delete_account).layer(require_auth()),
        )
        .route("/plans", get(api::handlers::plans::list_plans))
        .route(
            "/plans/status",
            get(api::handlers::plans::plan_status).layer(require_auth()),
        )
        .route(
            "/billing",
            post(api::handlers::billing::create_billing).layer(require_auth()),
        )
        .route(
            "/billing/webhook",
            post(api::handlers::billing::payment_webhook),
        )
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config.allowed_origins))
        .with_state(state)
}
