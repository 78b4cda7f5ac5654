use secrecy::SecretString;
use std::env;
use std::path::PathBuf;

/// Runtime configuration for the API, the describe pipeline and its collaborators
#[derive(Debug)]
pub struct AppConfig {
    /// Port for the API server (default: 3000)
    pub port: u16,

    /// Directory where uploads are staged while being described
    pub staging_dir: PathBuf,

    /// Maximum decoded image size in bytes (default: 5 MB)
    pub max_upload_size: usize,

    /// Prompt used when the client does not send one
    pub default_prompt: String,

    /// Language the user writes prompts in (default: "pt")
    pub prompt_source_lang: String,

    /// Language the captioning model understands (default: "en")
    pub prompt_target_lang: String,

    /// Language of the returned description (default: "pt")
    pub answer_target_lang: String,

    /// Language code handed to the speech synthesizer (default: "pt")
    pub speech_lang: String,

    /// Moondream API key
    pub moondream_api_key: Option<SecretString>,

    /// Moondream API base URL
    pub moondream_api_url: String,

    /// Ask Moondream for a streamed (SSE) answer instead of a single JSON body
    pub moondream_stream: bool,

    /// Translation endpoint base URL
    pub translate_api_url: String,

    /// Speech synthesis endpoint base URL
    pub tts_api_url: String,

    /// Include collaborator error messages in 500 responses (default: true)
    pub expose_error_details: bool,

    /// sea-orm connection string
    pub database_url: String,

    pub jwt_secret: SecretString,

    /// Mercado Pago access token used for PIX charges
    pub mercadopago_access_token: Option<SecretString>,

    pub mercadopago_api_url: String,

    /// Premium plan price in cents (default: 990 = R$ 9,90)
    pub premium_price_cents: i64,

    /// How long a paid premium plan lasts (default: 30 days)
    pub plan_duration_days: i64,

    /// CORS allowed origins, "*" allows any
    pub allowed_origins: Vec<String>,
}

pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024; // 5 MB
pub const DEFAULT_PROMPT: &str = "Descreva a imagem.";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            staging_dir: env::temp_dir().join("uploads"),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            default_prompt: DEFAULT_PROMPT.to_string(),
            prompt_source_lang: "pt".to_string(),
            prompt_target_lang: "en".to_string(),
            answer_target_lang: "pt".to_string(),
            speech_lang: "pt".to_string(),
            moondream_api_key: None,
            moondream_api_url: "https://api.moondream.ai/v1".to_string(),
            moondream_stream: false,
            translate_api_url: "https://translate.googleapis.com".to_string(),
            tts_api_url: "https://translate.google.com".to_string(),
            expose_error_details: true,
            database_url: "sqlite://acessivision.db?mode=rwc".to_string(),
            jwt_secret: SecretString::from("secret"),
            mercadopago_access_token: None,
            mercadopago_api_url: "https://api.mercadopago.com".to_string(),
            premium_price_cents: 990,
            plan_duration_days: 30,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            default_prompt: env::var("DEFAULT_PROMPT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.default_prompt),

            prompt_source_lang: env::var("PROMPT_SOURCE_LANG")
                .unwrap_or(default.prompt_source_lang),

            prompt_target_lang: env::var("PROMPT_TARGET_LANG")
                .unwrap_or(default.prompt_target_lang),

            answer_target_lang: env::var("ANSWER_TARGET_LANG")
                .unwrap_or(default.answer_target_lang),

            speech_lang: env::var("SPEECH_LANG").unwrap_or(default.speech_lang),

            moondream_api_key: env::var("MOONDREAM_API_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .map(SecretString::from),

            moondream_api_url: env::var("MOONDREAM_API_URL")
                .unwrap_or(default.moondream_api_url),

            moondream_stream: env::var("MOONDREAM_STREAM")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.moondream_stream),

            translate_api_url: env::var("TRANSLATE_API_URL")
                .unwrap_or(default.translate_api_url),

            tts_api_url: env::var("TTS_API_URL").unwrap_or(default.tts_api_url),

            expose_error_details: env::var("EXPOSE_ERROR_DETAILS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.expose_error_details),

            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            jwt_secret: env::var("JWT_SECRET")
                .map(SecretString::from)
                .unwrap_or(default.jwt_secret),

            mercadopago_access_token: env::var("MERCADOPAGO_ACCESS_TOKEN")
                .ok()
                .filter(|v| !v.is_empty())
                .map(SecretString::from),

            mercadopago_api_url: env::var("MERCADOPAGO_API_URL")
                .unwrap_or(default.mercadopago_api_url),

            premium_price_cents: env::var("PREMIUM_PRICE_CENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.premium_price_cents),

            plan_duration_days: env::var("PLAN_DURATION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.plan_duration_days),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Config for local development and tests: staging under the given directory,
    /// in-memory database, no payment provider.
    pub fn development(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            database_url: "sqlite::memory:".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8081".to_string(), // Expo dev server
                "http://127.0.0.1:3000".to_string(),
            ],
            ..Self::default()
        }
    }

    /// Body limit for upload routes. Base64 inflates payloads by a third and
    /// multipart adds framing, so the HTTP limit is twice the decoded ceiling.
    pub fn upload_body_limit(&self) -> usize {
        self.max_upload_size.saturating_mul(2)
    }
}
