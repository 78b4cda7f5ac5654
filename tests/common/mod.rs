#![allow(dead_code)]

use acessivision_backend::config::AppConfig;
use acessivision_backend::infrastructure::database::setup_database;
use acessivision_backend::services::collaborators::{
    CaptionAnswer, Captioner, CollaboratorError, SpeechSynthesizer, Translator,
};
use acessivision_backend::services::payment::{
    PaymentGateway, PaymentStatus, PixCharge, PixChargeRequest,
};
use acessivision_backend::services::pipeline::Collaborators;
use acessivision_backend::{AppState, create_app};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, Response},
};
use futures::StreamExt;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const BOUNDARY: &str = "---------------------------acessivision0123456789";

pub struct FakeTranslator {
    entries: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeTranslator {
    pub fn new(entries: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            entries: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(
        &self,
        text: &str,
        _from: Option<&str>,
        _to: &str,
    ) -> Result<String, CollaboratorError> {
        self.calls.lock().unwrap().push(text.to_string());
        Ok(self
            .entries
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }
}

pub enum CaptionScript {
    Whole(&'static str),
    Chunks(Vec<&'static str>),
    Fail(&'static str),
}

pub struct FakeCaptioner {
    script: CaptionScript,
    pub seen: Mutex<Vec<(Vec<u8>, String)>>,
}

impl FakeCaptioner {
    pub fn new(script: CaptionScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Captioner for FakeCaptioner {
    async fn query(&self, image: &[u8], question: &str) -> Result<CaptionAnswer, CollaboratorError> {
        self.seen
            .lock()
            .unwrap()
            .push((image.to_vec(), question.to_string()));
        match &self.script {
            CaptionScript::Whole(text) => Ok(CaptionAnswer::Complete(text.to_string())),
            CaptionScript::Chunks(chunks) => {
                let items: Vec<Result<String, CollaboratorError>> =
                    chunks.iter().map(|c| Ok(c.to_string())).collect();
                Ok(CaptionAnswer::Fragmented(futures::stream::iter(items).boxed()))
            }
            CaptionScript::Fail(message) => Err(CollaboratorError::Api {
                service: "captioner",
                status: 503,
                message: message.to_string(),
            }),
        }
    }
}

pub struct FakeSpeech;

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Bytes, CollaboratorError> {
        Ok(Bytes::from(format!("ID3:{lang}:{text}")))
    }
}

/// In-memory payment provider. Charges start pending unless built with
/// [`FakeGateway::opening_as`].
#[derive(Default)]
pub struct FakeGateway {
    statuses: Mutex<HashMap<String, PaymentStatus>>,
    opening_status: Option<PaymentStatus>,
    pub charges: Mutex<Vec<PixChargeRequest>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Provider that reports every new charge with `status` right away.
    pub fn opening_as(status: PaymentStatus) -> Arc<Self> {
        Arc::new(Self {
            opening_status: Some(status),
            ..Self::default()
        })
    }

    pub fn set_status(&self, payment_id: &str, status: PaymentStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(payment_id.to_string(), status);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_pix_charge(
        &self,
        request: &PixChargeRequest,
    ) -> Result<PixCharge, CollaboratorError> {
        let mut charges = self.charges.lock().unwrap();
        charges.push(request.clone());
        let payment_id = format!("{}", 1000 + charges.len());
        let status = self.opening_status.clone().unwrap_or(PaymentStatus::Pending);
        self.set_status(&payment_id, status.clone());

        Ok(PixCharge {
            payment_id: payment_id.clone(),
            status,
            qr_code: Some(format!("00020126pix{payment_id}")),
            qr_code_base64: Some("iVBORw0KGgo=".to_string()),
            ticket_url: Some(format!("https://pay.example/{payment_id}")),
        })
    }

    async fn payment_status(
        &self,
        payment_id: &str,
    ) -> Result<Option<PaymentStatus>, CollaboratorError> {
        Ok(self.statuses.lock().unwrap().get(payment_id).cloned())
    }
}

pub async fn build_state(
    staging: &Path,
    collaborators: Collaborators,
    gateway: Arc<dyn PaymentGateway>,
) -> AppState {
    build_state_with(AppConfig::development(staging), collaborators, gateway).await
}

pub async fn build_state_with(
    config: AppConfig,
    collaborators: Collaborators,
    gateway: Arc<dyn PaymentGateway>,
) -> AppState {
    let db = setup_database(&config.database_url).await.unwrap();
    AppState::new(db, config, collaborators, gateway)
}

/// Describe app whose error responses hide collaborator and parser details.
pub async fn quiet_describe_app(
    staging: &Path,
    translator: Arc<FakeTranslator>,
    captioner: Arc<FakeCaptioner>,
) -> (Router, AppState) {
    let config = AppConfig {
        expose_error_details: false,
        ..AppConfig::development(staging)
    };
    let collaborators = Collaborators {
        translator,
        captioner,
        synthesizer: Arc::new(FakeSpeech),
    };
    let state = build_state_with(config, collaborators, FakeGateway::new()).await;
    (create_app(state.clone()), state)
}

/// App with the given translator and captioner, fake speech and payments.
pub async fn describe_app(
    staging: &Path,
    translator: Arc<FakeTranslator>,
    captioner: Arc<FakeCaptioner>,
) -> (Router, AppState) {
    let collaborators = Collaborators {
        translator,
        captioner,
        synthesizer: Arc::new(FakeSpeech),
    };
    let state = build_state(staging, collaborators, FakeGateway::new()).await;
    (create_app(state.clone()), state)
}

/// App for account and billing tests; describing is never exercised.
pub async fn account_app(staging: &Path, gateway: Arc<dyn PaymentGateway>) -> (Router, AppState) {
    let collaborators = Collaborators {
        translator: FakeTranslator::new(&[]),
        captioner: FakeCaptioner::new(CaptionScript::Whole("")),
        synthesizer: Arc::new(FakeSpeech),
    };
    let state = build_state(staging, collaborators, gateway).await;
    (create_app(state.clone()), state)
}

pub fn multipart_body(file: Option<(&str, &[u8])>, prompt: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(prompt) = prompt {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"prompt\"\r\n\r\n{prompt}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        panic!("response is not JSON: {:?}", String::from_utf8_lossy(&bytes))
    })
}

pub fn staged_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
