mod common;

use acessivision_backend::entities::{conversations, prelude::*};
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::*;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use tower::ServiceExt;

const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JFIFcachorro";

#[tokio::test]
async fn test_multipart_upload_is_described_in_portuguese() {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("uploads");
    let translator = FakeTranslator::new(&[
        ("O que há na imagem?", "What is in the image?"),
        ("A dog", "Um cachorro"),
    ]);
    let captioner = FakeCaptioner::new(CaptionScript::Whole("A dog"));
    let (app, _state) = describe_app(&staging, translator.clone(), captioner.clone()).await;

    let response = app
        .oneshot(multipart_request(
            "/upload",
            multipart_body(Some(("cachorro.jpg", JPEG)), Some("O que há na imagem?")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "description": "Um cachorro" }));

    let seen = captioner.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, JPEG);
    assert_eq!(seen[0].1, "What is in the image?");
    assert_eq!(
        *translator.calls.lock().unwrap(),
        vec!["O que há na imagem?".to_string(), "A dog".to_string()]
    );

    assert_eq!(staged_files(&staging), 0);
}

#[tokio::test]
async fn test_untouched_file_input_before_real_image_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("uploads");
    let translator = FakeTranslator::new(&[("A dog", "Um cachorro")]);
    let captioner = FakeCaptioner::new(CaptionScript::Whole("A dog"));
    let (app, _state) = describe_app(&staging, translator, captioner.clone()).await;

    // Browsers submit an empty `filename=""` part for a file input left blank
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"foto\"; filename=\"\"\r\nContent-Type: application/octet-stream\r\n\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"real.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(JPEG);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let response = app
        .oneshot(multipart_request("/upload", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "description": "Um cachorro" }));
    assert_eq!(captioner.seen.lock().unwrap()[0].0, JPEG);
    assert_eq!(staged_files(&staging), 0);
}

#[tokio::test]
async fn test_upload_without_image_is_rejected_and_nothing_is_staged() {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("uploads");
    let captioner = FakeCaptioner::new(CaptionScript::Whole("unused"));
    let (app, _state) = describe_app(&staging, FakeTranslator::new(&[]), captioner.clone()).await;

    let response = app
        .clone()
        .oneshot(multipart_request(
            "/upload",
            multipart_body(None, Some("Descreva a imagem.")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Nenhuma imagem foi enviada." })
    );

    let response = app
        .oneshot(json_request("POST", "/upload", json!({ "prompt": "oi" }), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(captioner.seen.lock().unwrap().is_empty());
    assert_eq!(staged_files(&staging), 0);
}

#[tokio::test]
async fn test_captioner_failure_returns_500_and_cleans_up() {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("uploads");
    let captioner = FakeCaptioner::new(CaptionScript::Fail("model overloaded"));
    let (app, _state) = describe_app(&staging, FakeTranslator::new(&[]), captioner.clone()).await;

    let response = app
        .oneshot(multipart_request(
            "/upload",
            multipart_body(Some(("foto.jpg", JPEG)), None),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Erro ao processar a imagem: "));
    assert!(message.contains("model overloaded"));

    // The default prompt was used
    assert_eq!(captioner.seen.lock().unwrap()[0].1, "Descreva a imagem.");
    assert_eq!(staged_files(&staging), 0);
}

#[tokio::test]
async fn test_json_upload_with_streamed_answer() {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("uploads");
    let translator = FakeTranslator::new(&[("Hello world", "Olá mundo")]);
    let captioner = FakeCaptioner::new(CaptionScript::Chunks(vec!["Hello", " ", "world"]));
    let (app, _state) = describe_app(&staging, translator.clone(), captioner.clone()).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/upload",
            json!({ "image": STANDARD.encode(JPEG), "prompt": "Descreva a imagem." }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "description": "Olá mundo" }));
    assert_eq!(captioner.seen.lock().unwrap()[0].0, JPEG);
    assert_eq!(translator.calls.lock().unwrap()[1], "Hello world");
    assert_eq!(staged_files(&staging), 0);
}

#[tokio::test]
async fn test_invalid_base64_is_a_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("uploads");
    let captioner = FakeCaptioner::new(CaptionScript::Whole("unused"));
    let (app, _state) = describe_app(&staging, FakeTranslator::new(&[]), captioner.clone()).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/upload",
            json!({ "image": "***" }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(captioner.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_json_hides_parser_details_when_configured() {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("uploads");
    let captioner = FakeCaptioner::new(CaptionScript::Whole("unused"));
    let (app, _state) =
        quiet_describe_app(&staging, FakeTranslator::new(&[]), captioner.clone()).await;

    let response = app
        .oneshot(json_request("POST", "/upload", json!({ "image": 12 }), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Erro ao processar os dados enviados." })
    );
    assert!(captioner.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_image_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("uploads");
    let captioner = FakeCaptioner::new(CaptionScript::Whole("unused"));
    let (app, state) = describe_app(&staging, FakeTranslator::new(&[]), captioner.clone()).await;

    let too_big = vec![0u8; state.config.max_upload_size + 1];
    let response = app
        .oneshot(multipart_request(
            "/upload",
            multipart_body(Some(("grande.jpg", too_big.as_slice())), None),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(captioner.seen.lock().unwrap().is_empty());
    assert_eq!(staged_files(&staging), 0);
}

#[tokio::test]
async fn test_audio_variant_returns_mpeg() {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("uploads");
    let translator = FakeTranslator::new(&[("A dog", "Um cachorro")]);
    let captioner = FakeCaptioner::new(CaptionScript::Whole("A dog"));
    let (app, _state) = describe_app(&staging, translator, captioner).await;

    let response = app
        .oneshot(multipart_request(
            "/upload/audio",
            multipart_body(Some(("cachorro.jpg", JPEG)), None),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "audio/mpeg");
    assert_eq!(
        response.headers()["content-disposition"],
        "inline; filename=\"audio.mp3\""
    );
    assert_eq!(&body_bytes(response).await[..], b"ID3:pt:Um cachorro");
    assert_eq!(staged_files(&staging), 0);
}

#[tokio::test]
async fn test_signed_in_upload_is_saved_to_history() {
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("uploads");
    let translator = FakeTranslator::new(&[("A dog", "Um cachorro")]);
    let captioner = FakeCaptioner::new(CaptionScript::Whole("A dog"));
    let (app, state) = describe_app(&staging, translator, captioner).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            json!({ "email": "ana@example.com", "password": "segredo1", "nome": "Ana" }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let uid = body_json(response).await["uid"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "ana@example.com", "password": "segredo1" }),
            None,
        ))
        .await
        .unwrap();
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    let response = app
        .oneshot(json_request(
            "POST",
            "/upload",
            json!({ "image": STANDARD.encode(JPEG) }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let history = Conversations::find()
        .filter(conversations::Column::UserId.eq(uid.as_str()))
        .all(&state.db)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].description, "Um cachorro");
    assert_eq!(history[0].prompt, "Descreva a imagem.");
}

#[tokio::test]
async fn test_health_check() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _state) = describe_app(
        tmp.path(),
        FakeTranslator::new(&[]),
        FakeCaptioner::new(CaptionScript::Whole("")),
    )
    .await;

    let response = app.oneshot(empty_request("GET", "/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "AcessiVision API");
    assert!(body["timestamp"].as_str().is_some());
}
