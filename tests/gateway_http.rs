//! HttpGateway against a one-shot local HTTP responder.

use image_detect_lib::config::GatewayConfig;
use image_detect_lib::error::GatewayError;
use image_detect_lib::models::analysis_types::{AnalysisMethod, SourceFile};
use image_detect_lib::models::gateway_types::RawAnalysis;
use image_detect_lib::services::gateway::{Gateway, HttpGateway};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct Reply {
    status: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Reply {
    fn json(status: &'static str, body: &str) -> Self {
        Reply {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Serves one request with `reply` and hands back the raw request text.
///
/// Only framing by Content-Length (or no body) is understood. Chunked
/// bodies, keep-alive and more than one request are not supported; the
/// gateway sends fixed-length multipart forms, so none are needed here.
async fn serve_once(reply: Reply) -> (GatewayConfig, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];

        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            let head_end = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
            let complete = head_end.is_some_and(|end| {
                let head = String::from_utf8_lossy(&buf[..end]);
                buf.len() >= end + content_length(&head)
            });
            if n == 0 || complete {
                break;
            }
        }

        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            reply.status,
            reply.content_type,
            reply.body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&reply.body).await.unwrap();
        socket.shutdown().await.unwrap();

        String::from_utf8_lossy(&buf).to_string()
    });

    (GatewayConfig::new(format!("http://{}", addr)), handle)
}

/// A base URL nothing listens on.
async fn closed_port() -> GatewayConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    GatewayConfig::new(format!("http://{}", addr))
}

fn jpeg() -> SourceFile {
    SourceFile::new("face.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
}

#[tokio::test]
async fn test_huggingface_form_and_string_scores() {
    let (config, server) = serve_once(Reply::json(
        "200 OK",
        r#"{"result": {"fake": "0.82", "real": "0.18", "prediction": "fake"}}"#,
    ))
    .await;
    let gateway = HttpGateway::new(config).unwrap();

    let raw = gateway
        .submit_single_model_analysis(&jpeg(), AnalysisMethod::Huggingface, None, true)
        .await
        .unwrap();
    match raw {
        RawAnalysis::Single(single) => {
            assert!((single.fake - 0.82).abs() < 1e-9);
            assert_eq!(single.prediction.as_deref(), Some("fake"));
        }
        other => panic!("expected single result, got {:?}", other),
    }

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /huggingface "));
    assert!(request.contains("name=\"file\"; filename=\"face.jpg\""));
    assert!(request.contains("name=\"device\"\r\n\r\ncpu"));
    assert!(request.contains("name=\"recortar_cara\"\r\n\r\ntrue"));
    assert!(!request.contains("name=\"model_name\""));
}

#[tokio::test]
async fn test_xception_sends_model_name() {
    let (config, server) = serve_once(Reply::json(
        "200 OK",
        r#"{"result": {"fake": 0.4, "real": 0.6, "prediction": "real", "model_name": "x.pth"}}"#,
    ))
    .await;
    let gateway = HttpGateway::new(config).unwrap();

    gateway
        .submit_single_model_analysis(&jpeg(), AnalysisMethod::Xception, Some("x.pth"), false)
        .await
        .unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /xception/detect "));
    assert!(request.contains("name=\"model_name\"\r\n\r\nx.pth"));
    assert!(request.contains("name=\"recortar_cara\"\r\n\r\nfalse"));
}

#[tokio::test]
async fn test_xception_without_model_fails_before_network() {
    let gateway = HttpGateway::new(closed_port().await).unwrap();
    let err = gateway
        .submit_single_model_analysis(&jpeg(), AnalysisMethod::Xception, None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
}

#[tokio::test]
async fn test_oversized_file_fails_before_network() {
    let gateway = HttpGateway::new(closed_port().await).unwrap();
    let big = SourceFile::new("big.png", "image/png", vec![0u8; 10 * 1024 * 1024 + 1]);

    let err = gateway.submit_ensemble_analysis(&big, false).await.unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));

    let err = gateway.request_face_crop(&big).await.unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
}

#[tokio::test]
async fn test_ensemble_response_is_tagged() {
    let (config, server) = serve_once(Reply::json(
        "200 OK",
        r#"{
            "results": [{"model_name": "huggingface", "prediction": "real", "real": 0.7, "fake": 0.3}],
            "final_decision_majority": {"prediction": "real", "confidence": 1.0},
            "final_decision_average": {"prediction": "real", "confidence": 0.7}
        }"#,
    ))
    .await;
    let gateway = HttpGateway::new(config).unwrap();

    let raw = gateway.submit_ensemble_analysis(&jpeg(), false).await.unwrap();
    match raw {
        RawAnalysis::Ensemble(ensemble) => assert_eq!(ensemble.results.len(), 1),
        other => panic!("expected ensemble result, got {:?}", other),
    }
    assert!(server.await.unwrap().starts_with("POST /ensemble/detect "));
}

#[tokio::test]
async fn test_empty_crop_is_processing_error() {
    let (config, server) = serve_once(Reply {
        status: "200 OK",
        content_type: "image/png",
        body: Vec::new(),
    })
    .await;
    let gateway = HttpGateway::new(config).unwrap();

    let err = gateway.request_face_crop(&jpeg()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Processing(_)));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /cut_face "));
    assert!(!request.contains("name=\"device\""));
}

#[tokio::test]
async fn test_crop_returns_image_bytes() {
    let (config, _server) = serve_once(Reply {
        status: "200 OK",
        content_type: "image/jpeg",
        body: vec![0xFF, 0xD8, 0xFF, 0xD9],
    })
    .await;
    let gateway = HttpGateway::new(config).unwrap();

    let cropped = gateway.request_face_crop(&jpeg()).await.unwrap();
    assert_eq!(cropped.mime, "image/jpeg");
    assert_eq!(cropped.bytes, vec![0xFF, 0xD8, 0xFF, 0xD9]);
}

#[tokio::test]
async fn test_model_list() {
    let (config, server) = serve_once(Reply::json(
        "200 OK",
        r#"{"available_models": [
            {"filename": "xception_ff.pth", "size_bytes": 83886080, "model_type": "xception"},
            {"filename": "xception_celeb.pth", "size_bytes": 1048576, "model_type": "xception"}
        ]}"#,
    ))
    .await;
    let gateway = HttpGateway::new(config).unwrap();

    let models = gateway.list_available_models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id, "xception_ff.pth");
    assert_eq!(models[1].size_label(), "1.0 MB");
    assert!(server.await.unwrap().starts_with("GET /xception/weights "));
}

#[tokio::test]
async fn test_missing_model_list_is_empty() {
    let (config, _server) = serve_once(Reply::json("200 OK", "{}")).await;
    let gateway = HttpGateway::new(config).unwrap();
    assert!(gateway.list_available_models().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_server_error_message_is_passed_through() {
    let (config, _server) = serve_once(Reply::json(
        "500 Internal Server Error",
        r#"{"detail": "CUDA out of memory"}"#,
    ))
    .await;
    let gateway = HttpGateway::new(config).unwrap();

    let err = gateway.submit_ensemble_analysis(&jpeg(), false).await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::Server {
            status: 500,
            message: "CUDA out of memory".into()
        }
    );
}

#[tokio::test]
async fn test_failure_without_body_is_transport() {
    let (config, _server) = serve_once(Reply {
        status: "502 Bad Gateway",
        content_type: "text/plain",
        body: Vec::new(),
    })
    .await;
    let gateway = HttpGateway::new(config).unwrap();

    let err = gateway.list_available_models().await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
}

#[tokio::test]
async fn test_connectivity_probe() {
    let (config, _server) = serve_once(Reply::json("200 OK", r#"{"available_models": []}"#)).await;
    assert!(HttpGateway::new(config).unwrap().check_connectivity().await);

    let (config, _server) = serve_once(Reply::json("503 Service Unavailable", "{}")).await;
    assert!(!HttpGateway::new(config).unwrap().check_connectivity().await);

    let gateway = HttpGateway::new(closed_port().await).unwrap();
    assert!(!gateway.check_connectivity().await);

    let err = gateway.list_available_models().await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
}
