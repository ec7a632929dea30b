use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;
use std::net::TcpStream;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

// Use atomic counter to give each test a unique port
static PORT_COUNTER: AtomicU16 = AtomicU16::new(9500);

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct StepTiming {
    name: String,
    time_ms: u64,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct SessionResponse {
    loaded: bool,
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    denoise_strength: f32,
    sharpen_strength: f32,
    denoise_label: String,
    sharpen_label: String,
    refresh: String,
    processing_time_ms: u64,
    steps: Vec<StepTiming>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    path: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct HealthResponse {
    status: String,
    version: String,
}

struct TestServer {
    child: Child,
    port: u16,
    output_dir: tempfile::TempDir,
    client: reqwest::Client,
}

impl TestServer {
    fn start() -> Self {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
        let output_dir = tempfile::tempdir().expect("Failed to create output dir");

        let child = Command::new(env!("CARGO_BIN_EXE_imgtune"))
            .args(["--host", "127.0.0.1", "--port", &port.to_string()])
            .arg("--output-dir")
            .arg(output_dir.path())
            .spawn()
            .expect("Failed to start server");

        // Wait for server to be ready
        let deadline = Instant::now() + Duration::from_secs(10);
        while TcpStream::connect(("127.0.0.1", port)).is_err() {
            assert!(Instant::now() < deadline, "Server did not start");
            std::thread::sleep(Duration::from_millis(50));
        }

        Self {
            child,
            port,
            output_dir,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    async fn get_state(&self) -> SessionResponse {
        self.client
            .get(self.url("/state"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse response")
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to send request")
    }

    async fn upload(&self, bytes: Vec<u8>) -> SessionResponse {
        let part = Part::bytes(bytes)
            .file_name("sample.png")
            .mime_str("image/png")
            .unwrap();
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/open"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.expect("Failed to parse response")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

fn sample_png() -> Vec<u8> {
    let img = RgbImage::from_fn(40, 30, |x, y| {
        let v = ((x * 41 + y * 67) % 256) as u8;
        Rgb([v, 255 - v, ((x + y) * 4) as u8])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start();

    let response: HealthResponse = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(response.status, "ok");
}

#[tokio::test]
async fn test_index_page_has_controls() {
    let server = TestServer::start();

    let body = server
        .client
        .get(server.url("/"))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .unwrap();

    assert!(body.contains("Original Image"));
    assert!(body.contains("Edited Image"));
    assert!(body.contains("Revert Image"));

    // Error bodies are not always JSON, so the status is checked before parsing
    let status_check = body.find("if (!response.ok)").expect("missing status check");
    let json_parse = body.find("return response.json()").expect("missing JSON parse");
    assert!(status_check < json_parse);
}

#[tokio::test]
async fn test_session_starts_empty() {
    let server = TestServer::start();

    let state = server.get_state().await;
    assert!(!state.loaded);
    assert_eq!(state.denoise_label, "0.0");
    assert_eq!(state.sharpen_label, "0.0");

    let response = server
        .client
        .get(server.url("/preview/edited.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_slider_on_empty_session_only_updates_labels() {
    let server = TestServer::start();

    let state: SessionResponse = server
        .post_json("/denoise", json!({ "value": 7.25 }))
        .await
        .json()
        .await
        .unwrap();

    assert!(!state.loaded);
    assert_eq!(state.refresh, "labels");
    assert_eq!(state.denoise_label, "7.3");
}

#[tokio::test]
async fn test_edit_revert_cycle() {
    let server = TestServer::start();

    let state = server.upload(sample_png()).await;
    assert!(state.loaded);
    assert_eq!(state.width, Some(40));
    assert_eq!(state.height, Some(30));
    assert_eq!(state.refresh, "panes");

    let state: SessionResponse = server
        .post_json("/denoise", json!({ "value": 12.34 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(state.denoise_label, "12.3");
    assert_eq!(state.refresh, "panes");
    assert_eq!(state.steps.len(), 1);

    let state: SessionResponse = server
        .post_json("/sharpen", json!({ "value": 5.0 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(state.sharpen_label, "3.0");
    assert_eq!(state.steps.len(), 2);

    let state: SessionResponse = server
        .client
        .post(server.url("/revert"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state.denoise_label, "0.0");
    assert_eq!(state.sharpen_label, "0.0");

    // After revert the two panes show the same picture
    let mut frames = Vec::new();
    for pane in ["original", "edited"] {
        let response = server
            .client
            .get(server.url(&format!("/preview/{}.png", pane)))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.bytes().await.unwrap();
        let frame = image::load_from_memory(&bytes).unwrap().into_rgb8();
        assert_eq!(frame.dimensions(), (400, 400));
        frames.push(frame);
    }
    assert_eq!(frames[0], frames[1]);
}

#[tokio::test]
async fn test_save_without_image_fails() {
    let server = TestServer::start();

    let response = server.post_json("/save", json!({ "path": "out.png" })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.code, "NO_IMAGE");
    assert_eq!(
        std::fs::read_dir(server.output_dir.path()).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_save_writes_png_into_output_dir() {
    let server = TestServer::start();
    server.upload(sample_png()).await;
    server.post_json("/sharpen", json!({ "value": 1.5 })).await;

    let response = server.post_json("/save", json!({ "path": "edited" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let saved: SaveResponse = response.json().await.unwrap();
    let expected = server.output_dir.path().join("edited.png");
    assert_eq!(saved.path, expected.display().to_string());

    let img = image::open(&expected).unwrap();
    assert_eq!((img.width(), img.height()), (40, 30));
}

#[tokio::test]
async fn test_unreachable_url_keeps_session_empty() {
    let server = TestServer::start();

    let response = server
        .post_json("/open/url", json!({ "url": "http://127.0.0.1:9/missing.png" }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.code, "LOAD_ERROR");
    assert!(error.error.contains("127.0.0.1:9"));

    assert!(!server.get_state().await.loaded);
}

#[tokio::test]
async fn test_open_from_path() {
    let server = TestServer::start();
    let path = server.output_dir.path().join("input.png");
    std::fs::write(&path, sample_png()).unwrap();

    let state: SessionResponse = server
        .post_json("/open/path", json!({ "path": path.display().to_string() }))
        .await
        .json()
        .await
        .unwrap();

    assert!(state.loaded);
    assert_eq!(state.source, Some(path.display().to_string()));
}

#[tokio::test]
async fn test_undecodable_upload_is_rejected() {
    let server = TestServer::start();
    server.upload(sample_png()).await;

    let part = Part::bytes(b"definitely not an image".to_vec()).file_name("junk.png");
    let response = server
        .client
        .post(server.url("/open"))
        .multipart(Form::new().part("file", part))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // The previous image is still loaded
    let state = server.get_state().await;
    assert_eq!(state.source.as_deref(), Some("sample.png"));
}
