//! HTTP routes
//!
//! | Route         | Response                                   |
//! |---------------|--------------------------------------------|
//! | `/frame.mjpg` | live stream, `?fps=N` selects latest-join  |
//! | `/frame.jpeg` | next completed frame                       |
//! | `/status`     | status as JSON                             |
//! | `/view`       | page embedding the live stream             |
//! | `/`           | stream list and status                     |

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::device::StreamState;
use crate::protocol::constants::{JPEG_CONTENT_TYPE, STREAM_CONTENT_TYPE};
use crate::relay::{mjpeg_stream, snapshot, DeliveryMode, RelayConfig, SnapshotError};
use crate::stats::StatusReport;

use super::pages::{index_page, VIEW_PAGE};

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    stream: Arc<StreamState>,
    relay: Arc<RelayConfig>,
    next_client_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(stream: Arc<StreamState>, relay: RelayConfig) -> Self {
        Self {
            stream,
            relay: Arc::new(relay),
            next_client_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

/// Build the relay's router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/view", get(view))
        .route("/status", get(status))
        .route("/frame.mjpg", get(frame_stream))
        .route("/frame.jpeg", get(frame_snapshot))
        .with_state(state)
}

impl IntoResponse for SnapshotError {
    fn into_response(self) -> Response {
        let status = match self {
            SnapshotError::NotReady => StatusCode::NOT_FOUND,
            SnapshotError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SnapshotError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

async fn frame_stream(
    State(app): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if app.stream.health().is_failed() {
        return SnapshotError::Unavailable.into_response();
    }
    if !app.stream.chain().has_frames() {
        return SnapshotError::NotReady.into_response();
    }

    let mode = DeliveryMode::from_query(params.get("fps").map(String::as_str));
    let client_id = app.next_client_id.fetch_add(1, Ordering::Relaxed);
    let parts = mjpeg_stream(app.stream.clone(), mode, &app.relay, client_id);

    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, NO_CACHE),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

async fn frame_snapshot(State(app): State<AppState>) -> Response {
    match snapshot(&app.stream, app.relay.snapshot_timeout).await {
        Ok(jpeg) => (
            [
                (header::CONTENT_TYPE, JPEG_CONTENT_TYPE),
                (header::CACHE_CONTROL, NO_CACHE),
            ],
            jpeg,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn status(State(app): State<AppState>) -> Json<StatusReport> {
    Json(StatusReport::collect(&app.stream))
}

async fn view() -> Html<&'static str> {
    Html(VIEW_PAGE)
}

async fn index(State(app): State<AppState>) -> Response {
    match index_page(&StatusReport::collect(&app.stream)) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render status");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::chain::FrameWriter;
    use crate::device::StreamHealth;

    async fn spawn_app(state: Arc<StreamState>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(AppState::new(state, RelayConfig::default()));
        tokio::spawn(async move { axum::serve(listener, app).await });
        addr
    }

    fn request(path: &str) -> String {
        format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
    }

    /// Issue a request and read the whole response
    async fn get(addr: SocketAddr, path: &str) -> (u16, String, Vec<u8>) {
        let mut socket = TcpStream::connect(addr).await.unwrap();
        socket.write_all(request(path).as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        socket.read_to_end(&mut raw).await.unwrap();

        let split = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        let head = String::from_utf8_lossy(&raw[..split]).into_owned();
        let status = head[9..12].parse().unwrap();
        (status, head, raw[split + 4..].to_vec())
    }

    fn push(writer: &mut FrameWriter, payload: &'static [u8]) {
        writer.push(Bytes::from_static(payload), false);
    }

    #[tokio::test]
    async fn test_not_found_before_first_frame() {
        let (state, _writer) = StreamState::new("http://cam/video");
        let addr = spawn_app(state).await;

        let (status, _, body) = get(addr, "/frame.mjpg").await;
        assert_eq!(status, 404);
        assert_eq!(body, b"No frames received");

        let (status, _, _) = get(addr, "/frame.jpeg").await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn test_unavailable_after_failure() {
        let (state, mut writer) = StreamState::new("http://cam/video");
        push(&mut writer, b"frame");
        state.set_health(StreamHealth::Failed);
        let addr = spawn_app(state).await;

        let (status, _, _) = get(addr, "/frame.mjpg").await;
        assert_eq!(status, 503);
        let (status, _, _) = get(addr, "/frame.jpeg").await;
        assert_eq!(status, 503);
    }

    #[tokio::test]
    async fn test_snapshot_returns_payload() {
        let (state, mut writer) = StreamState::new("http://cam/video");
        push(&mut writer, b"old");
        let addr = spawn_app(state).await;

        let producer = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(20)).await;
                push(&mut writer, b"\xFF\xD8fresh\xFF\xD9");
            }
        });

        let (status, head, body) = get(addr, "/frame.jpeg").await;
        assert_eq!(status, 200);
        assert!(head.to_ascii_lowercase().contains("content-type: image/jpeg"));
        assert_eq!(body, b"\xFF\xD8fresh\xFF\xD9");

        producer.abort();
    }

    #[tokio::test]
    async fn test_live_stream() {
        let (state, mut writer) = StreamState::new("http://cam/video");
        push(&mut writer, b"before");
        let addr = spawn_app(state.clone()).await;

        let producer = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(20)).await;
                push(&mut writer, b"LIVEFRAME");
            }
        });

        let mut socket = TcpStream::connect(addr).await.unwrap();
        socket
            .write_all(request("/frame.mjpg?fps=25").as_bytes())
            .await
            .unwrap();

        let expected = b"--myboundary\r\nContent-Type: image/jpeg\r\n\r\nLIVEFRAME\r\n";
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        tokio::time::timeout(Duration::from_secs(5), async {
            while !raw.windows(expected.len()).any(|w| w == expected) {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "stream closed early");
                raw.extend_from_slice(&chunk[..n]);
            }
        })
        .await
        .unwrap();

        let head = String::from_utf8_lossy(&raw).to_ascii_lowercase();
        assert!(head.starts_with("http/1.1 200"));
        assert!(head.contains("content-type: multipart/x-mixed-replace; boundary=--myboundary"));
        assert_eq!(state.subscriber_count(), 1);

        drop(socket);
        producer.abort();
    }

    #[tokio::test]
    async fn test_status_json() {
        let (state, mut writer) = StreamState::new("http://cam/video");
        push(&mut writer, b"12345");
        state.record_frame(5);
        let addr = spawn_app(state).await;

        let (status, _, body) = get(addr, "/status").await;
        assert_eq!(status, 200);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["url"], "http://cam/video");
        assert_eq!(json["health"], "starting");
        assert_eq!(json["current_frame"], 1);
        assert_eq!(json["frames_received"], 1);
        assert_eq!(json["bytes_received"], 5);
        assert_eq!(json["subscribers"], 0);
    }

    #[tokio::test]
    async fn test_pages() {
        let (state, _writer) = StreamState::new("http://cam/video");
        let addr = spawn_app(state).await;

        let (status, _, body) = get(addr, "/view").await;
        assert_eq!(status, 200);
        assert_eq!(body, VIEW_PAGE.as_bytes());

        let (status, head, body) = get(addr, "/").await;
        assert_eq!(status, 200);
        assert!(head.to_ascii_lowercase().contains("text/html"));
        assert!(String::from_utf8_lossy(&body).contains("Available streams"));
    }
}
