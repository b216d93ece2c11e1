// src/serve/mod.rs

//! Live-preview server.
//!
//! Serves the output root over plain HTTP and pushes a `reload` Server-Sent
//! Event to every open page whenever a task with `reload = true` writes
//! output. HTML pages get a small script injected that listens for it.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::config::model::ServeSection;
use crate::events::{BuildEvent, EventBus};

pub const LIVERELOAD_PATH: &str = "/__sitedag/livereload";

const RELOAD_SCRIPT: &str = "<script>(function(){var s=new EventSource(\"/__sitedag/livereload\");\
s.addEventListener(\"reload\",function(){location.reload();});})();</script>";

#[derive(Debug, Clone)]
struct ServeState {
    output_root: PathBuf,
    bus: EventBus,
}

/// A running preview server. Dropping it stops the server.
#[derive(Debug)]
pub struct PreviewServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl PreviewServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}

impl Drop for PreviewServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn router(output_root: PathBuf, bus: EventBus) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(livereload))
        .fallback(serve_file)
        .with_state(ServeState { output_root, bus })
}

/// Bind `[serve]`'s address (port `0` picks an ephemeral one) and start
/// serving `output_root`.
pub async fn start(cfg: &ServeSection, output_root: PathBuf, bus: EventBus) -> Result<PreviewServer> {
    let listener = TcpListener::bind((cfg.host.as_str(), cfg.port))
        .await
        .with_context(|| format!("binding preview server to {}:{}", cfg.host, cfg.port))?;
    let addr = listener.local_addr()?;

    let app = router(output_root, bus);
    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!("preview server stopped: {err}");
        }
    });

    info!("preview server listening on http://{addr}/");
    Ok(PreviewServer { addr, handle })
}

async fn livereload(
    State(state): State<ServeState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    debug!("live-reload client connected");
    let stream = BroadcastStream::new(state.bus.subscribe()).filter_map(|event| match event {
        Ok(BuildEvent::OutputChanged { task }) => Some(Ok(Event::default().event("reload").data(task))),
        // A lagged client just misses intermediate events.
        _ => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn serve_file(State(state): State<ServeState>, uri: Uri) -> Response {
    let Some(rel) = request_path(uri.path()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let mut path = state.output_root.join(&rel);
    if tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
        path = path.join("index.html");
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    let mime = content_type(&path);
    if mime.starts_with("text/html") {
        let html = String::from_utf8_lossy(&bytes);
        return ([(header::CONTENT_TYPE, mime)], inject_reload_script(&html)).into_response();
    }
    ([(header::CONTENT_TYPE, mime)], bytes).into_response()
}

/// Map a URL path to a path relative to the output root. The path is
/// percent-decoded first; `..` and non-UTF-8 escapes are rejected.
pub fn request_path(url_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(url_path).decode_utf8().ok()?;
    let rel = PathBuf::from(decoded.trim_start_matches('/'));
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(rel)
}

/// Insert the live-reload script before `</body>`, or append it.
pub fn inject_reload_script(html: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + RELOAD_SCRIPT.len());
            out.push_str(&html[..pos]);
            out.push_str(RELOAD_SCRIPT);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}{RELOAD_SCRIPT}"),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") | Some("map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}
