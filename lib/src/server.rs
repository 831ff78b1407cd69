//! A development server for the built site, with live reload.
//!
//! Every HTML page served gets a small script injected that listens for
//! [`ReloadEvent`]s over server-sent events: the page reloads on `reload` and
//! refetches its stylesheets on `css`.

use std::convert::Infallible;
use std::future::{Future, IntoFuture};
use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{Chainable, Result};
use crate::reload::{ReloadEvent, Reloader};

pub const EVENTS_PATH: &str = "/__spindle/events";
pub const SCRIPT_PATH: &str = "/__spindle/reload.js";

const RELOAD_JS: &str = include_str!("reload.js");
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    /// `0` binds an ephemeral port.
    pub port: u16,
    /// Open the site in a browser once the server is listening.
    pub open: bool,
    pub cors: bool,
}

#[derive(Debug, Clone)]
pub struct DevServer {
    config: ServerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { host: "127.0.0.1".into(), port: 3000, open: true, cors: true }
    }
}

impl DevServer {
    pub fn new(config: ServerConfig) -> Self {
        DevServer { config }
    }

    pub fn router(&self, dist: &Path, reloader: Reloader) -> Router {
        let router = Router::new()
            .route(EVENTS_PATH, get(events))
            .route(SCRIPT_PATH, get(script))
            .fallback_service(ServeDir::new(dist))
            .with_state(reloader)
            .layer(middleware::from_fn(inject_reload_script))
            .layer(TraceLayer::new_for_http());

        match self.config.cors {
            true => router.layer(CorsLayer::permissive()),
            false => router,
        }
    }

    /// Serves `dist` until Ctrl+C, blocking the current thread.
    pub fn run(&self, dist: &Path, reloader: Reloader) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .chain_with(|| error!("failed to start the dev server runtime"))?;

        runtime.block_on(self.serve(dist, reloader, ctrl_c()))
    }

    /// Serves `dist` on the configured address until `shutdown` resolves.
    pub async fn serve<F>(&self, dist: &Path, reloader: Reloader, shutdown: F) -> Result<()>
        where F: Future<Output = ()> + Send + 'static
    {
        let (host, port) = (self.config.host.as_str(), self.config.port);
        let listener = TcpListener::bind((host, port)).await
            .chain_with(|| error!("failed to bind dev server", "address" => format!("{host}:{port}")))?;

        self.serve_on(listener, dist, reloader, shutdown).await
    }

    pub async fn serve_on<F>(
        &self,
        listener: TcpListener,
        dist: &Path,
        reloader: Reloader,
        shutdown: F,
    ) -> Result<()>
        where F: Future<Output = ()> + Send + 'static
    {
        let url = format!("http://{}/", listener.local_addr()?);
        tracing::info!(%url, directory = %dist.display(), "dev server listening");
        if self.config.open {
            open_browser(&url);
        }

        // Live-reload connections never end on their own: once shutdown
        // begins, they get a grace period before being dropped.
        let (closing, mut closed) = tokio::sync::watch::channel(false);
        let signal = async move {
            shutdown.await;
            let _ = closing.send(true);
        };

        let serving = axum::serve(listener, self.router(dist, reloader))
            .with_graceful_shutdown(signal)
            .into_future();

        let grace = async move {
            let _ = closed.wait_for(|closed| *closed).await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        };

        tokio::select! {
            result = serving => result.chain_with(|| error!("dev server failed", "url" => &url))?,
            _ = grace => tracing::debug!("dropping open connections"),
        }

        tracing::info!("dev server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C.
pub async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C, shutting down"),
        Err(e) => {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await
        }
    }
}

/// Inserts the reload script before `</body>`, or at the end without one.
///
/// ```rust
/// use spindle::server::inject_script;
///
/// let html = inject_script("<p>hi</p></BODY>");
/// assert_eq!(html, "<p>hi</p><script src=\"/__spindle/reload.js\"></script></BODY>");
/// ```
pub fn inject_script(html: &str) -> String {
    let tag = format!("<script src=\"{SCRIPT_PATH}\"></script>");
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(i) => format!("{}{tag}{}", &html[..i], &html[i..]),
        None => format!("{html}{tag}"),
    }
}

async fn events(State(reloader): State<Reloader>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(reloader.subscribe())
        .filter_map(|event| event.ok())
        .map(|event: ReloadEvent| Ok(Event::default().event(event.name()).data(event.data())));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], RELOAD_JS)
}

async fn inject_reload_script(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let html = response.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.starts_with("text/html"));

    if !html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("failed to buffer html response: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    let html = inject_script(&String::from_utf8_lossy(&bytes));
    Response::from_parts(parts, Body::from(html))
}

fn open_browser(url: &str) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "explorer"
    } else {
        "xdg-open"
    };

    match std::process::Command::new(opener).arg(url).spawn() {
        Ok(_) => tracing::debug!(opener, url, "opened browser"),
        Err(e) => tracing::warn!("failed to open a browser with `{opener}`: {e}"),
    }
}
