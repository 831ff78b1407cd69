use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::util::PathExt;

/// What connected browsers should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// Reload the page.
    Full,
    /// Refetch these stylesheets, relative to the served directory, without
    /// reloading the page.
    Css(Vec<PathBuf>),
}

impl ReloadEvent {
    /// The name of the server-sent event.
    pub fn name(&self) -> &'static str {
        match self {
            ReloadEvent::Full => "reload",
            ReloadEvent::Css(_) => "css",
        }
    }

    /// The payload of the server-sent event: a JSON list of paths.
    pub fn data(&self) -> String {
        let paths: Vec<_> = match self {
            ReloadEvent::Full => vec![],
            ReloadEvent::Css(paths) => paths.iter().map(|p| p.to_slash().into_owned()).collect(),
        };

        serde_json::Value::from(paths).to_string()
    }
}

/// Broadcasts [`ReloadEvent`]s to every connected browser.
#[derive(Debug, Clone)]
pub struct Reloader {
    sender: broadcast::Sender<ReloadEvent>,
}

impl Reloader {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        Reloader { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.sender.subscribe()
    }

    pub fn reload(&self) {
        self.send(ReloadEvent::Full);
    }

    pub fn stream_css(&self, paths: Vec<PathBuf>) {
        if !paths.is_empty() {
            self.send(ReloadEvent::Css(paths));
        }
    }

    fn send(&self, event: ReloadEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(clients) => tracing::debug!(event = name, clients, "sent reload event"),
            Err(_) => tracing::trace!(event = name, "no clients to notify"),
        }
    }
}

impl Default for Reloader {
    fn default() -> Self {
        Reloader::new()
    }
}
