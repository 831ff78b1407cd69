use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use spindle::{err, error};
use spindle::error::{Chainable, Result};
use spindle::plugins::Basepath;
use spindle::server::ServerConfig;
use spindle::value::{Dict, Format, Toml, Value};
use spindle::watch::WatchOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Stylesheets bundled into `vendor.min.css`, in order.
    #[serde(alias = "STYLE_LIBS")]
    pub style_libs: Vec<String>,
    /// Scripts bundled into `vendor.min.js`, in order.
    #[serde(alias = "JS_LIBS")]
    pub js_libs: Vec<String>,
    pub src: PathBuf,
    pub dist: PathBuf,
    pub html: Html,
    pub server: Server,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Html {
    pub prefix: String,
    /// `@root`, `@file`, or a directory relative to the project root.
    pub basepath: String,
    pub context: FxHashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub open: bool,
    pub cors: bool,
    pub poll: bool,
    pub poll_interval_ms: u64,
    pub debounce_ms: u64,
}

impl Config {
    /// Reads `file`, or `spindle.toml` in `root` if it exists.
    pub fn load(root: &Path, file: Option<&Path>) -> Result<Config> {
        let path = match file {
            Some(file) => root.join(file),
            None if root.join(crate::CONFIG_FILE).is_file() => root.join(crate::CONFIG_FILE),
            None => return Ok(Config::default()),
        };

        let config: Config = Toml::read(path.as_path())
            .chain_with(|| error!("invalid configuration", "path" => path.display()))?;

        if config.html.prefix.is_empty() {
            return err! {
                "invalid configuration",
                "path" => path.display(),
                "html.prefix" => "must not be empty",
            };
        }

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}

impl Html {
    pub fn basepath(&self, root: &Path) -> Basepath {
        match self.basepath.as_str() {
            "@root" => Basepath::Root(root.to_path_buf()),
            "@file" => Basepath::File,
            dir => Basepath::Dir(root.join(dir)),
        }
    }

    pub fn context(&self) -> Value {
        let dict: Dict = self.context.iter()
            .map(|(k, v)| (k.as_str().into(), v.clone()))
            .collect();

        Value::from(dict)
    }
}

impl Server {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            open: self.open,
            cors: self.cors,
        }
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            poll: self.poll,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            style_libs: vec![],
            js_libs: vec![],
            src: "src".into(),
            dist: "dist".into(),
            html: Html::default(),
            server: Server::default(),
        }
    }
}

impl Default for Html {
    fn default() -> Self {
        Html {
            prefix: "@@".into(),
            basepath: "@root".into(),
            context: FxHashMap::from_iter([("test".to_string(), Value::from("text"))]),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        let server = ServerConfig::default();
        let watch = WatchOptions::default();
        Server {
            host: server.host,
            port: server.port,
            open: server.open,
            cors: server.cors,
            poll: watch.poll,
            poll_interval_ms: watch.poll_interval.as_millis() as u64,
            debounce_ms: watch.debounce.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn missing_file_means_defaults() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::load(root.path(), None).unwrap();
        assert_eq!(config.dist, Path::new("dist"));
        assert_eq!(config.server.port, 3000);
        assert!(config.server.open && config.server.poll);
        assert_eq!(config.html.context().lookup("test").and_then(|v| v.as_str()), Some("text"));
        assert!(Config::load(root.path(), Some(Path::new("other.toml"))).is_err());
    }

    #[test]
    fn library_lists_accept_both_spellings() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("spindle.toml"), r#"
            STYLE_LIBS = ["node_modules/normalize.css/normalize.css"]
            js_libs = ["node_modules/a/a.js", "node_modules/b/b.js"]

            [html]
            context = { title = "Home", year = 2024 }

            [server]
            port = 0
            open = false
        "#).unwrap();

        let config = Config::load(root.path(), None).unwrap();
        assert_eq!(config.style_libs, ["node_modules/normalize.css/normalize.css"]);
        assert_eq!(config.js_libs.len(), 2);
        assert_eq!(config.server.port, 0);
        assert!(!config.server.open);
        assert_eq!(config.server.debounce_ms, 100);
        assert_eq!(config.html.prefix, "@@");
        assert_eq!(config.html.context().lookup("year").map(|v| v.to_string()).as_deref(), Some("2024"));
        assert_eq!(config.html.basepath(root.path()), Basepath::Root(root.path().to_path_buf()));
    }

    #[test]
    fn empty_include_prefix_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("spindle.toml"), "[html]\nprefix = \"\"\n").unwrap();
        let error = Config::load(root.path(), None).unwrap_err().to_string();
        assert!(error.contains("invalid configuration"), "{error}");
        assert!(error.contains("html.prefix: must not be empty"), "{error}");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("spindle.toml"), "[server]\nprot = 8080\n").unwrap();
        let error = Config::load(root.path(), None).unwrap_err().to_string();
        assert!(error.contains("invalid configuration"), "{error}");
        assert!(error.contains("prot"), "{error}");
    }
}
