use std::path::{Path, PathBuf};
use std::sync::Arc;

use derive_more::Debug;
use rayon::prelude::*;

use crate::error::{Chainable, Result};
use crate::glob::Globs;
use crate::value::{Sink, Source, Value};

/// A file flowing through a [`Pipe`].
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// The directory `path` is relative to: the base of the glob that matched.
    pub base: PathBuf,
    /// Where the asset lands, relative to the destination directory.
    pub path: PathBuf,
    pub contents: Value,
    /// The file the contents were read from, while they are unmodified.
    pub origin: Option<PathBuf>,
}

impl Asset {
    pub fn new<B, P, V>(base: B, path: P, contents: V) -> Self
        where B: Into<PathBuf>, P: Into<PathBuf>, V: Into<Value>
    {
        Asset { base: base.into(), path: path.into(), contents: contents.into(), origin: None }
    }

    /// Reads `base/path` from disk.
    pub fn read<B: Into<PathBuf>, P: Into<PathBuf>>(base: B, path: P) -> Result<Self> {
        let (base, path) = (base.into(), path.into());
        let origin = base.join(&path);
        let contents = origin.as_path().read()?;
        Ok(Asset { base, path, contents: contents.into(), origin: Some(origin) })
    }

    /// The contents as text. Fails for binary assets.
    pub fn text(&self) -> Result<&str> {
        match &self.contents {
            Value::String(s) => Ok(&**s),
            v => err! {
                "expected a text asset",
                "path" => self.path.display(),
                "found" => v.kind(),
            },
        }
    }

    /// Replaces the contents, detaching the asset from its origin file.
    pub fn set_contents<V: Into<Value>>(&mut self, contents: V) {
        self.contents = contents.into();
        self.origin = None;
    }

    pub fn with_contents<V: Into<Value>>(mut self, contents: V) -> Self {
        self.set_contents(contents);
        self
    }

    pub fn file_name(&self) -> &str {
        self.path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }
}

impl Source for &Asset {
    type Value = Value;

    fn read(self) -> Result<Value> {
        Ok(self.contents.clone())
    }

    fn path(&self) -> Option<&Path> {
        self.origin.as_deref()
    }
}

/// A step in a [`Pipe`].
///
/// `map` sees one asset at a time and may run concurrently for many assets;
/// returning `None` drops the asset from the stream. `flush` sees the whole
/// stream, in order, once every asset has been mapped.
pub trait Plugin: std::fmt::Debug + Send + Sync {
    fn map(&self, asset: Asset) -> Result<Option<Asset>> {
        Ok(Some(asset))
    }

    fn flush(&self, assets: Vec<Asset>) -> Result<Vec<Asset>> {
        Ok(assets)
    }
}

/// A glob-matched set of files piped through a sequence of [`Plugin`]s.
///
/// ```rust,no_run
/// use spindle::pipe::Pipe;
/// use spindle::plugins::{Concat, Uglify};
///
/// let written = Pipe::src(".", ["src/js/**/*.js"])?
///     .pipe(Uglify::default())
///     .pipe(Concat::new("main.min.js"))
///     .dest("dist/js")?;
/// # Ok::<(), spindle::error::Error>(())
/// ```
#[derive(Debug)]
pub struct Pipe {
    root: PathBuf,
    globs: Globs,
    #[debug(ignore)]
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Pipe {
    /// Matches `globs`, written relative to `root`.
    pub fn src<R, I, S>(root: R, globs: I) -> Result<Self>
        where R: Into<PathBuf>, I: IntoIterator<Item = S>, S: AsRef<str>
    {
        Ok(Pipe::from_globs(root, Globs::new(globs)?))
    }

    pub fn from_globs<R: Into<PathBuf>>(root: R, globs: Globs) -> Self {
        Pipe { root: root.into(), globs, plugins: vec![] }
    }

    pub fn pipe<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Reads every matched file and runs it through the plugins.
    pub fn run(self) -> Result<Vec<Asset>> {
        let matches = self.globs.expand(&self.root)?;
        let mut assets = matches.into_par_iter()
            .map(|m| Asset::read(m.base, m.path))
            .collect::<Result<Vec<_>>>()?;

        for plugin in &self.plugins {
            assets = assets.into_par_iter()
                .map(|asset| {
                    let path = asset.path.clone();
                    plugin.map(asset).chain_with(|| error! {
                        "pipe step failed",
                        "step" => format!("{plugin:?}"),
                        "asset" => path.display(),
                    })
                })
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect();

            assets = plugin.flush(assets)
                .chain_with(|| error!("pipe step failed", "step" => format!("{plugin:?}")))?;
        }

        Ok(assets)
    }

    /// Runs the pipe and writes every asset to `dir`, returning the paths
    /// written, in stream order.
    pub fn dest<D: AsRef<Path>>(self, dir: D) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(dir.as_ref());
        let assets = self.run()?;
        write_assets(&dir, assets)
    }
}

/// Writes `assets` under `dir`, creating directories as needed.
pub fn write_assets(dir: &Path, assets: Vec<Asset>) -> Result<Vec<PathBuf>> {
    assets.into_par_iter()
        .map(|asset| {
            let output = dir.join(&asset.path);
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent).chain_with(|| error! {
                    "failed to create output directory",
                    "directory" => parent.display(),
                })?;
            }

            output.write(asset.contents)?;
            tracing::debug!(path = %output.display(), "wrote asset");
            Ok(output)
        })
        .collect()
}
