use std::path::PathBuf;

use crate::error::Result;
use crate::pipe::{Asset, Plugin};

/// Renames assets: replaces the whole path, or adjusts its parts.
///
/// ```rust
/// use spindle::pipe::{Asset, Plugin};
/// use spindle::plugins::Rename;
///
/// let asset = Asset::new("src/sass", "blocks/main.css", "");
/// let renamed = Rename::default().suffix(".min").map(asset).unwrap().unwrap();
/// assert_eq!(renamed.path.to_str(), Some("blocks/main.min.css"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct Rename {
    path: Option<PathBuf>,
    prefix: String,
    suffix: String,
    basename: Option<String>,
    extname: Option<String>,
    flatten: bool,
}

impl Rename {
    /// Renames every asset to exactly `path`.
    pub fn to<P: Into<PathBuf>>(path: P) -> Self {
        Rename { path: Some(path.into()), ..Default::default() }
    }

    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Replaces the file name without its extension.
    pub fn basename<S: Into<String>>(mut self, basename: S) -> Self {
        self.basename = Some(basename.into());
        self
    }

    /// Replaces the extension; `extname` includes the leading `.`, if any.
    pub fn extname<S: Into<String>>(mut self, extname: S) -> Self {
        self.extname = Some(extname.into());
        self
    }

    /// Drops the directory part, moving every asset to the top level.
    pub fn flatten(mut self) -> Self {
        self.flatten = true;
        self
    }
}

impl Plugin for Rename {
    fn map(&self, mut asset: Asset) -> Result<Option<Asset>> {
        if let Some(path) = &self.path {
            asset.path = path.clone();
            return Ok(Some(asset));
        }

        let stem = match &self.basename {
            Some(basename) => basename.clone(),
            None => asset.path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default(),
        };

        let ext = match &self.extname {
            Some(extname) => extname.clone(),
            None => asset.extension().map(|e| format!(".{e}")).unwrap_or_default(),
        };

        let file_name = format!("{}{stem}{}{ext}", self.prefix, self.suffix);
        asset.path = match (self.flatten, asset.path.parent()) {
            (false, Some(parent)) => parent.join(file_name),
            _ => PathBuf::from(file_name),
        };

        Ok(Some(asset))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn rename(rename: &Rename, path: &str) -> PathBuf {
        rename.map(Asset::new("src", path, "")).unwrap().unwrap().path
    }

    #[test]
    fn flatten_moves_pages_to_the_top_level() {
        let flatten = Rename::default().flatten();
        assert_eq!(rename(&flatten, "pages/about/team.html"), Path::new("team.html"));
        assert_eq!(rename(&flatten, "index.html"), Path::new("index.html"));
    }

    #[test]
    fn parts_combine() {
        let css = Rename::default().prefix("x-").suffix(".min").extname(".css");
        assert_eq!(rename(&css, "a/main.scss"), Path::new("a/x-main.min.css"));
        assert_eq!(rename(&Rename::to("sprite.svg"), "a/b/c.svg"), Path::new("sprite.svg"));
        assert_eq!(rename(&Rename::default().basename("app"), "LICENSE"), Path::new("app"));
    }
}
