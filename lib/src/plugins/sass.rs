use crate::error::{Chainable, Result};
use crate::pipe::{Asset, Plugin};
use crate::value::{Grass, Mapper};

/// Compiles `.scss` and `.sass` assets to compressed CSS.
///
/// Partials, files whose name starts with `_`, are dropped: they are only
/// reachable through `@use` or `@import` from other stylesheets.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sass {
    log_errors: bool,
}

impl Sass {
    pub fn new() -> Self {
        Sass::default()
    }

    /// Logs compile errors and drops the failing asset instead of failing.
    pub fn log_errors(mut self) -> Self {
        self.log_errors = true;
        self
    }
}

impl Plugin for Sass {
    fn map(&self, mut asset: Asset) -> Result<Option<Asset>> {
        if asset.file_name().starts_with('_') {
            return Ok(None);
        }

        let dir = match &asset.origin {
            Some(origin) => origin.parent().map(|p| p.to_path_buf()).unwrap_or_default(),
            None => asset.base.join(asset.path.parent().unwrap_or(&asset.base)),
        };

        let css = Grass::compressed()
            .load_path(&dir)
            .load_path(&asset.base)
            .map(&asset)
            .chain_with(|| error!("sass compilation failed", "asset" => asset.path.display()));

        match css {
            Ok(css) => {
                asset.path.set_extension("css");
                Ok(Some(asset.with_contents(css)))
            }
            Err(e) if self.log_errors => {
                tracing::error!("{e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn partials_are_dropped() {
        let partial = Asset::new("src/sass", "blocks/_header.scss", "$x: 1px;");
        assert!(Sass::new().map(partial).unwrap().is_none());
    }

    #[test]
    fn sources_compile_to_css_next_to_their_path() {
        let root = tempfile::tempdir().unwrap();
        let sass = root.path().join("sass");
        fs::create_dir_all(&sass).unwrap();
        fs::write(sass.join("_vars.scss"), "$color: red;").unwrap();
        fs::write(sass.join("main.scss"), "@import 'vars';\nbody { a { color: $color; } }").unwrap();

        let asset = Asset::read(&sass, "main.scss").unwrap();
        let css = Sass::new().map(asset).unwrap().unwrap();
        assert_eq!(css.path.to_str(), Some("main.css"));
        assert!(css.text().unwrap().contains("body a{color:red}"), "{:?}", css.contents);
    }

    #[test]
    fn errors_are_logged_or_propagated() {
        let broken = || Asset::new("src/sass", "main.scss", "a { color: ");
        assert!(Sass::new().map(broken()).is_err());
        assert!(Sass::new().log_errors().map(broken()).unwrap().is_none());
    }
}
