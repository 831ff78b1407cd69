use std::path::PathBuf;

use crate::error::Result;
use crate::pipe::{Asset, Plugin};
use crate::value::Value;

/// Joins every asset in the stream into one file.
#[derive(Debug, Clone)]
pub struct Concat {
    file: PathBuf,
    separator: String,
}

impl Concat {
    pub fn new<P: Into<PathBuf>>(file: P) -> Self {
        Concat { file: file.into(), separator: "\n".into() }
    }

    pub fn separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.separator = separator.into();
        self
    }
}

impl Plugin for Concat {
    fn flush(&self, assets: Vec<Asset>) -> Result<Vec<Asset>> {
        let Some(first) = assets.first() else {
            return Ok(vec![]);
        };

        let base = first.base.clone();
        let contents = match assets.iter().map(|a| a.contents.as_str()).collect::<Option<Vec<_>>>() {
            Some(texts) => Value::from(texts.join(&self.separator)),
            None => {
                let mut bytes = vec![];
                for (i, asset) in assets.iter().enumerate() {
                    if i > 0 {
                        bytes.extend_from_slice(self.separator.as_bytes());
                    }

                    bytes.extend_from_slice(asset.contents.as_bytes().unwrap_or_default());
                }

                Value::from(bytes)
            }
        };

        Ok(vec![Asset::new(base, self.file.clone(), contents)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_joins_in_stream_order() {
        let assets = vec![Asset::new("libs", "b.js", "b()"), Asset::new("other", "a.js", "a()")];
        let joined = Concat::new("vendor.min.js").flush(assets).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].text().unwrap(), "b()\na()");
        assert_eq!(joined[0].base.to_str(), Some("libs"));
        assert_eq!(joined[0].path.to_str(), Some("vendor.min.js"));
    }

    #[test]
    fn empty_streams_produce_nothing() {
        assert!(Concat::new("x.css").flush(vec![]).unwrap().is_empty());
    }
}
