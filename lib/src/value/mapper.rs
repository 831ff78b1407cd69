use std::sync::Arc;

use crate::error::{ErrorDetail, Result};
use crate::value::{Value, Source};

pub trait Mapper {
    type Output: Into<Value> + 'static;

    fn map<I: Source>(&self, input: I) -> Result<Self::Output>;
}

pub trait Format: Sized {
    /// The data format's error type.
    type Error: serde::de::Error + ErrorDetail + 'static;

    /// Parses `string` as the data format `Self` as a `T` or returns an error
    /// if the `string` is an invalid `T`. Typically used indirectly via
    /// [`Format::read()`].
    fn from_str<T: serde::de::DeserializeOwned>(string: &str) -> Result<T, Self::Error>;

    fn read<I: Source, T: serde::de::DeserializeOwned>(input: I) -> Result<T> {
        let input = input.try_read::<Arc<str>>()?;
        Ok(Self::from_str(&input)?)
    }
}

impl<F: Format> Mapper for F {
    type Output = Value;

    fn map<I: Source>(&self, input: I) -> Result<Self::Output> {
        Self::read(input)
    }
}

macro_rules! impl_format {
    ($name:ident : $func:expr, $E:ty) => (
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl Format for $name {
            type Error = $E;

            fn from_str<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, $E> {
                $func(s)
            }
        }
    );
}

impl_format!(Toml: toml::from_str, toml::de::Error);
impl_format!(Json: serde_json::from_str, serde_json::error::Error);

/// Compiles Sass (`.scss` or indented `.sass`) into CSS.
#[cfg(feature = "sass")]
#[derive(Debug)]
pub struct Grass {
    options: grass::Options<'static>,
}

#[cfg(feature = "sass")]
impl Grass {
    /// A compiler emitting compressed CSS.
    pub fn compressed() -> Self {
        Grass { options: grass::Options::default().style(grass::OutputStyle::Compressed) }
    }

    pub fn load_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.options = self.options.load_path(path.as_ref());
        self
    }
}

#[cfg(feature = "sass")]
impl Default for Grass {
    fn default() -> Self {
        Grass { options: grass::Options::default() }
    }
}

#[cfg(feature = "sass")]
impl Mapper for Grass {
    type Output = String;

    fn map<I: Source>(&self, input: I) -> Result<Self::Output> {
        let result = match input.path() {
            Some(path) => grass::from_path(path, &self.options),
            None => input.try_read::<Arc<str>>()
                .map(|string| grass::from_string(string.to_string(), &self.options))?,
        };

        result.map_err(|e| error!("failed to render sass as css", e))
    }
}
