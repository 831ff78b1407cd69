//! The transforms a [`Pipe`](crate::pipe::Pipe) can apply.

mod rename;
mod concat;
mod css;
mod js;
mod include;
mod svgstore;
#[cfg(feature = "sass")]
mod sass;

pub use rename::*;
pub use concat::*;
pub use css::*;
pub use js::*;
pub use include::*;
pub use svgstore::*;
#[cfg(feature = "sass")]
pub use sass::*;
