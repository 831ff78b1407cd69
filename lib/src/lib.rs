#![doc = svgbobdoc::transform!(
//! A toolkit for building static site asset pipelines.
//!
//! # Overview
//!
//! Spindle turns a source tree of stylesheets, scripts, markup and images into
//! a deployable output tree. Work is organized as follows:
//!
//! ```svgbob
//!   +-----------+      +------+      +--------+       +--------+      +------+
//!   | src/**/*  |----->| Glob |----->| Asset  |------>| Plugin |----->| dist |
//!   +-----------+      +------+      +--------+  ...  +--------+      +------+
//!                         \______________ Pipe ______________/
//!
//!   +----------+         +--------+         +----------+
//!   | Registry |-------->|  Task  |-------->|  Action  |
//!   +----------+         +---+----+         +----------+
//!                            |
//!                            v
//!                       +--------+
//!                       | Series |
//!                       +--------+
//! ```
//!
//!   * A [`Pipe`](pipe::Pipe) reads the files matched by a set of
//!     [globs](glob::Globs) into [assets](pipe::Asset), runs them through a
//!     sequence of [plugins](plugins) and writes the result to a destination
//!     directory. Each asset keeps its path relative to the _base_ of the glob
//!     that matched it.
//!
//!   * A [`Registry`](task::Registry) names the work to be done: _actions_,
//!     typically one pipe each, and _series_ of other tasks.
//!
//!   * During development, a [`Watcher`](watch::Watcher) reruns series as
//!     sources change and the [dev server](server) pushes reload events to
//!     connected browsers.
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod fstree;
pub mod value;
pub mod glob;
pub mod pipe;
pub mod plugins;
pub mod task;
pub mod watch;
#[cfg(feature = "server")]
pub mod reload;
#[cfg(feature = "server")]
pub mod server;

pub use rayon;
