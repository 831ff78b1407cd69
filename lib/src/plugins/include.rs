use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::error::{Chainable, Result};
use crate::pipe::{Asset, Plugin};
use crate::plugins::css::string_end;
use crate::util::{find_from, PathExt};
use crate::value::{Dict, Format, Json, Value};

const MAX_DEPTH: usize = 64;

/// Where include paths are resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Basepath {
    /// The project root: `@root`.
    Root(PathBuf),
    /// The directory of the including file: `@file`.
    File,
    Dir(PathBuf),
}

/// Expands `@@include`, `@@include_once` and `@@loop` directives and
/// substitutes `@@variable` references in text assets.
///
/// With the default `@@` prefix:
///
///   * `@@include('path')` inserts `path`, itself processed recursively.
///     A JSON object may follow the path, `@@include('path', {"k": "v"})`,
///     to extend the context the included file is processed with.
///   * `@@include_once('path')` is like `@@include` but inserts nothing if
///     `path` was already included in the same output file.
///   * `@@loop('path', [{..}, ..])` includes `path` once per context in the
///     array. The array may also be a JSON file: `@@loop('path', 'data.json')`.
///   * `@@name` or `@@a.b` is replaced by the scalar at that key of the
///     context. References to missing or non-scalar values are left as-is.
#[derive(Debug, Clone)]
pub struct FileInclude {
    prefix: String,
    basepath: Basepath,
    context: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Include,
    IncludeOnce,
    Loop,
}

struct Call<'a> {
    directive: Directive,
    path: &'a str,
    data: Option<&'a str>,
    len: usize,
}

impl FileInclude {
    /// Resolves includes from `root`, with the `@@` prefix.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        FileInclude {
            prefix: "@@".into(),
            basepath: Basepath::Root(root.into()),
            context: Value::from(Dict::new()),
        }
    }

    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn basepath(mut self, basepath: Basepath) -> Self {
        self.basepath = basepath;
        self
    }

    /// Sets the global context. Only dictionaries contribute variables.
    pub fn context<V: Into<Value>>(mut self, context: V) -> Self {
        self.context = context.into();
        self
    }

    /// Processes `text`, the contents of a file in `dir`. Fails if the
    /// prefix is empty.
    pub fn render(&self, text: &str, dir: &Path) -> Result<String> {
        if self.prefix.is_empty() {
            return err!("include prefix must not be empty");
        }

        let mut once = FxHashSet::default();
        self.render_in(text, dir, &self.context, 0, &mut once)
    }

    fn render_in(
        &self,
        text: &str,
        dir: &Path,
        context: &Value,
        depth: usize,
        once: &mut FxHashSet<PathBuf>,
    ) -> Result<String> {
        if depth > MAX_DEPTH {
            return err! {
                "includes are nested too deeply",
                "limit" => MAX_DEPTH,
                "directory" => dir.display(),
            };
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        while let Some(at) = find_from(text, &self.prefix, last) {
            out.push_str(&text[last..at]);
            let start = at + self.prefix.len();
            let rest = &text[start..];

            if let Some(call) = parse_call(rest) {
                let call = call.chain_with(|| error! {
                    "malformed include directive",
                    "directive" => rest.lines().next().unwrap_or_default(),
                    "directory" => dir.display(),
                })?;

                self.expand(&call, dir, context, depth, once, &mut out)?;
                last = start + call.len;
                continue;
            }

            let name = variable_name(rest);
            match context.lookup(name).filter(|v| !name.is_empty() && v.is_scalar()) {
                Some(value) => out.push_str(&value.to_string()),
                None => {
                    out.push_str(&self.prefix);
                    out.push_str(name);
                }
            }

            last = start + name.len();
        }

        out.push_str(&text[last..]);
        Ok(out)
    }

    fn expand(
        &self,
        call: &Call<'_>,
        dir: &Path,
        context: &Value,
        depth: usize,
        once: &mut FxHashSet<PathBuf>,
        out: &mut String,
    ) -> Result<()> {
        let file = self.resolve(dir, call.path).normalize();
        if !once.insert(file.clone()) && call.directive == Directive::IncludeOnce {
            return Ok(());
        }

        let contents = std::fs::read_to_string(&file)
            .chain_with(|| error!("failed to read included file", "path" => file.display()))?;

        let file_dir = file.parent().unwrap_or(dir);
        let contexts = match (call.directive, call.data) {
            (_, None) => vec![context.clone()],
            (Directive::Loop, Some(data)) => self.loop_contexts(dir, data)?
                .iter()
                .map(|item| merge(context, item))
                .collect(),
            (_, Some(data)) => vec![merge(context, &Json::from_str::<Value>(data)?)],
        };

        for context in &contexts {
            out.push_str(&self.render_in(&contents, file_dir, context, depth + 1, once)?);
        }

        Ok(())
    }

    fn loop_contexts(&self, dir: &Path, data: &str) -> Result<Vec<Value>> {
        let value = match data.strip_prefix(['\'', '"']) {
            Some(quoted) => {
                let file = self.resolve(dir, &quoted[..quoted.len().saturating_sub(1)]);
                let json = std::fs::read_to_string(&file)
                    .chain_with(|| error!("failed to read loop data", "path" => file.display()))?;

                Json::from_str::<Value>(&json)?
            }
            None => Json::from_str::<Value>(data)?,
        };

        match value.as_slice() {
            Some(items) => Ok(items.to_vec()),
            None => err!("loop data must be an array", "found" => value.kind()),
        }
    }

    fn resolve(&self, dir: &Path, path: &str) -> PathBuf {
        match &self.basepath {
            Basepath::Root(root) => root.join(path),
            Basepath::File => dir.join(path),
            Basepath::Dir(base) => base.join(path),
        }
    }
}

impl Plugin for FileInclude {
    fn map(&self, asset: Asset) -> Result<Option<Asset>> {
        let dir = match &asset.origin {
            Some(origin) => origin.parent().map(Path::to_path_buf).unwrap_or_default(),
            None => asset.base.join(asset.path.parent().unwrap_or(Path::new(""))),
        };

        let html = self.render(asset.text()?, &dir)
            .chain_with(|| error!("failed to process includes", "asset" => asset.path.display()))?;

        Ok(Some(asset.with_contents(html)))
    }
}

/// Extends `base` with the entries of `extra`, when both are dictionaries.
fn merge(base: &Value, extra: &Value) -> Value {
    let mut dict = base.as_dict().cloned().unwrap_or_default();
    if let Some(extra) = extra.as_dict() {
        dict.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    Value::from(dict)
}

fn variable_name(rest: &str) -> &str {
    if !rest.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return "";
    }

    let end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'))
        .unwrap_or(rest.len());

    rest[..end].trim_end_matches(['.', '-'])
}

/// Parses a directive call at the start of `rest`. Returns `None` when `rest`
/// doesn't start with a directive.
fn parse_call(rest: &str) -> Option<Result<Call<'_>>> {
    let (directive, args) = [
        (Directive::IncludeOnce, "include_once"),
        (Directive::Include, "include"),
        (Directive::Loop, "loop"),
    ]
    .into_iter()
    .find_map(|(d, name)| Some((d, rest.strip_prefix(name)?.trim_start().strip_prefix('(')?)))?;

    let open = rest.len() - args.len();
    Some(parse_args(args).map(|(path, data, close)| Call {
        directive,
        path,
        data,
        len: open + close + 1,
    }))
}

/// Splits `'path' [, data]` up to the matching `)`, returning the index of
/// that `)` in `args`.
fn parse_args(args: &str) -> Result<(&str, Option<&str>, usize)> {
    let bytes = args.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    let close = loop {
        match bytes.get(i) {
            Some(b'\'' | b'"') => i = string_end(bytes, i),
            Some(b'(' | b'[' | b'{') => { depth += 1; i += 1 },
            Some(b')') if depth == 0 => break i,
            Some(b')' | b']' | b'}') => { depth = depth.saturating_sub(1); i += 1 },
            Some(_) => i += 1,
            None => return err!("missing closing `)`"),
        }
    };

    let inner = args[..close].trim();
    if !inner.starts_with(['\'', '"']) {
        return err!("expected a quoted path");
    }

    let end = string_end(inner.as_bytes(), 0);
    if end < 2 {
        return err!("unterminated path string");
    }

    let path = &inner[1..end - 1];
    let data = inner[end..].trim();
    match data.strip_prefix(',') {
        Some(data) => Ok((path, Some(data.trim()), close)),
        None if data.is_empty() => Ok((path, None, close)),
        None => err!("expected `,` after the path", "found" => data),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn context() -> Value {
        Value::from(Dict::from([("test".into(), Value::from("text"))]))
    }

    #[test]
    fn variables_are_substituted_from_context() {
        let include = FileInclude::new("/").context(context());
        let html = include.render("<p>@@test, @@missing, a@@b.</p>@@", Path::new("/")).unwrap();
        assert_eq!(html, "<p>text, @@missing, a@@b.</p>@@");
    }

    #[test]
    fn includes_resolve_from_root_with_arguments() {
        let root = tempfile::tempdir().unwrap();
        let blocks = root.path().join("src/html/blocks");
        fs::create_dir_all(&blocks).unwrap();
        fs::write(blocks.join("head.html"), "<h1>@@title</h1>@@test").unwrap();
        fs::write(blocks.join("nav.html"), "<nav>@@include('src/html/blocks/head.html')</nav>").unwrap();

        let include = FileInclude::new(root.path()).context(context());
        let page = "@@include('src/html/blocks/head.html', {\"title\": \"Home\"})\n\
                    @@include ( \"src/html/blocks/nav.html\", { \"title\": \"(Nav)\" } )";

        let html = include.render(page, &root.path().join("src/html")).unwrap();
        assert_eq!(html, "<h1>Home</h1>text\n<nav><h1>(Nav)</h1>text</nav>");
    }

    #[test]
    fn include_once_and_loop() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("item.html"), "<li>@@name</li>").unwrap();
        fs::write(root.path().join("items.json"), "[{\"name\": \"c\"}]").unwrap();

        let include = FileInclude::new("/").basepath(Basepath::File);
        let page = "@@include_once('item.html')@@include_once('item.html')\
                    @@loop('item.html', [{\"name\": \"a\"}, {\"name\": 2}])\
                    @@loop('item.html', 'items.json')";

        let html = include.render(page, root.path()).unwrap();
        assert_eq!(html, "<li>@@name</li><li>a</li><li>2</li><li>c</li>");
    }

    #[test]
    fn recursive_includes_are_an_error() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("loop.html"), "x@@include('loop.html')").unwrap();

        let include = FileInclude::new(root.path());
        let error = include.render("@@include('loop.html')", root.path()).unwrap_err();
        assert!(error.to_string().contains("nested too deeply"));
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let include = FileInclude::new("/").prefix("");
        let error = include.render("<p>x</p>", Path::new("/")).unwrap_err();
        assert!(error.to_string().contains("prefix must not be empty"), "{error}");

        let include = FileInclude::new("/").prefix("%%").context(context());
        assert_eq!(include.render("<p>%%test @@test</p>", Path::new("/")).unwrap(), "<p>text @@test</p>");
    }

    #[test]
    fn malformed_and_missing_includes_fail() {
        let include = FileInclude::new("/nonexistent");
        assert!(include.render("@@include(oops)", Path::new("/")).is_err());
        assert!(include.render("@@include('a.html'", Path::new("/")).is_err());
        assert!(include.render("@@include('a.html')", Path::new("/")).is_err());
    }
}
