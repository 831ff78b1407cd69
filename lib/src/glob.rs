//! Glob patterns with gulp-style semantics.
//!
//! A pattern's _base_ is its longest leading run of literal path components:
//! the base of `src/sass/**/*.scss` is `src/sass`. Files matched by a pattern
//! are reported relative to that base, which is how a pipe decides where a
//! file lands in its destination directory.
//!
//! Patterns support `*`, `?`, `[...]`, `**` (any number of directories) and
//! `{a,b}` alternatives. A pattern prefixed with `!` excludes matches from
//! every other pattern in the same [`Globs`].

use std::fmt;
use std::path::{Path, PathBuf};

use ::glob::{MatchOptions, Pattern};
use rustc_hash::FxHashSet;

use crate::error::{Chainable, Result};
use crate::fstree::FsTree;
use crate::util::PathExt;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

#[derive(Clone)]
pub struct Glob {
    source: String,
    normal: String,
    base: PathBuf,
    patterns: Vec<Pattern>,
    literal: bool,
}

/// An ordered set of globs, with optional `!` exclusions.
#[derive(Debug, Clone, Default)]
pub struct Globs {
    include: Vec<Glob>,
    exclude: Vec<Glob>,
}

/// A file matched by a glob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The glob's base, joined to the expansion root.
    pub base: PathBuf,
    /// The file's path relative to `base`.
    pub path: PathBuf,
}

impl Glob {
    /// Parses `source`. Leading `./` and other `.` or `..` components are
    /// resolved lexically, the same way [`Glob::matches()`] treats paths.
    pub fn new(source: &str) -> Result<Glob> {
        let normal = Path::new(source).normalize();
        let normal = normal.to_slash().into_owned();
        let patterns = expand_braces(&normal)
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()
            .chain_with(|| error!("invalid glob pattern", "pattern" => source))?;

        let base: PathBuf = Path::new(&normal)
            .components()
            .take_while(|c| !is_magic(&c.as_os_str().to_string_lossy()))
            .collect();

        let literal = !is_magic(&normal);
        let base = match literal {
            true => base.parent().map(|p| p.to_path_buf()).unwrap_or_default(),
            false => base,
        };

        Ok(Glob { source: source.into(), normal, base, patterns, literal })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The literal directory prefix of the pattern.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Whether the pattern names exactly one path.
    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// Returns `true` if `path`, written relative to the same root as the
    /// pattern, matches.
    pub fn matches<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref().normalize();
        let path = path.to_slash();
        self.patterns.iter().any(|p| p.matches_with(&path, MATCH_OPTIONS))
    }

    /// All files under `root` matching `self`, sorted by path.
    pub fn expand<P: AsRef<Path>>(&self, root: P) -> Result<Vec<Match>> {
        let root = root.as_ref();
        let base = root.join(&self.base);
        if self.literal {
            let path = root.join(&self.normal);
            if !path.is_file() {
                return Ok(vec![]);
            }

            let file_name = path.file_name().map(PathBuf::from).unwrap_or_default();
            return Ok(vec![Match { base, path: file_name }]);
        }

        if !base.is_dir() {
            tracing::trace!(glob = %self.source, base = %base.display(), "glob base is missing");
            return Ok(vec![]);
        }

        let tree = FsTree::build(&base)?;
        let matches = tree.files()
            .map(|entry| entry.relative_path())
            .filter(|path| self.matches(self.base.join(path)))
            .map(|path| Match { base: base.clone(), path: path.to_path_buf() })
            .collect();

        Ok(matches)
    }
}

impl Globs {
    pub fn new<I, S>(patterns: I) -> Result<Globs>
        where I: IntoIterator<Item = S>, S: AsRef<str>
    {
        let mut globs = Globs::default();
        for pattern in patterns {
            match pattern.as_ref().strip_prefix('!') {
                Some(negated) => globs.exclude.push(Glob::new(negated)?),
                None => globs.include.push(Glob::new(pattern.as_ref())?),
            }
        }

        Ok(globs)
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Glob> {
        self.include.iter()
    }

    pub fn matches<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        self.include.iter().any(|g| g.matches(path))
            && !self.exclude.iter().any(|g| g.matches(path))
    }

    /// All files under `root` matching any pattern, in pattern order. A file
    /// matched by more than one pattern is reported once, for the first.
    pub fn expand<P: AsRef<Path>>(&self, root: P) -> Result<Vec<Match>> {
        let root = root.as_ref();
        let mut seen = FxHashSet::default();
        let mut matches = vec![];
        for glob in &self.include {
            for m in glob.expand(root)? {
                let relative = glob.base().join(&m.path);
                if self.exclude.iter().any(|g| g.matches(&relative)) {
                    continue;
                }

                if seen.insert(m.base.join(&m.path)) {
                    matches.push(m);
                }
            }
        }

        Ok(matches)
    }
}

impl fmt::Debug for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Glob").field(&self.source).finish()
    }
}

fn is_magic(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// Expands `{a,b}` alternatives, including nested ones.
///
/// ```rust
/// use spindle::glob::expand_braces;
///
/// assert_eq!(expand_braces("*.{png,jpg}"), vec!["*.png", "*.jpg"]);
/// assert_eq!(expand_braces("{a,b{c,d}}x"), vec!["ax", "bcx", "bdx"]);
/// assert_eq!(expand_braces("plain"), vec!["plain"]);
/// ```
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0;
    let mut splits = vec![open];
    let mut close = None;
    for (i, c) in pattern.char_indices().skip_while(|&(i, _)| i < open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(i),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    splits.push(close);
    let (prefix, suffix) = (&pattern[..open], &pattern[close + 1..]);
    splits.windows(2)
        .map(|w| &pattern[w[0] + 1..w[1]])
        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
        .collect()
}
