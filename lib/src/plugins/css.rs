use crate::error::Result;
use crate::pipe::{Asset, Plugin};

/// Minifies CSS assets.
#[derive(Debug, Default, Clone, Copy)]
pub struct CleanCss;

impl Plugin for CleanCss {
    fn map(&self, asset: Asset) -> Result<Option<Asset>> {
        let minified = minify_css(asset.text()?);
        Ok(Some(asset.with_contents(minified)))
    }
}

/// Minifies `css`, re-emitting it through the Sass compiler when it parses
/// and falling back to [`strip_css`] otherwise.
pub fn minify_css(css: &str) -> String {
    #[cfg(feature = "sass")] {
        use crate::value::{Grass, Mapper};

        match Grass::compressed().map(css) {
            Ok(minified) => return minified.trim_end().to_string(),
            Err(e) => tracing::debug!("css is not valid scss, stripping instead: {}", e.message()),
        }
    }

    strip_css(css)
}

/// Removes comments, except `/*!` ones, and collapses whitespace in `css`
/// without touching the contents of strings.
///
/// ```rust
/// use spindle::plugins::strip_css;
///
/// let css = "/* hi */\na , b {\n  content : 'x  y' ;\n}\n";
/// assert_eq!(strip_css(css), "a,b{content : 'x  y'}");
/// ```
pub fn strip_css(css: &str) -> String {
    let bytes = css.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut space = false;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = crate::util::find_from(css, "*/", i + 2).map_or(bytes.len(), |e| e + 2);
                if bytes.get(i + 2) == Some(&b'!') {
                    out.extend_from_slice(&bytes[i..end]);
                } else {
                    space = true;
                }

                i = end;
            }
            b'"' | b'\'' => {
                push_space(&mut out, &mut space, c);
                let end = string_end(bytes, i);
                out.extend_from_slice(&bytes[i..end]);
                i = end;
            }
            _ if c.is_ascii_whitespace() => {
                space = true;
                i += 1;
            }
            _ => {
                push_space(&mut out, &mut space, c);
                if c == b'}' && out.last() == Some(&b';') {
                    out.pop();
                }

                out.push(c);
                i += 1;
            }
        }
    }

    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn push_space(out: &mut Vec<u8>, space: &mut bool, next: u8) {
    const TIGHT: &[u8] = b"{};,>";

    if std::mem::take(space) {
        if let Some(&prev) = out.last() {
            if !TIGHT.contains(&prev) && !TIGHT.contains(&next) {
                out.push(b' ');
            }
        }
    }
}

/// The index one past the closing quote of the string starting at `start`.
pub(crate) fn string_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }

    bytes.len()
}
