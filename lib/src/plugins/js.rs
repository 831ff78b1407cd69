use crate::error::Result;
use crate::pipe::{Asset, Plugin};
use crate::plugins::css::string_end;

/// The hook for down-levelling modern JavaScript. Assets pass through as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct Transpile;

impl Plugin for Transpile {
    fn map(&self, asset: Asset) -> Result<Option<Asset>> {
        tracing::trace!(asset = %asset.path.display(), "transpile: passing through");
        Ok(Some(asset))
    }
}

/// Minifies JavaScript assets with [`minify_js`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Uglify;

impl Plugin for Uglify {
    fn map(&self, asset: Asset) -> Result<Option<Asset>> {
        let minified = minify_js(asset.text()?);
        Ok(Some(asset.with_contents(minified)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    None,
    Space,
    Newline,
}

const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void",
    "throw", "case", "do", "else", "yield", "await",
];

/// Removes comments, except `/*!` ones, and redundant whitespace from
/// `source`.
///
/// Strings, template literals and regular expression literals are copied
/// verbatim. A line break is kept wherever automatic semicolon insertion
/// could depend on it, so the output never changes meaning.
///
/// ```rust
/// use spindle::plugins::minify_js;
///
/// let js = "// setup\nconst a = 1 ,  b = 'x  y';\nlet c = a + +b\nreturn c";
/// assert_eq!(minify_js(js), "const a=1,b='x  y';let c=a+ +b\nreturn c");
/// ```
pub fn minify_js(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut gap = Gap::None;
    let mut braces = 0usize;
    let mut templates: Vec<usize> = vec![];
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();
        match c {
            b'\n' => {
                gap = Gap::Newline;
                i += 1;
            }
            _ if c.is_ascii_whitespace() => {
                gap = gap.max(Gap::Space);
                i += 1;
            }
            b'/' if next == Some(b'/') => {
                i = memchr::memchr(b'\n', &bytes[i..]).map_or(bytes.len(), |n| i + n);
                gap = gap.max(Gap::Space);
            }
            b'/' if next == Some(b'*') => {
                let end = crate::util::find_from(source, "*/", i + 2).map_or(bytes.len(), |e| e + 2);
                if bytes.get(i + 2) == Some(&b'!') {
                    emit_gap(&mut out, gap, c);
                    out.extend_from_slice(&bytes[i..end]);
                    gap = Gap::Newline;
                } else if bytes[i..end].contains(&b'\n') {
                    gap = Gap::Newline;
                } else {
                    gap = gap.max(Gap::Space);
                }

                i = end;
            }
            b'\'' | b'"' => {
                emit_gap(&mut out, std::mem::replace(&mut gap, Gap::None), c);
                let end = string_end(bytes, i);
                out.extend_from_slice(&bytes[i..end]);
                i = end;
            }
            b'`' => {
                emit_gap(&mut out, std::mem::replace(&mut gap, Gap::None), c);
                out.push(c);
                i = copy_template(bytes, i + 1, &mut out, &mut templates, braces);
            }
            b'/' if regex_allowed(&out) => {
                emit_gap(&mut out, std::mem::replace(&mut gap, Gap::None), c);
                let end = regex_end(bytes, i);
                out.extend_from_slice(&bytes[i..end]);
                i = end;
            }
            b'}' if templates.last() == Some(&braces) => {
                templates.pop();
                gap = Gap::None;
                out.push(c);
                i = copy_template(bytes, i + 1, &mut out, &mut templates, braces);
            }
            _ => {
                emit_gap(&mut out, std::mem::replace(&mut gap, Gap::None), c);
                match c {
                    b'{' => braces += 1,
                    b'}' => braces = braces.saturating_sub(1),
                    _ => {}
                }

                out.push(c);
                i += 1;
            }
        }
    }

    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn is_ident(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$' || c >= 0x80
}

fn emit_gap(out: &mut Vec<u8>, gap: Gap, next: u8) {
    let Some(&prev) = out.last() else {
        return;
    };

    match gap {
        Gap::None => {}
        Gap::Newline if !b"{;,([\n".contains(&prev) => out.push(b'\n'),
        Gap::Newline | Gap::Space => {
            let needs_space = (is_ident(prev) && is_ident(next))
                || (prev == next && matches!(next, b'+' | b'-' | b'/'))
                || (prev.is_ascii_digit() && next == b'.');

            if needs_space {
                out.push(b' ');
            }
        }
    }
}

/// Whether a `/` following `out` starts a regular expression literal rather
/// than a division.
fn regex_allowed(out: &[u8]) -> bool {
    let Some(&prev) = out.iter().rev().find(|c| !c.is_ascii_whitespace()) else {
        return true;
    };

    let trimmed = out.trim_ascii_end();
    if let [.., before, b'+', b'+'] | [.., before, b'-', b'-'] = trimmed {
        // `i++ / 2`: a postfix update ends an operand.
        if is_ident(*before) || matches!(*before, b')' | b']') {
            return false;
        }
    }

    if b"(,=:[!&|?{};+-*%<>~^".contains(&prev) {
        return true;
    }

    if is_ident(prev) {
        let start = trimmed.iter().rposition(|&c| !is_ident(c)).map_or(0, |p| p + 1);
        let word = &trimmed[start..];
        return REGEX_KEYWORDS.iter().any(|k| k.as_bytes() == word);
    }

    false
}

fn regex_end(bytes: &[u8], start: usize) -> usize {
    let mut in_class = false;
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b'[' => { in_class = true; i += 1 },
            b']' => { in_class = false; i += 1 },
            b'/' if !in_class => return i + 1,
            _ => i += 1,
        }
    }

    bytes.len()
}

/// Copies template literal text starting at `i` up to and including either
/// the closing backtick or the next `${`, returning the index after it.
fn copy_template(
    bytes: &[u8],
    mut i: usize,
    out: &mut Vec<u8>,
    templates: &mut Vec<usize>,
    braces: usize,
) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let end = (i + 2).min(bytes.len());
                out.extend_from_slice(&bytes[i..end]);
                i = end;
            }
            b'`' => {
                out.push(b'`');
                return i + 1;
            }
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                out.extend_from_slice(b"${");
                templates.push(braces);
                return i + 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_removed_except_licenses() {
        let js = "/*! lib v1 */\n/* note */\nfoo(); // trailing\nbar();";
        assert_eq!(minify_js(js), "/*! lib v1 */\nfoo();bar();");
    }

    #[test]
    fn literals_are_copied_verbatim() {
        let js = "var s = \"a // b\";\nvar r = x.replace(/ +\\/\\* [/]/g, ' ');\nvar d = a / b / c;";
        assert_eq!(
            minify_js(js),
            "var s=\"a // b\";var r=x.replace(/ +\\/\\* [/]/g,' ');var d=a/b/c;"
        );
    }

    #[test]
    fn templates_keep_text_and_minify_expressions() {
        let js = "const t = `a  ${ items.map(i => { return `<${ i }>` }) }  b`;";
        assert_eq!(minify_js(js), "const t=`a  ${items.map(i=>{return`<${i}>`})}  b`;");
    }

    #[test]
    fn line_breaks_are_kept_where_asi_may_apply() {
        let js = "let a = 1\nlet b = a\n++b\nif (a) {\n  go()\n}\n";
        assert_eq!(minify_js(js), "let a=1\nlet b=a\n++b\nif(a){go()\n}");
    }

    #[test]
    fn division_after_postfix_update() {
        let js = "var x = i++ / 2; var s = \"a  // b\";\ny = a[0]-- / n / 2";
        assert_eq!(minify_js(js), "var x=i++/2;var s=\"a  // b\";y=a[0]--/n/2");
        assert_eq!(minify_js("x = a + +/b/.source.length"), "x=a+ +/b/.source.length");
    }

    #[test]
    fn regex_after_keyword() {
        assert_eq!(minify_js("return /a b/.test(x)"), "return/a b/.test(x)");
        assert_eq!(minify_js("x = y\n/ 2"), "x=y\n/2");
    }
}
