use std::path::PathBuf;

use rustc_hash::FxHashSet;

use crate::error::{Chainable, Result};
use crate::pipe::{Asset, Plugin};
use crate::util::find_from;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
    <!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \
    \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">";

/// Root attributes carried over to each `<symbol>`.
const SYMBOL_ATTRIBUTES: &[&str] = &["viewBox", "preserveAspectRatio"];

/// Bundles every SVG in the stream into one sprite of `<symbol>`s.
///
/// Each symbol's `id` is its file's stem, so `icons/arrow.svg` becomes
/// `<symbol id="arrow">`. The sprite is named after the stream's base
/// directory: `icons.svg`.
#[derive(Debug, Clone, Copy)]
pub struct SvgStore {
    inline: bool,
}

impl SvgStore {
    /// A sprite meant for inlining into HTML: no XML prolog.
    pub fn inline() -> Self {
        SvgStore { inline: true }
    }

    /// A standalone sprite document, with an XML declaration and doctype.
    pub fn standalone() -> Self {
        SvgStore { inline: false }
    }

    /// Builds the sprite from `(id, svg source)` pairs.
    pub fn bundle<'a, I>(&self, icons: I) -> Result<String>
        where I: IntoIterator<Item = (&'a str, &'a str)>
    {
        let mut ids = FxHashSet::default();
        let mut symbols = String::new();
        let mut xlink = false;
        for (id, svg) in icons {
            if !ids.insert(id) {
                return err!("duplicate sprite symbol id", "id" => id);
            }

            let svg = strip_prolog(svg);
            let (attributes, inner) = split_root(&svg)
                .chain_with(|| error!("invalid svg icon", "id" => id))?;

            xlink |= svg.contains("xlink:");
            symbols.push_str(&format!("<symbol id=\"{id}\""));
            for (name, value) in attributes.iter().filter(|(n, _)| SYMBOL_ATTRIBUTES.contains(n)) {
                symbols.push_str(&format!(" {name}=\"{value}\""));
            }

            symbols.push('>');
            symbols.push_str(inner.trim());
            symbols.push_str("</symbol>");
        }

        let mut sprite = String::with_capacity(symbols.len() + PROLOG.len() + 128);
        if !self.inline {
            sprite.push_str(PROLOG);
        }

        sprite.push_str(&format!("<svg xmlns=\"{SVG_NS}\""));
        if xlink {
            sprite.push_str(&format!(" xmlns:xlink=\"{XLINK_NS}\""));
        }

        sprite.push('>');
        sprite.push_str(&symbols);
        sprite.push_str("</svg>");
        Ok(sprite)
    }
}

impl Default for SvgStore {
    fn default() -> Self {
        SvgStore::inline()
    }
}

impl Plugin for SvgStore {
    fn flush(&self, assets: Vec<Asset>) -> Result<Vec<Asset>> {
        let Some(first) = assets.first() else {
            return Ok(vec![]);
        };

        let base = first.base.clone();
        let name = base.file_name()
            .map(|n| format!("{}.svg", n.to_string_lossy()))
            .unwrap_or_else(|| "sprite.svg".into());

        let icons = assets.iter()
            .map(|asset| {
                let id = asset.path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                Ok((id, asset.text()?))
            })
            .collect::<Result<Vec<_>>>()?;

        let sprite = self.bundle(icons)?;
        Ok(vec![Asset::new(base, PathBuf::from(name), sprite)])
    }
}

/// Removes XML declarations, doctypes and comments.
fn strip_prolog(svg: &str) -> String {
    let mut out = String::with_capacity(svg.len());
    let mut last = 0;
    while let Some(at) = find_from(svg, "<", last) {
        let rest = &svg[at..];
        let close = if rest.starts_with("<!--") {
            "-->"
        } else if rest.starts_with("<?") {
            "?>"
        } else if rest.starts_with("<!") {
            ">"
        } else {
            out.push_str(&svg[last..at + 1]);
            last = at + 1;
            continue;
        };

        out.push_str(&svg[last..at]);
        last = find_from(svg, close, at).map_or(svg.len(), |end| end + close.len());
    }

    out.push_str(&svg[last..]);
    out
}

/// Splits an `<svg>` document into its root attributes and inner markup.
fn split_root(svg: &str) -> Result<(Vec<(&str, &str)>, &str)> {
    let Some(open) = svg.find("<svg") else {
        return err!("missing root `<svg>` element");
    };

    let bytes = svg.as_bytes();
    let mut i = open + 4;
    let mut quote = None;
    let tag_end = loop {
        match (bytes.get(i), quote) {
            (None, _) => return err!("unterminated `<svg>` tag"),
            (Some(&c), Some(q)) if c == q => quote = None,
            (Some(&c), None) if c == b'"' || c == b'\'' => quote = Some(c),
            (Some(b'>'), None) => break i,
            _ => {}
        }

        i += 1;
    };

    let self_closing = bytes[tag_end - 1] == b'/';
    let tag = &svg[open + 4..if self_closing { tag_end - 1 } else { tag_end }];
    let inner = match self_closing {
        true => "",
        false => {
            let close = svg.rfind("</svg>").filter(|&c| c > tag_end);
            let Some(close) = close else {
                return err!("missing closing `</svg>`");
            };

            &svg[tag_end + 1..close]
        }
    };

    Ok((attributes(tag), inner))
}

/// Parses `name="value"` pairs. Attributes without a value are skipped.
fn attributes(tag: &str) -> Vec<(&str, &str)> {
    let mut attributes = vec![];
    let mut rest = tag.trim_start();
    while let Some(eq) = rest.find('=') {
        let name = rest[..eq].trim();
        let name = name.rsplit(char::is_whitespace).next().unwrap_or(name);
        let value = rest[eq + 1..].trim_start();
        let Some(quote) = value.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            break;
        };

        let Some(end) = value[1..].find(quote) else {
            break;
        };

        attributes.push((name, &value[1..end + 1]));
        rest = value[end + 2..].trim_start();
    }

    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARROW: &str = "<?xml version=\"1.0\"?>\n<!-- exported -->\n\
        <svg xmlns=\"http://www.w3.org/2000/svg\" width=\"24\" viewBox=\"0 0 24 24\">\n\
        <path d=\"M0 0h24\"/>\n</svg>\n";

    const LOGO: &str = "<svg viewBox='0 0 10 10' preserveAspectRatio='none' \
        xmlns:xlink=\"http://www.w3.org/1999/xlink\"><use xlink:href=\"#a\"/></svg>";

    #[test]
    fn icons_become_symbols() {
        let sprite = SvgStore::inline().bundle([("arrow", ARROW), ("logo", LOGO)]).unwrap();
        assert_eq!(sprite, "<svg xmlns=\"http://www.w3.org/2000/svg\" \
            xmlns:xlink=\"http://www.w3.org/1999/xlink\">\
            <symbol id=\"arrow\" viewBox=\"0 0 24 24\"><path d=\"M0 0h24\"/></symbol>\
            <symbol id=\"logo\" viewBox=\"0 0 10 10\" preserveAspectRatio=\"none\">\
            <use xlink:href=\"#a\"/></symbol></svg>");
    }

    #[test]
    fn standalone_sprites_have_a_prolog() {
        let sprite = SvgStore::standalone().bundle([("empty", "<svg/>")]).unwrap();
        assert!(sprite.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><!DOCTYPE svg"));
        assert!(sprite.ends_with("<svg xmlns=\"http://www.w3.org/2000/svg\"><symbol id=\"empty\"></symbol></svg>"));
    }

    #[test]
    fn duplicate_ids_and_non_svg_inputs_fail() {
        assert!(SvgStore::inline().bundle([("a", LOGO), ("a", LOGO)]).is_err());
        assert!(SvgStore::inline().bundle([("a", "<p>not svg</p>")]).is_err());
    }

    #[test]
    fn flush_names_the_sprite_after_the_base() {
        let assets = vec![
            Asset::new("src/img/icons/icons-sprite", "arrow.svg", ARROW),
            Asset::new("src/img/icons/icons-sprite", "social/logo.svg", LOGO),
        ];

        let sprite = SvgStore::inline().flush(assets).unwrap();
        assert_eq!(sprite.len(), 1);
        assert_eq!(sprite[0].path.to_str(), Some("icons-sprite.svg"));
        assert!(SvgStore::inline().flush(vec![]).unwrap().is_empty());
    }
}
