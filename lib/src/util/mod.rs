mod path_ext;

pub use path_ext::*;

/// Finds the first occurrence of `needle` in `haystack` at or after `from`.
#[inline]
pub fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    memchr::memmem::find(&haystack.as_bytes()[from..], needle.as_bytes()).map(|i| i + from)
}
