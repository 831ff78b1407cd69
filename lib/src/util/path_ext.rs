use std::borrow::Cow;
use std::path::{Path, PathBuf, Component};

pub trait PathExt: AsRef<Path> {
    /// The path as a `/`-separated string, for glob matching and URLs.
    fn to_slash(&self) -> Cow<'_, str>;

    /// Drops `.` components and resolves `..` lexically.
    fn normalize(&self) -> PathBuf;
}

impl PathExt for Path {
    fn to_slash(&self) -> Cow<'_, str> {
        let string = self.to_string_lossy();
        if std::path::MAIN_SEPARATOR == '/' {
            return string;
        }

        string.replace(std::path::MAIN_SEPARATOR, "/").into()
    }

    fn normalize(&self) -> PathBuf {
        let mut normal = PathBuf::new();
        for component in self.components() {
            match component {
                Component::CurDir => continue,
                Component::ParentDir if normal.file_name().is_some() => { normal.pop(); },
                c => normal.push(c.as_os_str()),
            }
        }

        normal
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use super::PathExt;

    #[test]
    fn normalize_resolves_lexically() {
        assert_eq!(Path::new("src/./html/../sass/x.scss").normalize(), Path::new("src/sass/x.scss"));
        assert_eq!(Path::new("../a").normalize(), Path::new("../a"));
    }
}
