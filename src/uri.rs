//! `file://` URI helpers for the `*_uri` dialog operations

use std::path::{Path, PathBuf};

use url::{Host, Url};

/// Build a `file://` URI for an absolute path.
///
/// Path bytes are percent-encoded as-is, so names that are not valid UTF-8
/// survive the trip through [`to_path`]. Relative paths have no URI.
pub fn from_path(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(String::from)
}

/// Resolve a local `file://` URI to an absolute path.
///
/// Only an empty host or `localhost` is accepted. Remote hosts and other
/// schemes yield `None`.
pub fn to_path(uri: &str) -> Option<PathBuf> {
    let url = Url::parse(uri).ok()?;
    if url.scheme() != "file" {
        return None;
    }
    match url.host() {
        None | Some(Host::Domain("localhost" | "")) => {}
        Some(_) => return None,
    }
    let path = url.to_file_path().ok()?;
    path.is_absolute().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        assert_eq!(
            from_path(Path::new("/home/user/a.txt")).as_deref(),
            Some("file:///home/user/a.txt")
        );
        assert_eq!(
            to_path("file:///home/user/a.txt"),
            Some(PathBuf::from("/home/user/a.txt"))
        );
    }

    #[test]
    fn test_escaping() {
        let path = Path::new("/tmp/my file#1%.txt");
        let uri = from_path(path).unwrap();
        assert_eq!(uri, "file:///tmp/my%20file%231%25.txt");
        assert_eq!(to_path(&uri).as_deref(), Some(path));
    }

    #[test]
    fn test_relative_path_has_no_uri() {
        assert_eq!(from_path(Path::new("docs/a.txt")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_survive() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        // Latin-1 "café.txt", as written by an old application
        let path = Path::new(OsStr::from_bytes(b"/tmp/caf\xe9.txt"));
        let uri = from_path(path).unwrap();
        assert_eq!(uri, "file:///tmp/caf%E9.txt");
        assert_eq!(to_path(&uri).as_deref(), Some(path));
        assert_eq!(to_path("file:///tmp/caf%e9.txt").as_deref(), Some(path));
    }

    #[test]
    fn test_localhost_host() {
        assert_eq!(to_path("file://localhost/etc/hosts"), Some(PathBuf::from("/etc/hosts")));
    }

    #[test]
    fn test_rejects_foreign_uris() {
        assert_eq!(to_path("https://example.com/a"), None);
        assert_eq!(to_path("file://server/share/a"), None);
        assert_eq!(to_path("/not/a/uri"), None);
        assert_eq!(to_path("not a uri at all"), None);
    }
}
