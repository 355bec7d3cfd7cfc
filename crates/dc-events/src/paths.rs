//! Helpers for the logical remote paths carried on events.
//!
//! These paths are always `/`-separated and absolute; they name items on
//! the remote, not on any local filesystem, so `std::path` is deliberately
//! not used.

/// Directory containing `path`: everything before the final `/`.
/// The root's parent is the root itself.
pub fn parent_dir(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// The final path segment.
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// Join a child name onto a directory.
pub fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Replace the final segment of `path` with `name`.
pub fn with_file_name(path: &str, name: &str) -> String {
    join(parent_dir(path), name)
}

/// Every ancestor directory of `path`, root first, excluding `path` itself.
///
/// `"/a/b/c"` yields `["/", "/a", "/a/b"]`.
pub fn ancestors_top_down(path: &str) -> Vec<String> {
    let trimmed = path.trim_end_matches('/');
    let mut out = vec!["/".to_owned()];
    let mut acc = String::new();
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return out;
    }
    for segment in &segments[..segments.len() - 1] {
        acc.push('/');
        acc.push_str(segment);
        out.push(acc.clone());
    }
    out
}

/// The extension of the final segment, lowercased, without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_walks_one_level() {
        assert_eq!(parent_dir("/MOVIES/dir/m.mkv"), "/MOVIES/dir");
        assert_eq!(parent_dir("/MOVIES"), "/");
        assert_eq!(parent_dir("/"), "/");
    }

    #[test]
    fn join_and_with_file_name() {
        assert_eq!(join("/MOVIES/dir", "m.mkv"), "/MOVIES/dir/m.mkv");
        assert_eq!(join("/", "MOVIES"), "/MOVIES");
        assert_eq!(
            with_file_name("/MOVIES/dir/new.mkv", "old.mkv"),
            "/MOVIES/dir/old.mkv"
        );
    }

    #[test]
    fn ancestors_are_listed_root_first() {
        assert_eq!(
            ancestors_top_down("/a/b/c"),
            vec!["/".to_owned(), "/a".to_owned(), "/a/b".to_owned()]
        );
        assert_eq!(ancestors_top_down("/a"), vec!["/".to_owned()]);
        assert_eq!(ancestors_top_down("/"), vec!["/".to_owned()]);
    }

    #[test]
    fn extension_is_lowercased_without_dot() {
        assert_eq!(extension("/x/info.JSON"), Some("json".to_owned()));
        assert_eq!(extension("/x/noext"), None);
        assert_eq!(extension("/x/.hidden"), None);
    }
}
