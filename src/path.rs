// src/path.rs

//! Path handling for archive entries and resource paths
//!
//! Archive entry names come from untrusted archives and are sanitized before
//! they touch the filesystem. Resource paths are logical, slash-separated,
//! always absolute (`/sites/default/index.html`), and never end with a slash
//! except for the root itself.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Sanitize an archive entry name for use below a directory root
///
/// Rejects `..` components, skips `.` components and strips leading
/// slashes. Empty names are rejected.
pub fn sanitize_entry_name(name: &str) -> Result<PathBuf> {
    let relative = name.trim_start_matches('/');
    let mut normalized = PathBuf::new();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(name.to_string())),
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!("empty entry name: '{}'", name)));
    }

    Ok(normalized)
}

/// Join a directory root with an untrusted entry name
pub fn safe_join(root: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
    let sanitized = sanitize_entry_name(name)?;
    Ok(root.as_ref().join(sanitized))
}

/// Normalize an archive entry name to the form used as a map key
///
/// Backslashes become slashes and a leading `./` is dropped, matching what
/// tar writers on different platforms produce.
pub fn normalize_entry_name(name: &str) -> String {
    let s = name.replace('\\', "/");
    let s = s.strip_prefix("./").unwrap_or(&s);
    collapse_slashes(s)
}

/// Normalize a logical resource path
///
/// The result always starts with `/`, contains no empty segments and has no
/// trailing slash unless it is the root.
pub fn normalize_resource_path(path: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in path.trim().split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(Error::PathTraversal(path.to_string())),
            s => segments.push(s),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Join a destination prefix with a path relative to the archive root
pub fn join_resource_path(prefix: &str, relative: &str) -> Result<String> {
    let joined = format!("{}/{}", prefix.trim_end_matches('/'), relative.trim_start_matches('/'));
    normalize_resource_path(&joined)
}

/// Parent folder of a resource path, `None` for the root
pub fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of a resource path
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Apply the first matching directory prefix translation
///
/// Prefixes are compared on the path without its leading slash, so both
/// `system/bodies/` and `/system/bodies/` are accepted in configuration.
pub fn translate(path: &str, translations: &[(String, String)]) -> String {
    let bare = path.trim_start_matches('/');
    for (from, to) in translations {
        let from = from.trim_start_matches('/');
        if let Some(rest) = bare.strip_prefix(from) {
            return format!("{}{}", to.trim_start_matches('/'), rest);
        }
    }
    bare.to_string()
}

fn collapse_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_slash = false;
    for c in s.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_entry_name() {
        assert_eq!(
            sanitize_entry_name("content/sites/a.txt").unwrap(),
            PathBuf::from("content/sites/a.txt")
        );
        assert_eq!(
            sanitize_entry_name("///manifest.xml").unwrap(),
            PathBuf::from("manifest.xml")
        );
        assert!(sanitize_entry_name("../etc/passwd").is_err());
        assert!(sanitize_entry_name("content/../../x").is_err());
        assert!(sanitize_entry_name("/").is_err());
    }

    #[test]
    fn test_safe_join() {
        let joined = safe_join("/tmp/archive", "/content/a.txt").unwrap();
        assert_eq!(joined, PathBuf::from("/tmp/archive/content/a.txt"));
        assert!(safe_join("/tmp/archive", "../escape").is_err());
    }

    #[test]
    fn test_normalize_entry_name() {
        assert_eq!(normalize_entry_name("./manifest.xml"), "manifest.xml");
        assert_eq!(normalize_entry_name("content\\a\\b.txt"), "content/a/b.txt");
        assert_eq!(normalize_entry_name("content//a.txt"), "content/a.txt");
    }

    #[test]
    fn test_normalize_resource_path() {
        assert_eq!(normalize_resource_path("sites/default/").unwrap(), "/sites/default");
        assert_eq!(normalize_resource_path("/").unwrap(), "/");
        assert_eq!(normalize_resource_path("  /a//b/./c ").unwrap(), "/a/b/c");
        assert!(normalize_resource_path("/a/../b").is_err());
    }

    #[test]
    fn test_join_and_parent() {
        let joined = join_resource_path("/sites/target/", "/docs/a.txt").unwrap();
        assert_eq!(joined, "/sites/target/docs/a.txt");
        assert_eq!(parent_of(&joined), Some("/sites/target/docs"));
        assert_eq!(parent_of("/top"), Some("/"));
        assert_eq!(parent_of("/"), None);
        assert_eq!(file_name("/sites/target/docs/a.txt"), "a.txt");
    }

    #[test]
    fn test_translate_first_match_wins() {
        let translations = vec![
            ("system/bodies/".to_string(), "system/legacy/bodies/".to_string()),
            ("/system/".to_string(), "/other/".to_string()),
        ];
        assert_eq!(translate("/system/bodies/x.html", &translations), "system/legacy/bodies/x.html");
        assert_eq!(translate("system/y", &translations), "other/y");
        assert_eq!(translate("/sites/z", &translations), "sites/z");
    }
}
