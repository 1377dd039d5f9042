//! Path utilities for mapping adapter-relative paths onto Netdisk paths

/// Normalize a configured root so it starts and ends with `/`.
pub fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

/// Absolute remote path for a path relative to `root`.
/// `root` must already be normalized.
pub fn join_root(root: &str, relative: &str) -> String {
    format!("{}{}", root, relative.trim_start_matches('/'))
}

/// Split an absolute remote path into its parent directory and base name.
pub fn split_path(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/".to_string(), trimmed[1..].to_string()),
        Some(index) => (
            trimmed[..index].to_string(),
            trimmed[index + 1..].to_string(),
        ),
        None if trimmed.is_empty() => ("/".to_string(), String::new()),
        None => ("/".to_string(), trimmed.to_string()),
    }
}
