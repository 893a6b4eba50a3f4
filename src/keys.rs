//! Key and endpoint conventions.
//!
//! Pure string functions — no SDK dependency. These define how local paths
//! map to remote object keys and how the bucket's website endpoint is
//! derived. The endpoint string is the only join key between the bucket and
//! its CDN distribution, so it must be deterministic.

use std::path::Path;

/// Static-website endpoint for a bucket in a region.
pub fn website_endpoint(bucket: &str, region: &str) -> String {
    format!("{bucket}.s3-website-{region}.amazonaws.com")
}

/// Origin id used when wiring a distribution to the website endpoint.
pub fn origin_id(endpoint: &str) -> String {
    format!("Custom-{endpoint}")
}

/// Remote key for a local file: path relative to `root`, forward slashes,
/// no leading slash, with `prefix` prepended verbatim.
pub fn remote_key(root: &Path, path: &Path, prefix: &str) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut key = String::new();
    for part in rel.components() {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(&part.as_os_str().to_string_lossy());
    }
    // Windows-style separators inside a single component still normalize.
    let key = key.replace('\\', "/");
    let key = key.trim_start_matches('/');
    if key.is_empty() {
        return None;
    }
    Some(format!("{prefix}{key}"))
}

/// CloudFront origin path for a key prefix: must start with a slash and
/// carry no trailing slash. Empty prefix maps to an empty origin path.
pub fn origin_path(prefix: &str) -> String {
    let trimmed = prefix
        .trim_start_matches(['/', '\\'])
        .trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Content type guessed from the file extension, falling back to a generic
/// binary type.
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn website_endpoint_joins_bucket_and_region() {
        assert_eq!(
            website_endpoint("mybucket", "us-east-1"),
            "mybucket.s3-website-us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn remote_key_is_relative_with_forward_slashes() {
        let root = PathBuf::from("/tmp/site");
        assert_eq!(
            remote_key(&root, &root.join("index.html"), "").as_deref(),
            Some("index.html")
        );
        assert_eq!(
            remote_key(&root, &root.join("img").join("logo.png"), "").as_deref(),
            Some("img/logo.png")
        );
    }

    #[test]
    fn remote_key_prepends_prefix() {
        let root = PathBuf::from("/tmp/site");
        assert_eq!(
            remote_key(&root, &root.join("index.html"), "v2/").as_deref(),
            Some("v2/index.html")
        );
    }

    #[test]
    fn remote_key_normalizes_backslashes_inside_components() {
        let root = PathBuf::from("/tmp/site");
        assert_eq!(
            remote_key(&root, &root.join("img\\logo.png"), "").as_deref(),
            Some("img/logo.png")
        );
    }

    #[test]
    fn remote_key_rejects_paths_outside_root() {
        let root = PathBuf::from("/tmp/site");
        assert_eq!(remote_key(&root, Path::new("/etc/passwd"), ""), None);
    }

    #[test]
    fn origin_path_normalizes_slashes() {
        assert_eq!(origin_path(""), "");
        assert_eq!(origin_path("assets"), "/assets");
        assert_eq!(origin_path("/assets/"), "/assets");
        assert_eq!(origin_path("\\assets\\"), "/assets");
    }

    #[test]
    fn content_type_guesses_with_binary_fallback() {
        assert_eq!(content_type_for(Path::new("index.html")), "text/html");
        assert_eq!(content_type_for(Path::new("logo.png")), "image/png");
        assert_eq!(
            content_type_for(Path::new("blob.xyzunknown")),
            "application/octet-stream"
        );
    }
}
