use crate::UrlError;
use url::Url;

/// Normalizes an absolute URL so equivalent spellings collapse to one key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an `http` or `https` scheme
/// 3. Lowercase scheme and host, strip the default port (done by the parser)
/// 4. Remove the fragment
/// 5. Normalize the path:
///    - Collapse repeated separators
///    - Remove dot segments (`.` and `..`)
///    - Remove trailing slash (except for root `/`)
///    - Empty path becomes `/`
/// 6. Leave the query string untouched
///
/// Normalizing an already-normalized URL is a no-op.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::normalize_url;
///
/// let url = normalize_url("HTTP://EXAMPLE.COM:80//docs//guide/#intro").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/docs/guide");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(url)
}

/// Resolves a possibly-relative reference against `base`, then normalizes it
///
/// Anything that does not end up as `http`/`https` (`mailto:`, `javascript:`,
/// `data:`...) is rejected with [`UrlError::InvalidScheme`].
pub fn resolve_url(base: &Url, href: &str) -> Result<Url, UrlError> {
    let url = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(url)
}

fn canonicalize(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlError::MissingDomain),
    }

    url.set_fragment(None);

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    Ok(url)
}

/// Normalizes a URL path by removing dot segments, empty segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}
