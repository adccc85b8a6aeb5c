use std::net::IpAddr;
use url::Url;

/// Second-level labels under which registration happens one level deeper
/// (`example.co.uk`, `example.com.au`, ...)
const PUBLIC_SECOND_LEVEL: &[&str] = &[
    "ac", "co", "com", "edu", "gov", "gob", "govt", "ltd", "me", "mil", "ne", "net", "nhs",
    "nic", "or", "org", "plc", "sch",
];

/// Extracts the lowercased host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_harvest::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Origin of a URL (scheme + host + non-default port), the unit robots.txt applies to
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Returns the registrable domain of a host
///
/// Keeps the last two labels, or three when the second-to-last label is a
/// well-known public second level under a two-letter country code
/// (`www.example.co.uk` -> `example.co.uk`). IP addresses and single-label
/// hosts are returned unchanged.
///
/// ```
/// use sumi_harvest::url::registrable_domain;
///
/// assert_eq!(registrable_domain("www.example.com"), "example.com");
/// assert_eq!(registrable_domain("shop.example.co.uk"), "example.co.uk");
/// assert_eq!(registrable_domain("localhost"), "localhost");
/// ```
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }

    let tld = labels[labels.len() - 1];
    let second = labels[labels.len() - 2];
    let keep = if tld.len() == 2 && PUBLIC_SECOND_LEVEL.contains(&second) {
        3
    } else {
        2
    };

    labels[labels.len() - keep..].join(".")
}
