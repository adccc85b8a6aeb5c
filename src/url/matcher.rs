/// Checks if a host is a domain or one of its subdomains
///
/// Both arguments are expected to be lowercase.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::is_within_domain;
///
/// assert!(is_within_domain("example.com", "example.com"));
/// assert!(is_within_domain("api.v2.example.com", "example.com"));
/// assert!(!is_within_domain("notexample.com", "example.com"));
/// ```
pub fn is_within_domain(host: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }

    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

/// Checks a host against a whitelist of allowed domains
pub fn domain_allowed(host: &str, allowed: &[String]) -> bool {
    let host = host.to_lowercase();
    allowed.iter().any(|domain| is_within_domain(&host, domain))
}
