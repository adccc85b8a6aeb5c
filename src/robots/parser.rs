//! Robots.txt policy parsing
//!
//! Allow/deny matching is delegated to the robotstxt crate; `Sitemap:` lines
//! are collected separately since they apply regardless of user-agent group.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt for one origin
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    sitemaps: Vec<String>,
}

impl RobotsPolicy {
    /// Creates a policy from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            sitemaps: parse_sitemaps(content),
        }
    }

    /// Creates a permissive policy that allows everything and declares no sitemaps
    ///
    /// Used whenever robots.txt cannot be fetched or read.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks if a full URL is allowed for the given product token
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url)
    }

    /// Sitemap URLs declared anywhere in the file, in order of appearance
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

fn parse_sitemaps(content: &str) -> Vec<String> {
    let mut sitemaps = Vec::new();

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();

        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim();
            if key.trim().eq_ignore_ascii_case("sitemap") && !value.is_empty() {
                let value = value.to_string();
                if !sitemaps.contains(&value) {
                    sitemaps.push(value);
                }
            }
        }
    }

    sitemaps
}
