//! Sitemap loading for frontier seeding
//!
//! Only the `<loc>` entries of `<urlset>` and `<sitemapindex>` documents are
//! read. Failures of any kind simply contribute no URLs.

use crate::url::normalize_url;
use regex::Regex;
use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

/// How deep sitemap indexes are followed
pub const MAX_SITEMAP_NESTING: u32 = 3;

fn loc_regex() -> Option<&'static Regex> {
    static LOC: OnceLock<Option<Regex>> = OnceLock::new();
    LOC.get_or_init(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").ok())
        .as_ref()
}

/// Extracted `<loc>` values of one sitemap document
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    pub is_index: bool,
    pub locations: Vec<String>,
}

/// Parses sitemap XML text
pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let is_index = xml.to_ascii_lowercase().contains("<sitemapindex");

    let locations = loc_regex()
        .map(|re| {
            re.captures_iter(xml)
                .filter_map(|c| c.get(1))
                .map(|m| unescape_xml(strip_cdata(m.as_str())))
                .filter(|loc| !loc.is_empty())
                .collect()
        })
        .unwrap_or_default();

    SitemapDocument {
        is_index,
        locations,
    }
}

fn strip_cdata(s: &str) -> &str {
    s.strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .unwrap_or(s)
        .trim()
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Fetches sitemaps (following indexes) and returns up to `max_urls` page URLs
///
/// Relative sitemap URLs are resolved against `base`. Returned URLs are
/// normalized; unparseable entries are skipped.
pub async fn load_sitemap_urls(
    client: &Client,
    sitemaps: &[String],
    base: &Url,
    max_urls: usize,
) -> Vec<Url> {
    let mut urls = Vec::new();
    let mut visited = HashSet::new();
    let mut pending: VecDeque<(String, u32)> =
        sitemaps.iter().map(|s| (s.clone(), 0)).collect();

    while let Some((location, level)) = pending.pop_front() {
        if urls.len() >= max_urls {
            break;
        }

        let Ok(sitemap_url) = base.join(&location) else {
            debug!("Skipping unparseable sitemap URL {}", location);
            continue;
        };
        if !visited.insert(sitemap_url.to_string()) {
            continue;
        }

        let Some(body) = fetch_text(client, &sitemap_url).await else {
            continue;
        };

        let document = parse_sitemap(&body);
        if document.is_index {
            if level + 1 < MAX_SITEMAP_NESTING {
                pending.extend(document.locations.into_iter().map(|l| (l, level + 1)));
            } else {
                debug!("Sitemap index {} nested too deep, ignoring", sitemap_url);
            }
            continue;
        }

        for loc in document.locations {
            if urls.len() >= max_urls {
                break;
            }
            if let Ok(url) = normalize_url(&loc) {
                urls.push(url);
            }
        }
    }

    debug!("Loaded {} URLs from sitemaps", urls.len());
    urls
}

async fn fetch_text(client: &Client, url: &Url) -> Option<String> {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("Sitemap {} unreachable: {}", url, e);
            return None;
        }
    };

    if !response.status().is_success() {
        debug!("Sitemap {} returned {}", url, response.status());
        return None;
    }

    response.text().await.ok()
}
