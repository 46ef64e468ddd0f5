use std::collections::BTreeSet;

use url::Url;

use crate::document::Document;

/// Trimmed, de-duplicated, sorted `href`s whose host is one of `domains`
/// or a subdomain of one.
pub fn social_links(doc: &Document, domains: &[String]) -> Vec<String> {
    let links: BTreeSet<String> = doc
        .elements()
        .filter(|el| el.tag == "a")
        .filter_map(|el| el.attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter(|href| points_at(href, domains))
        .map(str::to_string)
        .collect();
    links.into_iter().collect()
}

fn points_at(href: &str, domains: &[String]) -> bool {
    let Some(host) = Url::parse(href).ok().and_then(|u| u.host_str().map(str::to_lowercase)) else {
        return false;
    };
    domains.iter().any(|d| {
        let d = d.trim().to_lowercase();
        host == d || host.ends_with(&format!(".{d}"))
    })
}
