//! Tree filter that removes non-content elements before sectioning.
//!
//! Removal always takes the whole subtree, so text inside a `<script>` can
//! never leak into the output. Anything not explicitly matched is kept.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::document::{Document, Element, Node};
use crate::settings::{CleanSettings, SectionSettings};

/// Dropped unconditionally: executable, styling, embedded and interactive content.
const ALWAYS_DROP: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "embed", "object", "svg", "canvas",
    "form", "dialog",
];

static HIDDEN_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|;)\s*(?:display\s*:\s*none|visibility\s*:\s*hidden)\b").unwrap()
});

/// Page chrome, dropped unless it carries a non-empty heading.
const CHROME: &[&str] = &["nav", "header", "footer", "aside"];

#[derive(Debug, Clone)]
pub struct Cleaner {
    deny_list: Vec<String>,
    heading_tags: Vec<String>,
    drop_hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    Drop(&'static str),
}

impl Cleaner {
    pub fn new(clean: &CleanSettings, sections: &SectionSettings) -> Self {
        Cleaner {
            deny_list: clean
                .deny_list
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            heading_tags: sections
                .heading_tags
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            drop_hidden: clean.drop_hidden,
        }
    }

    /// Return a filtered copy; the input is left untouched.
    pub fn clean(&self, doc: &Document) -> Document {
        let mut removed = 0usize;
        let root = self.filter_element(doc.root(), &mut removed);
        debug!(removed, "cleaned document");
        Document::from_root(root)
    }

    fn filter_element(&self, el: &Element, removed: &mut usize) -> Element {
        let children = el
            .children
            .iter()
            .filter_map(|child| match child {
                Node::Text(t) => Some(Node::Text(t.clone())),
                Node::Element(c) => match self.verdict(c) {
                    Verdict::Keep => Some(Node::Element(self.filter_element(c, removed))),
                    Verdict::Drop(reason) => {
                        *removed += 1;
                        debug!(tag = %c.tag, reason, "dropping subtree");
                        None
                    }
                },
            })
            .collect();

        Element {
            tag: el.tag.clone(),
            attrs: el.attrs.clone(),
            children,
        }
    }

    fn verdict(&self, el: &Element) -> Verdict {
        let tag = el.tag.as_str();
        if ALWAYS_DROP.contains(&tag) {
            return Verdict::Drop("non-content");
        }
        if self.is_denied(el) {
            return Verdict::Drop("deny-list");
        }
        if self.drop_hidden && is_hidden(el) {
            return Verdict::Drop("hidden");
        }
        if CHROME.contains(&tag) && !self.has_data_heading(el) {
            return Verdict::Drop("chrome");
        }
        Verdict::Keep
    }

    fn is_denied(&self, el: &Element) -> bool {
        if self.deny_list.is_empty() {
            return false;
        }
        ["class", "id"]
            .iter()
            .filter_map(|name| el.attr(name))
            .map(str::to_lowercase)
            .any(|value| self.deny_list.iter().any(|needle| marks(&value, needle)))
    }

    /// Headings inside subtrees that are dropped anyway do not count.
    fn has_data_heading(&self, el: &Element) -> bool {
        el.children.iter().any(|child| match child {
            Node::Element(c) if matches!(self.verdict(c), Verdict::Drop(_)) => false,
            Node::Element(c) => {
                (self.heading_tags.contains(&c.tag) && !c.text().trim().is_empty())
                    || self.has_data_heading(c)
            }
            Node::Text(_) => false,
        })
    }
}

/// `needle` occurs at the start of `value` or right after a `-`, `_` or space,
/// so `ads` matches `top-ads` but not `threads-list`.
fn marks(value: &str, needle: &str) -> bool {
    value.match_indices(needle).any(|(i, _)| {
        value[..i]
            .chars()
            .next_back()
            .map_or(true, |c| c == '-' || c == '_' || c.is_whitespace())
    })
}

fn is_hidden(el: &Element) -> bool {
    if el.has_attr("hidden") {
        return true;
    }
    if el
        .attr("aria-hidden")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    {
        return true;
    }
    el.attr("style").is_some_and(|style| HIDDEN_STYLE_RE.is_match(style))
}
