use scraper::{ElementRef, Html};

use crate::error::ScrapeError;

/// Owned HTML tree. Only elements and text survive conversion; comments,
/// doctypes and processing instructions are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

/// Elements that start a new line in rendered text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "caption", "dd", "details",
    "dialog", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hr", "html", "li", "main", "nav", "ol", "p", "pre",
    "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Deepest element nesting accepted from a page. Every later pass walks the
/// tree recursively, so this bounds their stack use.
pub const MAX_DEPTH: usize = 512;

pub fn is_block(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

impl Document {
    /// Parse raw HTML and keep the `<body>` subtree (or `<html>` when there is no body).
    pub fn parse(html: &str) -> Result<Document, ScrapeError> {
        if html.trim().is_empty() {
            return Err(ScrapeError::Parse("response body is empty".into()));
        }
        if html.contains('\0') {
            return Err(ScrapeError::Parse("response body looks binary".into()));
        }

        let parsed = Html::parse_document(html);
        let html_el = parsed.root_element();
        let root = html_el
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "body")
            .unwrap_or(html_el);

        let root = convert(root, 0)?;
        Ok(Document { root })
    }

    pub fn from_root(root: Element) -> Document {
        Document { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Depth-first iterator over every element, root included.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        let mut stack = vec![&self.root];
        std::iter::from_fn(move || {
            let el = stack.pop()?;
            for child in el.children.iter().rev() {
                if let Node::Element(c) = child {
                    stack.push(c);
                }
            }
            Some(el)
        })
    }
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Raw concatenation of every descendant text node.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
        }
    }
}

fn convert(el: ElementRef<'_>, depth: usize) -> Result<Element, ScrapeError> {
    if depth > MAX_DEPTH {
        return Err(ScrapeError::Parse(format!(
            "elements nested deeper than {MAX_DEPTH} levels"
        )));
    }

    let mut children = Vec::new();
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            children.push(Node::Text(text.to_string()));
        } else if let Some(c) = ElementRef::wrap(child) {
            children.push(Node::Element(convert(c, depth + 1)?));
        }
    }

    let value = el.value();
    Ok(Element {
        tag: value.name().to_string(),
        attrs: value
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_body_only() {
        let doc = Document::parse(
            "<html><head><title>T</title></head><body><p class=\"x\">Hi</p></body></html>",
        )
        .unwrap();
        assert_eq!(doc.root().tag, "body");
        assert_eq!(doc.root().text(), "Hi");
        let p = doc.elements().find(|e| e.tag == "p").unwrap();
        assert_eq!(p.attr("class"), Some("x"));
    }

    #[test]
    fn fragment_gets_wrapped_in_body() {
        let doc = Document::parse("<h1>Overview</h1><p>Intro</p>").unwrap();
        assert_eq!(doc.root().tag, "body");
        let tags: Vec<_> = doc.elements().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["body", "h1", "p"]);
    }

    #[test]
    fn comments_are_dropped() {
        let doc = Document::parse("<p>a<!-- hidden -->b</p>").unwrap();
        assert_eq!(doc.root().text(), "ab");
    }

    #[test]
    fn empty_body_is_a_parse_error() {
        assert!(matches!(Document::parse("   \n"), Err(ScrapeError::Parse(_))));
    }

    #[test]
    fn nesting_within_limit_parses() {
        let depth = MAX_DEPTH - 10;
        let html = format!("{}deep{}", "<div>".repeat(depth), "</div>".repeat(depth));
        assert_eq!(Document::parse(&html).unwrap().root().text(), "deep");
    }

    #[test]
    fn runaway_nesting_is_a_parse_error() {
        let html = format!("{}deep{}", "<div>".repeat(5_000), "</div>".repeat(5_000));
        assert!(matches!(Document::parse(&html), Err(ScrapeError::Parse(_))));
    }

    #[test]
    fn binary_body_is_a_parse_error() {
        assert!(matches!(
            Document::parse("PK\u{3}\u{4}\0\0"),
            Err(ScrapeError::Parse(_))
        ));
    }
}
