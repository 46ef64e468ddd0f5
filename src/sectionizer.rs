use crate::document::{is_block, Document, Element, Node};
use crate::result::Section;
use crate::settings::SectionSettings;

/// Groups visible text under the nearest preceding heading.
#[derive(Debug, Clone)]
pub struct Sectionizer {
    heading_tags: Vec<String>,
    sentinel: String,
    empty_label: String,
}

/// Accumulates text chunks, choosing the separator from what sat between them
/// in the source: a block boundary gives `\n`, whitespace gives one space,
/// and directly adjacent runs are glued.
#[derive(Debug, Default)]
struct TextJoiner {
    buf: String,
    pending_break: bool,
    pending_space: bool,
}

impl TextJoiner {
    fn block_boundary(&mut self) {
        self.pending_break = true;
    }

    fn push(&mut self, raw: &str) {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !raw.is_empty() {
                self.pending_space = true;
            }
            return;
        }
        if !self.buf.is_empty() {
            if self.pending_break {
                self.buf.push('\n');
            } else if self.pending_space || raw.starts_with(char::is_whitespace) {
                self.buf.push(' ');
            }
        }
        self.buf.push_str(&collapsed);
        self.pending_break = false;
        self.pending_space = raw.ends_with(char::is_whitespace);
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self) -> String {
        self.pending_space = false;
        std::mem::take(&mut self.buf)
    }
}

/// Per-call traversal state. Lives only for one `sectionize` call.
struct Walk<'a> {
    sz: &'a Sectionizer,
    cursor: String,
    body: TextJoiner,
    sections: Vec<Section>,
}

impl Walk<'_> {
    fn visit(&mut self, el: &Element) {
        for child in &el.children {
            match child {
                Node::Text(t) => self.body.push(t),
                Node::Element(c) if self.sz.is_heading(c) => {
                    self.flush();
                    self.cursor = self.sz.label_for(c);
                    self.body.block_boundary();
                }
                Node::Element(c) => {
                    let block = is_block(&c.tag);
                    if block {
                        self.body.block_boundary();
                    }
                    self.visit(c);
                    if block {
                        self.body.block_boundary();
                    }
                }
            }
        }
    }

    fn flush(&mut self) {
        if !self.body.is_empty() {
            self.sections.push(Section {
                heading: self.cursor.clone(),
                body: self.body.take(),
            });
        }
    }
}

impl Sectionizer {
    pub fn new(settings: &SectionSettings) -> Self {
        Sectionizer {
            heading_tags: settings
                .heading_tags
                .iter()
                .map(|t| t.trim().to_lowercase())
                .collect(),
            sentinel: settings.sentinel_label.clone(),
            empty_label: settings.empty_heading_label.clone(),
        }
    }

    fn is_heading(&self, el: &Element) -> bool {
        self.heading_tags.contains(&el.tag)
    }

    fn label_for(&self, heading: &Element) -> String {
        let mut joiner = TextJoiner::default();
        collect_into(heading, &mut joiner, &|_| false);
        let label = joiner.take().replace('\n', " ");
        if label.is_empty() {
            self.empty_label.clone()
        } else {
            label
        }
    }

    /// Single in-order pass over a cleaned document.
    pub fn sectionize(&self, doc: &Document) -> Vec<Section> {
        let mut walk = Walk {
            sz: self,
            cursor: self.sentinel.clone(),
            body: TextJoiner::default(),
            sections: Vec::new(),
        };
        walk.visit(doc.root());
        walk.flush();
        walk.sections
    }

    /// Visible text outside headings, using the same joining rules as section bodies.
    /// Equal to the section bodies joined with `\n`.
    pub fn visible_text(&self, doc: &Document) -> String {
        let mut joiner = TextJoiner::default();
        collect_into(doc.root(), &mut joiner, &|el| self.is_heading(el));
        joiner.take()
    }
}

/// Feed every text node under `el` into `joiner`. Elements for which `skip`
/// returns true contribute a block boundary instead of their text.
fn collect_into(el: &Element, joiner: &mut TextJoiner, skip: &dyn Fn(&Element) -> bool) {
    for child in &el.children {
        match child {
            Node::Text(t) => joiner.push(t),
            Node::Element(c) if skip(c) => joiner.block_boundary(),
            Node::Element(c) => {
                let block = is_block(&c.tag);
                if block {
                    joiner.block_boundary();
                }
                collect_into(c, joiner, skip);
                if block {
                    joiner.block_boundary();
                }
            }
        }
    }
}
