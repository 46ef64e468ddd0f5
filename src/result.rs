use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

pub const SOCIAL_HEADING: &str = "SOCIAL MEDIA LINKS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

/// Output of one scrape. Built once by the pipeline and read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResult {
    url: String,
    fetched_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_sections")]
    sections: Vec<Section>,
    social_links: Vec<String>,
}

impl ScrapeResult {
    pub fn new(
        url: impl Into<String>,
        fetched_at: DateTime<Utc>,
        sections: Vec<Section>,
        social_links: Vec<String>,
    ) -> Self {
        ScrapeResult {
            url: url.into(),
            fetched_at,
            sections,
            social_links,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn social_links(&self) -> &[String] {
        &self.social_links
    }

    /// `=== label ===`, blank line, body; one block per section in order.
    pub fn to_plain_text(&self) -> String {
        let mut blocks: Vec<String> = self
            .sections
            .iter()
            .map(|s| format!("=== {} ===\n\n{}", s.heading, s.body))
            .collect();
        if !self.social_links.is_empty() {
            blocks.push(format!(
                "=== {} ===\n\n{}",
                SOCIAL_HEADING,
                self.social_links.join("\n")
            ));
        }
        let mut out = blocks.join("\n\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// The label-to-body mapping alone; this is what the summarizer receives.
    pub fn to_structured_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&StructuredSections(&self.sections))
    }

    /// What the restructurer receives: the label map, then the social links
    /// as a trailing plain-text block so they survive into the model output.
    pub fn to_model_input(&self) -> serde_json::Result<String> {
        let mut input = self.to_structured_json()?;
        if !self.social_links.is_empty() {
            input.push_str(&format!(
                "\n\n=== {} ===\n{}",
                SOCIAL_HEADING,
                self.social_links.join("\n")
            ));
        }
        Ok(input)
    }

    /// Full export document: url, timestamp, mapping and social links.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Label-to-body pairs in order of first appearance. Repeated labels have
/// their bodies appended, separated by a blank line.
fn merge(sections: &[Section]) -> Vec<(&str, String)> {
    let mut merged: Vec<(&str, String)> = Vec::new();
    for s in sections {
        match merged.iter_mut().find(|(h, _)| *h == s.heading) {
            Some((_, body)) => {
                body.push_str("\n\n");
                body.push_str(&s.body);
            }
            None => merged.push((&s.heading, s.body.clone())),
        }
    }
    merged
}

struct StructuredSections<'a>(&'a [Section]);

impl Serialize for StructuredSections<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let merged = merge(self.0);
        let mut map = serializer.serialize_map(Some(merged.len()))?;
        for (heading, body) in &merged {
            map.serialize_entry(heading, body)?;
        }
        map.end()
    }
}

fn serialize_sections<S: Serializer>(sections: &[Section], serializer: S) -> Result<S::Ok, S::Error> {
    StructuredSections(sections).serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(social: Vec<String>) -> ScrapeResult {
        ScrapeResult::new(
            "https://example.com/event",
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            vec![
                Section { heading: "Overview".into(), body: "Intro text".into() },
                Section { heading: "FAQ".into(), body: "q1".into() },
                Section { heading: "Details".into(), body: "More text".into() },
                Section { heading: "FAQ".into(), body: "q2".into() },
            ],
            social,
        )
    }

    #[test]
    fn plain_text_follows_section_order() {
        let text = sample(vec![]).to_plain_text();
        assert_eq!(
            text,
            "=== Overview ===\n\nIntro text\n\n=== FAQ ===\n\nq1\n\n=== Details ===\n\nMore text\n\n=== FAQ ===\n\nq2\n"
        );
    }

    #[test]
    fn plain_text_appends_social_block() {
        let text = sample(vec!["https://twitter.com/x".into(), "https://wa.me/1".into()]).to_plain_text();
        assert!(text.ends_with("=== SOCIAL MEDIA LINKS ===\n\nhttps://twitter.com/x\nhttps://wa.me/1\n"));
    }

    #[test]
    fn structured_merges_repeated_labels_in_first_position() {
        let json = sample(vec![]).to_structured_json().unwrap();
        let overview = json.find("\"Overview\"").unwrap();
        let faq = json.find("\"FAQ\"").unwrap();
        let details = json.find("\"Details\"").unwrap();
        assert!(overview < faq && faq < details);
        assert_eq!(json.matches("\"FAQ\"").count(), 1);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["FAQ"], "q1\n\nq2");
    }

    #[test]
    fn model_input_carries_social_links() {
        let without = sample(vec![]);
        assert_eq!(without.to_model_input().unwrap(), without.to_structured_json().unwrap());

        let with = sample(vec!["https://t.me/x".into(), "https://wa.me/1".into()]);
        let input = with.to_model_input().unwrap();
        assert!(input.starts_with(&with.to_structured_json().unwrap()));
        assert!(input.ends_with("}\n\n=== SOCIAL MEDIA LINKS ===\nhttps://t.me/x\nhttps://wa.me/1"));
    }

    #[test]
    fn full_json_carries_metadata() {
        let value: serde_json::Value =
            serde_json::from_str(&sample(vec!["https://t.me/x".into()]).to_json().unwrap()).unwrap();
        assert_eq!(value["url"], "https://example.com/event");
        assert_eq!(value["fetched_at"], "2024-06-01T12:00:00Z");
        assert_eq!(value["sections"]["Details"], "More text");
        assert_eq!(value["social_links"][0], "https://t.me/x");
    }

    #[test]
    fn empty_result_renders_empty() {
        let r = ScrapeResult::new("https://example.com", Utc::now(), vec![], vec![]);
        assert_eq!(r.to_plain_text(), "");
        assert_eq!(r.to_structured_json().unwrap(), "{}");
    }
}
