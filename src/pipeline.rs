use chrono::{DateTime, Utc};
use tracing::info;
use url::Url;

use crate::cleaner::Cleaner;
use crate::document::Document;
use crate::error::ScrapeError;
use crate::fetcher::{validate_url, Fetcher};
use crate::links::social_links;
use crate::result::ScrapeResult;
use crate::sectionizer::Sectionizer;
use crate::settings::Settings;

/// validate → fetch → parse → clean → sectionize, in that order, once per call.
pub struct Pipeline {
    fetcher: Fetcher,
    cleaner: Cleaner,
    sectionizer: Sectionizer,
    social_domains: Vec<String>,
}

impl Pipeline {
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        Ok(Pipeline {
            fetcher: Fetcher::new(&settings.fetch)?,
            cleaner: Cleaner::new(&settings.clean, &settings.sections),
            sectionizer: Sectionizer::new(&settings.sections),
            social_domains: settings.social.domains.clone(),
        })
    }

    pub async fn scrape(&self, input: &str) -> Result<ScrapeResult, ScrapeError> {
        let url = validate_url(input)?;
        let html = self.fetcher.fetch(&url).await?;
        self.extract(&url, &html, Utc::now())
    }

    /// Everything after the network call. Never fails once the HTML parses.
    pub fn extract(
        &self,
        url: &Url,
        html: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<ScrapeResult, ScrapeError> {
        let doc = Document::parse(html)?;
        let social = social_links(&doc, &self.social_domains);
        let cleaned = self.cleaner.clean(&doc);
        let sections = self.sectionizer.sectionize(&cleaned);
        info!(
            sections = sections.len(),
            social_links = social.len(),
            "Extracted {}",
            url
        );
        Ok(ScrapeResult::new(url.as_str(), fetched_at, sections, social))
    }
}
