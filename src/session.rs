use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ScrapeError;
use crate::export::write_exports;
use crate::llm::Restructurer;
use crate::pipeline::Pipeline;
use crate::result::ScrapeResult;
use crate::store::{RecordStore, ScrapeRecord};

/// One CLI invocation. Every scrape it runs is saved under the same session id.
pub struct Session<'a, R, S> {
    pub id: Uuid,
    pipeline: &'a Pipeline,
    restructurer: Option<&'a R>,
    store: Option<&'a S>,
    out_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub struct Outcome {
    pub result: ScrapeResult,
    pub restructured: Option<String>,
    pub record_id: Option<Uuid>,
    pub exported: Vec<PathBuf>,
}

fn spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

impl<'a, R: Restructurer, S: RecordStore> Session<'a, R, S> {
    pub fn new(
        pipeline: &'a Pipeline,
        restructurer: Option<&'a R>,
        store: Option<&'a S>,
        out_dir: Option<PathBuf>,
    ) -> Self {
        Session {
            id: Uuid::new_v4(),
            pipeline,
            restructurer,
            store,
            out_dir,
        }
    }

    /// Scrape, restructure, export and save. Scrape errors are saved as a
    /// failed record and then returned unchanged. A failed model call is
    /// recorded but keeps the extracted sections.
    pub async fn run(&self, url: &str) -> Result<Outcome> {
        let pb = spinner(format!("Scraping {}", url.trim()));
        let scraped = self.pipeline.scrape(url).await;
        pb.finish_and_clear();

        let result = match scraped {
            Ok(result) => result,
            Err(err) => {
                self.save_failure(url, &err);
                return Err(err.into());
            }
        };

        let mut model_error = None;
        let restructured = match self.restructurer {
            Some(r) => {
                let pb = spinner("Structuring content".to_string());
                let input = result.to_model_input()?;
                let reply = r.restructure(&input).await;
                pb.finish_and_clear();
                match reply {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!("Restructuring failed: {}", e);
                        model_error = Some(e.to_string());
                        None
                    }
                }
            }
            None => None,
        };

        let exported = match &self.out_dir {
            Some(dir) => write_exports(dir, &result, restructured.as_deref())?,
            None => Vec::new(),
        };

        let record_id = match self.store {
            Some(store) => {
                let mut record = ScrapeRecord::success(self.id, &result, restructured.clone())?;
                record.error = model_error;
                store.save(&record)?;
                info!(id = %record.id, session = %self.id, "Saved record");
                Some(record.id)
            }
            None => None,
        };

        Ok(Outcome {
            result,
            restructured,
            record_id,
            exported,
        })
    }

    fn save_failure(&self, url: &str, err: &ScrapeError) {
        if let Some(store) = self.store {
            let record = ScrapeRecord::failure(self.id, url.trim(), err);
            if let Err(e) = store.save(&record) {
                warn!("Could not save failed scrape: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::{LlmError, StoreError};
    use crate::settings::Settings;

    struct Echo;

    impl Restructurer for Echo {
        async fn restructure(&self, input: &str) -> Result<String, LlmError> {
            Ok(format!("echo:{input}"))
        }
    }

    struct Down;

    impl Restructurer for Down {
        async fn restructure(&self, _input: &str) -> Result<String, LlmError> {
            Err(LlmError::EmptyResponse)
        }
    }

    #[derive(Default)]
    struct MemoryStore(RefCell<Vec<ScrapeRecord>>);

    impl RecordStore for MemoryStore {
        fn save(&self, record: &ScrapeRecord) -> Result<(), StoreError> {
            self.0.borrow_mut().push(record.clone());
            Ok(())
        }
    }

    async fn page_server() -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<h1>Overview</h1><p>Intro text</p>")
            .create_async()
            .await;
        server
    }

    #[tokio::test]
    async fn full_run_restructures_exports_and_saves() {
        let server = page_server().await;
        let pipeline = Pipeline::new(&Settings::default()).unwrap();
        let store = MemoryStore::default();
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(&pipeline, Some(&Echo), Some(&store), Some(dir.path().to_path_buf()));

        let outcome = session.run(&server.url()).await.unwrap();
        assert_eq!(outcome.restructured.as_deref(), Some("echo:{\n  \"Overview\": \"Intro text\"\n}"));
        assert_eq!(outcome.exported.len(), 4);

        let saved = store.0.borrow();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].session_id, session.id);
        assert_eq!(Some(saved[0].id), outcome.record_id);
        assert!(saved[0].error.is_none());
    }

    #[tokio::test]
    async fn social_links_reach_the_model() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<p>Intro text</p><footer><a href=\"https://twitter.com/acme\">t</a></footer>")
            .create_async()
            .await;
        let pipeline = Pipeline::new(&Settings::default()).unwrap();
        let session: Session<'_, Echo, MemoryStore> = Session::new(&pipeline, Some(&Echo), None, None);

        let outcome = session.run(&server.url()).await.unwrap();
        let sent = outcome.restructured.unwrap();
        assert!(sent.ends_with("=== SOCIAL MEDIA LINKS ===\nhttps://twitter.com/acme"));
    }

    #[tokio::test]
    async fn model_failure_keeps_sections() {
        let server = page_server().await;
        let pipeline = Pipeline::new(&Settings::default()).unwrap();
        let store = MemoryStore::default();
        let session = Session::new(&pipeline, Some(&Down), Some(&store), None);

        let outcome = session.run(&server.url()).await.unwrap();
        assert!(outcome.restructured.is_none());
        assert_eq!(outcome.result.sections().len(), 1);
        assert_eq!(store.0.borrow()[0].error.as_deref(), Some("model returned no content"));
    }

    #[tokio::test]
    async fn invalid_url_is_saved_and_returned() {
        let pipeline = Pipeline::new(&Settings::default()).unwrap();
        let store = MemoryStore::default();
        let session: Session<'_, Echo, _> = Session::new(&pipeline, None, Some(&store), None);

        let err = session.run("notaurl").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScrapeError>(),
            Some(ScrapeError::Validation { .. })
        ));
        let saved = store.0.borrow();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].error.as_deref().unwrap().contains("invalid URL"));
    }
}
