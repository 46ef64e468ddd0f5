mod cleaner;
mod document;
mod error;
mod export;
mod fetcher;
mod links;
mod llm;
mod pipeline;
mod result;
mod sectionizer;
mod session;
mod settings;
mod store;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm::ChatClient;
use crate::pipeline::Pipeline;
use crate::session::Session;
use crate::settings::Settings;
use crate::store::{ScrapeRecord, SqliteStore};

const URL_WIDTH: usize = 48;

#[derive(Parser)]
#[command(name = "section_scraper", about = "Scrape a page into heading-keyed sections")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a URL, restructure it with the model, export and save the result
    Scrape {
        url: String,
        /// Skip the model call even when it is configured
        #[arg(long)]
        no_llm: bool,
        /// Do not write a record to the store
        #[arg(long)]
        no_save: bool,
        /// Export directory (default: export.out_dir from config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the sections of a URL without calling the model or saving
    Sections {
        url: String,
        /// Print the label-to-body JSON mapping instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// List recently saved scrapes
    History {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show one saved scrape
    Show { id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load configuration")?;

    let result = match cli.command {
        Commands::Scrape {
            url,
            no_llm,
            no_save,
            out,
        } => {
            let pipeline = Pipeline::new(&settings).context("Failed to build HTTP client")?;

            let chat = if no_llm {
                None
            } else if settings.llm.is_configured() {
                Some(ChatClient::new(&settings.llm)?)
            } else {
                warn!("Model endpoint not configured (SCRAPER_LLM__*); exporting raw sections only");
                None
            };
            let store = if no_save {
                None
            } else {
                Some(SqliteStore::open(&settings.store.db_path)?)
            };
            let out_dir = out.unwrap_or_else(|| PathBuf::from(&settings.export.out_dir));

            let session = Session::new(&pipeline, chat.as_ref(), store.as_ref(), Some(out_dir));
            info!(session = %session.id, "Starting scrape");
            let outcome = session.run(&url).await?;

            println!(
                "Extracted {} sections from {}",
                outcome.result.sections().len(),
                outcome.result.url()
            );
            match &outcome.restructured {
                Some(text) => println!("\n{}\n", text),
                None => println!("\n{}", outcome.result.to_plain_text()),
            }
            for path in &outcome.exported {
                println!("Wrote {}", path.display());
            }
            if let Some(id) = outcome.record_id {
                println!("Saved record {}", id);
            }
            Ok(())
        }
        Commands::Sections { url, json } => {
            let pipeline = Pipeline::new(&settings).context("Failed to build HTTP client")?;
            let result = pipeline.scrape(&url).await?;
            if result.sections().is_empty() {
                println!("No visible text found.");
                return Ok(());
            }
            if json {
                println!("{}", result.to_structured_json()?);
            } else {
                print!("{}", result.to_plain_text());
            }
            Ok(())
        }
        Commands::History { limit } => {
            let store = SqliteStore::open(&settings.store.db_path)?;
            let rows = store.recent(limit)?;
            if rows.is_empty() {
                println!("No saved scrapes.");
                return Ok(());
            }

            println!("{:<36} | {:<20} | {:<6} | URL", "Id", "Created", "Status");
            println!("{}", "-".repeat(71 + URL_WIDTH));
            for r in &rows {
                println!(
                    "{:<36} | {:<20} | {:<6} | {}",
                    r.id,
                    r.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    status_label(r),
                    fit_column(&r.url, URL_WIDTH)
                );
            }
            println!("\n{} records", rows.len());
            Ok(())
        }
        Commands::Show { id } => {
            let store = SqliteStore::open(&settings.store.db_path)?;
            match store.get(&id)? {
                None => println!("No record {}", id),
                Some(r) => {
                    println!("Id:       {}", r.id);
                    println!("Session:  {}", r.session_id);
                    println!("URL:      {}", r.url);
                    if let Some(t) = r.fetched_at {
                        println!("Fetched:  {}", t.to_rfc3339());
                    }
                    if let Some(e) = &r.error {
                        println!("Error:    {}", e);
                    }
                    if let Some(json) = &r.result_json {
                        println!("\n--- Sections ---\n{}", json);
                    }
                    if let Some(text) = &r.restructured {
                        println!("\n--- Structured ---\n{}", text);
                    }
                }
            }
            Ok(())
        }
    };

    info!("Done in {}", format_duration(t0.elapsed()));

    result
}

fn status_label(r: &ScrapeRecord) -> &'static str {
    match (&r.result_json, &r.error) {
        (None, _) => "failed",
        (Some(_), Some(_)) => "raw",
        (Some(_), None) => "ok",
    }
}

/// Fit `s` into a column `width` chars wide. A cut value ends in `…` so the
/// row stays aligned.
fn fit_column(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn format_duration(d: Duration) -> String {
    match d.as_millis() {
        ms if ms < 1_000 => format!("{ms}ms"),
        ms if ms < 60_000 => format!("{:.1}s", d.as_secs_f64()),
        _ => format!("{}m {:02}s", d.as_secs() / 60, d.as_secs() % 60),
    }
}
