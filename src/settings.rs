use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

const CONFIG_FILE: &str = "section_scraper";
const ENV_PREFIX: &str = "SCRAPER";

/// Keys that arrive as comma-separated lists when set through the environment.
const LIST_KEYS: &[&str] = &[
    "clean.deny_list",
    "sections.heading_tags",
    "social.domains",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fetch: FetchSettings,
    pub clean: CleanSettings,
    pub sections: SectionSettings,
    pub social: SocialSettings,
    pub llm: LlmSettings,
    pub store: StoreSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            timeout_secs: 15,
            user_agent: "Mozilla/5.0 (compatible; section_scraper)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanSettings {
    /// Case-insensitive markers matched against `class` and `id`. A marker
    /// must start a class token or a `-`/`_` delimited segment of one.
    pub deny_list: Vec<String>,
    pub drop_hidden: bool,
}

impl Default for CleanSettings {
    fn default() -> Self {
        CleanSettings {
            deny_list: [
                "cookie",
                "consent",
                "gdpr",
                "advert",
                "ad-banner",
                "ad-slot",
                "ads",
                "sponsored",
                "newsletter-popup",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            drop_hidden: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SectionSettings {
    pub heading_tags: Vec<String>,
    pub sentinel_label: String,
    pub empty_heading_label: String,
}

impl Default for SectionSettings {
    fn default() -> Self {
        SectionSettings {
            heading_tags: (1..=6).map(|n| format!("h{n}")).collect(),
            sentinel_label: "INTRODUCTION".to_string(),
            empty_heading_label: "UNTITLED".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SocialSettings {
    pub domains: Vec<String>,
}

impl Default for SocialSettings {
    fn default() -> Self {
        SocialSettings {
            domains: [
                "facebook.com",
                "twitter.com",
                "x.com",
                "linkedin.com",
                "instagram.com",
                "youtube.com",
                "t.me",
                "wa.me",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmFlavor {
    Azure,
    OpenAi,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Model name, or the deployment name for Azure.
    pub model: Option<String>,
    pub api_version: String,
    pub flavor: LlmFlavor,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_input_chars: usize,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        LlmSettings {
            endpoint: None,
            api_key: None,
            model: None,
            api_version: "2024-03-01-preview".to_string(),
            flavor: LlmFlavor::Azure,
            temperature: 0.0,
            max_tokens: 4096,
            max_input_chars: 480_000,
            timeout_secs: 120,
        }
    }
}

impl LlmSettings {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some() && self.model.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub db_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            db_path: "data/scrapes.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub out_dir: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        ExportSettings {
            out_dir: "out".to_string(),
        }
    }
}

fn env_source() -> Environment {
    LIST_KEYS.iter().fold(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(","),
        |env, key| env.with_list_parse_key(key),
    )
}

impl Settings {
    /// Defaults, then `section_scraper.toml` if present, then `SCRAPER_*` env vars.
    pub fn load() -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_heading_levels() {
        let s = Settings::default();
        assert_eq!(s.sections.heading_tags, vec!["h1", "h2", "h3", "h4", "h5", "h6"]);
        assert_eq!(s.sections.sentinel_label, "INTRODUCTION");
        assert_eq!(s.fetch.timeout_secs, 15);
        assert!(!s.llm.is_configured());
    }

    #[test]
    fn toml_overrides_keep_other_defaults() {
        let s = Settings::from_toml(
            r#"
            [fetch]
            timeout_secs = 3

            [clean]
            deny_list = ["promo"]

            [llm]
            endpoint = "https://example.openai.azure.com"
            api_key = "k"
            model = "gpt-4o"
            flavor = "openai"
            "#,
        )
        .unwrap();
        assert_eq!(s.fetch.timeout_secs, 3);
        assert_eq!(s.fetch.user_agent, FetchSettings::default().user_agent);
        assert_eq!(s.clean.deny_list, vec!["promo"]);
        assert!(s.clean.drop_hidden);
        assert_eq!(s.llm.flavor, LlmFlavor::OpenAi);
        assert_eq!(s.llm.max_tokens, 4096);
        assert!(s.llm.is_configured());
    }

    #[test]
    fn empty_source_is_all_defaults() {
        let s = Settings::from_toml("").unwrap();
        assert_eq!(s.store.db_path, "data/scrapes.sqlite");
        assert_eq!(s.social.domains.len(), 8);
    }
}
