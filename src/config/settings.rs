//! Settings structures for SearchRelay configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main settings structure loaded from `searchrelay.yml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub outgoing: OutgoingSettings,
    pub providers: Vec<ProviderSettings>,
    pub coordinator: CoordinatorSettings,
    pub pipeline: PipelineSettings,
    pub autosave: AutoSaveSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            outgoing: OutgoingSettings::default(),
            providers: default_providers(),
            coordinator: CoordinatorSettings::default(),
            pipeline: PipelineSettings::default(),
            autosave: AutoSaveSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Merge with environment variables (SEARCHRELAY_* prefix plus provider credentials)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("SEARCHRELAY_CACHE_TTL") {
            if let Ok(ttl) = val.parse() {
                self.search.cache_ttl = ttl;
            }
        }
        if let Ok(val) = std::env::var("SEARCHRELAY_COUNTRY") {
            self.search.locale.country = val;
        }
        if let Ok(val) = std::env::var("SEARCHRELAY_AUTOSAVE_DIR") {
            self.autosave.directory = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SEARCHRELAY_AUTOSAVE") {
            self.autosave.enabled = val.parse().unwrap_or(self.autosave.enabled);
        }

        let google_key = std::env::var("GOOGLE_SEARCH_KEY").ok();
        let google_cse = std::env::var("GOOGLE_CSE_ID").ok();
        let serper_key = std::env::var("SERPER_API_KEY").ok();
        let exa_key = std::env::var("EXA_API_KEY").ok();

        for provider in &mut self.providers {
            match provider.kind {
                ProviderKind::Google => {
                    if provider.api_key.is_none() {
                        provider.api_key = google_key.clone();
                    }
                    if provider.cse_id.is_none() {
                        provider.cse_id = google_cse.clone();
                    }
                }
                ProviderKind::Serper if provider.api_key.is_none() => {
                    provider.api_key = serper_key.clone();
                }
                ProviderKind::Exa if provider.api_key.is_none() => {
                    provider.api_key = exa_key.clone();
                }
                _ => {}
            }
        }
    }

    /// Get provider settings by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Get all providers that are enabled and have the credentials they need
    pub fn enabled_providers(&self) -> Vec<&ProviderSettings> {
        self.providers.iter().filter(|p| p.is_usable()).collect()
    }
}

/// Search behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Cache time-to-live in seconds
    pub cache_ttl: u64,
    /// Maximum number of cached queries
    pub cache_capacity: u64,
    /// Result count used when the caller does not specify one
    pub default_max_results: usize,
    /// Locale used for query enhancement and provider parameters
    pub locale: LocaleSettings,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            cache_ttl: 3600,
            cache_capacity: 10_000,
            default_max_results: 10,
            locale: LocaleSettings::default(),
        }
    }
}

/// Locale hints appended to queries and passed to providers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleSettings {
    /// Country name appended to semantic and keyword queries
    pub country: String,
    /// Lowercase terms that count as the country already being mentioned
    pub country_aliases: Vec<String>,
    /// Interface language code (e.g. "pt")
    pub language: String,
    /// Region / country code (e.g. "br")
    pub region: String,
    /// Domains preferred by the semantic provider
    pub preferred_domains: Vec<String>,
    /// Earliest publication date requested from the semantic provider
    pub start_published_date: Option<String>,
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self {
            country: "Brasil".to_string(),
            country_aliases: vec![
                "brasil".to_string(),
                "brasileiro".to_string(),
                "brasileira".to_string(),
                "brazil".to_string(),
            ],
            language: "pt".to_string(),
            region: "br".to_string(),
            preferred_domains: vec![
                "g1.globo.com".to_string(),
                "exame.com".to_string(),
                "valor.globo.com".to_string(),
                "estadao.com.br".to_string(),
                "folha.uol.com.br".to_string(),
                "canaltech.com.br".to_string(),
                "infomoney.com.br".to_string(),
            ],
            start_published_date: Some("2023-01-01".to_string()),
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Pool max idle connections per host
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy for all outgoing requests
    pub proxy: Option<String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 15.0,
            pool_maxsize: 20,
            verify_ssl: true,
            proxy: None,
        }
    }
}

/// Which implementation backs a configured provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Serper,
    #[default]
    Bing,
    DuckDuckGo,
    Exa,
}

impl ProviderKind {
    /// Whether this provider cannot work without an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Google | Self::Serper | Self::Exa)
    }
}

/// Individual provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Provider name (unique identifier)
    pub name: String,
    /// Implementation to use
    pub kind: ProviderKind,
    /// Whether the operator enabled this provider
    pub enabled: bool,
    /// Lower is tried first
    pub priority: u32,
    /// Errors tolerated before the provider is excluded
    pub max_errors: u32,
    /// API key if required
    pub api_key: Option<String>,
    /// Google custom search engine id
    pub cse_id: Option<String>,
    /// Override for the provider endpoint
    pub base_url: Option<String>,
    /// Request timeout in seconds
    pub timeout: Option<f64>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: ProviderKind::default(),
            enabled: true,
            priority: 10,
            max_errors: 3,
            api_key: None,
            cse_id: None,
            base_url: None,
            timeout: None,
        }
    }
}

impl ProviderSettings {
    /// Enabled and carrying the credentials its kind needs
    pub fn is_usable(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let has_key = self.api_key.as_deref().is_some_and(|k| !k.is_empty());
        match self.kind {
            ProviderKind::Google => {
                has_key && self.cse_id.as_deref().is_some_and(|c| !c.is_empty())
            }
            kind if kind.requires_api_key() => has_key,
            _ => true,
        }
    }

    /// Request timeout, `default_secs` when unset. Negative or NaN values are rejected.
    pub fn request_timeout(&self, default_secs: f64) -> Result<Duration> {
        let secs = self.timeout.unwrap_or(default_secs);
        Duration::try_from_secs_f64(secs).map_err(|e| {
            anyhow::anyhow!("invalid timeout {} for provider {}: {}", secs, self.name, e)
        })
    }
}

/// Dual-channel coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Provider serving the semantic (conceptual) channel
    pub semantic_provider: String,
    /// Provider serving the keyword (literal) channel
    pub keyword_provider: String,
    pub semantic_max_results: usize,
    pub keyword_max_results: usize,
    pub residual_max_results: usize,
    /// Context key holding the market segment / domain
    pub domain_key: String,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            semantic_provider: "exa".to_string(),
            keyword_provider: "google".to_string(),
            semantic_max_results: 15,
            keyword_max_results: 15,
            residual_max_results: 10,
            domain_key: "segment".to_string(),
        }
    }
}

/// Pipeline executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Timeout in seconds applied to components registered without one
    pub default_timeout: u64,
    /// Stop the run as soon as a required component fails
    pub abort_on_required_failure: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_timeout: 300,
            abort_on_required_failure: false,
        }
    }
}

/// Persistence of intermediate stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveSettings {
    pub enabled: bool,
    /// Root directory for saved stages
    pub directory: PathBuf,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("analyses_data"),
        }
    }
}

/// Default provider stack, most capable first
fn default_providers() -> Vec<ProviderSettings> {
    vec![
        ProviderSettings {
            name: "exa".to_string(),
            kind: ProviderKind::Exa,
            priority: 1,
            max_errors: 3,
            ..Default::default()
        },
        ProviderSettings {
            name: "google".to_string(),
            kind: ProviderKind::Google,
            priority: 2,
            max_errors: 3,
            ..Default::default()
        },
        ProviderSettings {
            name: "serper".to_string(),
            kind: ProviderKind::Serper,
            priority: 3,
            max_errors: 3,
            ..Default::default()
        },
        ProviderSettings {
            name: "bing".to_string(),
            kind: ProviderKind::Bing,
            priority: 4,
            max_errors: 5,
            ..Default::default()
        },
        ProviderSettings {
            name: "duckduckgo".to_string(),
            kind: ProviderKind::DuckDuckGo,
            priority: 5,
            max_errors: 5,
            ..Default::default()
        },
    ]
}
