//! Provider loader for building the registry from configuration

use super::registry::{ProviderConfig, ProviderRegistry};
use super::traits::SearchProvider;
use super::{bing, duckduckgo, exa, google, serper};
use crate::config::{ProviderKind, ProviderSettings, Settings};
use crate::network::HttpClient;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Loader for initializing providers from configuration
pub struct ProviderLoader;

impl ProviderLoader {
    /// Build a registry holding every usable provider in `settings`
    pub fn load(settings: &Settings, client: &HttpClient) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();

        for provider_settings in &settings.providers {
            if !provider_settings.is_usable() {
                info!(
                    "Skipping provider {} (disabled or missing credentials)",
                    provider_settings.name
                );
                continue;
            }

            match Self::create_provider(provider_settings, client.clone()) {
                Ok(provider) => {
                    info!(
                        "Loaded provider: {} ({:?}, priority {})",
                        provider_settings.name, provider_settings.kind, provider_settings.priority
                    );
                    registry.register(
                        provider,
                        ProviderConfig::new(
                            provider_settings.priority,
                            provider_settings.max_errors,
                        ),
                    );
                }
                Err(e) => {
                    warn!("Failed to load provider {}: {}", provider_settings.name, e);
                }
            }
        }

        info!("Loaded {} providers", registry.len());
        registry
    }

    /// Create a provider instance for its configured kind
    fn create_provider(
        settings: &ProviderSettings,
        client: HttpClient,
    ) -> Result<Arc<dyn SearchProvider>> {
        let provider: Arc<dyn SearchProvider> = match settings.kind {
            ProviderKind::Google => Arc::new(google::GoogleCustomSearch::new(settings, client)?),
            ProviderKind::Serper => Arc::new(serper::Serper::new(settings, client)?),
            ProviderKind::Exa => Arc::new(exa::Exa::new(settings, client)?),
            ProviderKind::Bing => Arc::new(bing::Bing::new(settings, client)?),
            ProviderKind::DuckDuckGo => Arc::new(duckduckgo::DuckDuckGo::new(settings, client)?),
        };
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults_without_credentials() {
        let settings = Settings::default();
        let registry = ProviderLoader::load(&settings, &HttpClient::new().unwrap());

        assert_eq!(registry.names(), vec!["bing", "duckduckgo"]);
        assert!(!registry.is_available("exa"));
        assert!(registry.is_available("bing"));
    }

    #[test]
    fn test_load_with_credentials() {
        let mut settings = Settings::default();
        for provider in &mut settings.providers {
            provider.api_key = Some("key".to_string());
            provider.cse_id = Some("cx".to_string());
        }
        let registry = ProviderLoader::load(&settings, &HttpClient::new().unwrap());

        let ordered: Vec<String> = registry
            .ordered_available_providers()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(ordered, vec!["exa", "google", "serper", "bing", "duckduckgo"]);
    }

    #[test]
    fn test_invalid_timeout_skips_provider() {
        let mut settings = Settings::default();
        for provider in &mut settings.providers {
            if provider.name == "bing" {
                provider.timeout = Some(-5.0);
            }
        }
        let registry = ProviderLoader::load(&settings, &HttpClient::new().unwrap());

        assert_eq!(registry.names(), vec!["duckduckgo"]);
    }
}
