//! Provider registry: priorities, error counters and availability

use super::traits::{SearchOptions, SearchProvider};
use crate::results::SearchResponse;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scheduling metadata for a registered provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub enabled: bool,
    /// Lower is tried first
    pub priority: u32,
    /// Errors tolerated before the provider is excluded
    pub max_errors: u32,
}

impl ProviderConfig {
    pub fn new(priority: u32, max_errors: u32) -> Self {
        Self {
            enabled: true,
            priority,
            max_errors,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(10, 3)
    }
}

/// Point-in-time view of one provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderStatus {
    pub name: String,
    pub enabled: bool,
    pub available: bool,
    pub priority: u32,
    pub error_count: u32,
    pub max_errors: u32,
}

struct ProviderEntry {
    provider: Arc<dyn SearchProvider>,
    priority: u32,
    max_errors: u32,
    enabled: AtomicBool,
    error_count: AtomicU32,
}

impl ProviderEntry {
    fn is_available(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
            && self.error_count.load(Ordering::Acquire) < self.max_errors
    }
}

/// Registry of configured search providers.
///
/// Error counters are shared by every caller holding the registry. They only grow;
/// success never lowers them and only [`ProviderRegistry::reset_errors`] clears them.
pub struct ProviderRegistry {
    /// Entries in registration order
    entries: Vec<ProviderEntry>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a provider, replacing any provider with the same name in place
    pub fn register(&mut self, provider: Arc<dyn SearchProvider>, config: ProviderConfig) {
        let entry = ProviderEntry {
            priority: config.priority,
            max_errors: config.max_errors,
            enabled: AtomicBool::new(config.enabled),
            error_count: AtomicU32::new(0),
            provider,
        };

        let name = entry.provider.name().to_string();
        match self.entries.iter_mut().find(|e| e.provider.name() == name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        debug!("Registered provider {}", name);
    }

    fn entry(&self, name: &str) -> Option<&ProviderEntry> {
        self.entries.iter().find(|e| e.provider.name() == name)
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn SearchProvider>> {
        self.entry(name).map(|e| &e.provider)
    }

    /// Enabled and below its error threshold. Unknown names are unavailable.
    pub fn is_available(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|e| e.is_available())
    }

    /// Record a provider failure and return the new error count.
    ///
    /// The increment and the threshold comparison use the value returned by a single
    /// `fetch_add`, so concurrent failures can never leave a provider re-enabled.
    pub fn record_error(&self, name: &str) -> Option<u32> {
        let entry = self.entry(name)?;
        let count = entry.error_count.fetch_add(1, Ordering::AcqRel).saturating_add(1);

        if count == entry.max_errors {
            warn!(
                "Provider {} disabled after {} errors, reset required",
                name, count
            );
        } else {
            debug!("Provider {} error count now {}", name, count);
        }
        Some(count)
    }

    /// Current error count of a provider
    pub fn error_count(&self, name: &str) -> Option<u32> {
        self.entry(name)
            .map(|e| e.error_count.load(Ordering::Acquire))
    }

    /// Reset error counters of one provider, or all when `name` is `None`
    pub fn reset_errors(&self, name: Option<&str>) {
        match name {
            Some(name) => {
                if let Some(entry) = self.entry(name) {
                    entry.error_count.store(0, Ordering::Release);
                    info!("Reset errors for provider {}", name);
                }
            }
            None => {
                for entry in &self.entries {
                    entry.error_count.store(0, Ordering::Release);
                }
                info!("Reset errors for all providers");
            }
        }
    }

    /// Operator switch for a provider
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.entry(name) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::Release);
                info!("Provider {} enabled = {}", name, enabled);
                true
            }
            None => false,
        }
    }

    /// Available providers sorted by (priority, error count).
    ///
    /// The sort is stable, so full ties keep registration order.
    pub fn ordered_available_providers(&self) -> Vec<Arc<dyn SearchProvider>> {
        let mut available: Vec<(u32, u32, &ProviderEntry)> = self
            .entries
            .iter()
            .filter(|e| e.is_available())
            .map(|e| (e.priority, e.error_count.load(Ordering::Acquire), e))
            .collect();

        available.sort_by_key(|(priority, errors, _)| (*priority, *errors));

        available
            .into_iter()
            .map(|(_, _, e)| Arc::clone(&e.provider))
            .collect()
    }

    /// Status of every registered provider, in registration order
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.entries
            .iter()
            .map(|e| ProviderStatus {
                name: e.provider.name().to_string(),
                enabled: e.enabled.load(Ordering::Acquire),
                available: e.is_available(),
                priority: e.priority,
                error_count: e.error_count.load(Ordering::Acquire),
                max_errors: e.max_errors,
            })
            .collect()
    }

    /// Call one provider directly, counting a failure against it.
    ///
    /// Never returns an error: failures become a failed [`SearchResponse`].
    pub async fn search(
        &self,
        name: &str,
        query: &str,
        max_results: usize,
        options: &SearchOptions,
    ) -> SearchResponse {
        let Some(provider) = self.get(name) else {
            return SearchResponse::failed(name, query, "unknown provider");
        };

        match provider.search(query, max_results, options).await {
            Ok(results) => {
                if results.is_empty() {
                    warn!("{}: 0 results for '{}'", name, query);
                }
                SearchResponse::ok(name, query, results)
            }
            Err(e) => {
                warn!("Provider {} failed: {}", name, e);
                self.record_error(name);
                SearchResponse::failed(name, query, e.to_string())
            }
        }
    }

    /// Probe a provider with a test query without touching its error counter
    pub async fn test_provider(&self, name: &str, query: &str, max_results: usize) -> bool {
        let Some(provider) = self.get(name) else {
            return false;
        };

        match provider
            .search(query, max_results, &SearchOptions::default())
            .await
        {
            Ok(results) => !results.is_empty(),
            Err(e) => {
                warn!("Provider test for {} failed: {}", name, e);
                false
            }
        }
    }

    /// Get all provider names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.provider.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Get number of registered providers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
