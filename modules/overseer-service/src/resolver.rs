//! Price resolution across an ordered chain of sources.
//!
//! The configured provider is tried first, then every other registered source
//! in registration order. Any failure of the primary (geo-restriction or
//! otherwise) falls through to the next source within the same call. Adding a
//! fallback is a matter of registering another `PriceSource`.

use crate::log_gate::{ErrorLogGate, CONFIG_ERROR};
use crate::price_source::{PriceError, PriceSource, TRANSIENT_KINDS};
use crate::registry::HealthRegistry;
use overseer_types::{HealthStatus, PriceQuote};
use std::sync::Arc;

const RESOLVER_SERVICE: &str = "resolver";

pub struct PriceResolver {
    sources: Vec<Arc<dyn PriceSource>>,
    health: Arc<HealthRegistry>,
    log_gate: Arc<ErrorLogGate>,
}

impl PriceResolver {
    pub fn new(
        sources: Vec<Arc<dyn PriceSource>>,
        health: Arc<HealthRegistry>,
        log_gate: Arc<ErrorLogGate>,
    ) -> Self {
        Self {
            sources,
            health,
            log_gate,
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Named provider first, the rest in registration order
    fn chain_for(&self, provider: &str) -> Vec<&Arc<dyn PriceSource>> {
        let mut chain: Vec<&Arc<dyn PriceSource>> =
            self.sources.iter().filter(|s| s.name() == provider).collect();
        chain.extend(self.sources.iter().filter(|s| s.name() != provider));
        chain
    }

    /// Resolve one quote. The returned quote's `source` names whichever
    /// source actually answered.
    pub async fn resolve(&self, symbol: &str, provider: &str) -> Result<PriceQuote, PriceError> {
        if !self.sources.iter().any(|s| s.name() == provider)
            && self
                .log_gate
                .should_log(&format!("{}:{}", RESOLVER_SERVICE, provider), CONFIG_ERROR)
        {
            log::error!(
                "[RESOLVER] Unknown price provider '{}' for {}, using fallbacks only",
                provider,
                symbol
            );
        }

        let mut last_error: Option<PriceError> = None;

        for (attempt, source) in self.chain_for(provider).into_iter().enumerate() {
            match source.fetch_quote(symbol).await {
                Ok(mut quote) => {
                    quote.source = source.name().to_string();
                    self.record_success(source.name(), symbol);
                    if attempt > 0 {
                        log::info!(
                            "[RESOLVER] {} resolved via fallback {} (${:.4})",
                            symbol,
                            source.name(),
                            quote.price
                        );
                    }
                    return Ok(quote);
                }
                Err(e) => {
                    self.record_failure(source.name(), symbol, &e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PriceError::Configuration("no price sources registered".to_string())
        }))
    }

    fn record_success(&self, source: &str, symbol: &str) {
        self.health.update(source, HealthStatus::Healthy, None);
        self.log_gate
            .reset_kinds(&format!("{}:{}", source, symbol), TRANSIENT_KINDS);
    }

    fn record_failure(&self, source: &str, symbol: &str, error: &PriceError) {
        // A missing id mapping says nothing about the provider itself
        if !matches!(error, PriceError::UnsupportedSymbol(_)) {
            self.health
                .update(source, HealthStatus::Unhealthy, Some(&error.to_string()));
        }

        let gate_key = format!("{}:{}", source, symbol);
        if self.log_gate.should_log(&gate_key, error.kind()) {
            if error.is_geo_restricted() {
                log::warn!(
                    "[RESOLVER] {} is geo-restricted for {}: {}",
                    source,
                    symbol,
                    error
                );
            } else {
                log::warn!("[RESOLVER] {} failed for {}: {}", source, symbol, error);
            }
        } else {
            log::debug!("[RESOLVER] {} failed for {} (suppressed): {}", source, symbol, error);
        }
    }
}
