//! Authorization engine
//!
//! Loads a principal's effective policy set (through the effective-policy
//! cache when enabled), runs the deny-override evaluator and records
//! metrics.
//!
//! ```text
//! AuthorizeRequest → [PolicySetCache] → PolicyStore → evaluate_documents → Decision
//!                                                                        ↓
//!                                                                   [Metrics]
//! ```

pub mod cache;
pub mod evaluator;
pub mod metrics;

pub use cache::{CacheStats, PolicyCacheConfig, PolicySetCache};
pub use evaluator::{
    evaluate, evaluate_documents, evaluate_json, evaluate_value, explain, Evaluation,
    MatchedStatement,
};
pub use metrics::{EngineMetrics, MetricsCollector};

use crate::error::Result;
use crate::policy::{PolicyDocument, PolicyStore};
use crate::simulation::{self, SimulationCase, SimulationResult};
use crate::types::{AuthorizeRequest, Decision, Principal};
use monkeys_core::{with_timeout, CoreError};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Authorizer configuration
#[derive(Debug, Clone)]
pub struct AuthorizerConfig {
    /// Effective-policy cache configuration
    pub policy_cache: PolicyCacheConfig,

    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Deadline for a single policy store call
    pub store_timeout: Duration,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            policy_cache: PolicyCacheConfig::default(),
            enable_metrics: true,
            store_timeout: Duration::from_secs(2),
        }
    }
}

/// Entry point for live authorization checks
pub struct Authorizer {
    /// Policy storage backend
    policy_store: Arc<dyn PolicyStore>,

    /// Effective-policy cache
    cache: Option<PolicySetCache>,

    /// Metrics collector
    metrics: Option<Arc<MetricsCollector>>,

    config: AuthorizerConfig,
}

impl Authorizer {
    pub fn new(config: AuthorizerConfig, policy_store: Arc<dyn PolicyStore>) -> Self {
        let cache = if config.policy_cache.enabled {
            Some(PolicySetCache::new(config.policy_cache.clone()))
        } else {
            None
        };

        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        info!(
            policy_cache = config.policy_cache.enabled,
            metrics = config.enable_metrics,
            "Authorizer initialized"
        );

        Self {
            policy_store,
            cache,
            metrics,
            config,
        }
    }

    /// Decide whether the principal may perform the action on the resource
    ///
    /// Store failures and malformed stored policies are errors. Callers
    /// must treat any error as a failed check, never as `Allow`.
    #[instrument(
        skip(self, request),
        fields(
            principal = %request.principal.id,
            org = %request.principal.org_id,
            action = %request.action,
            resource = %request.resource
        )
    )]
    pub async fn authorize(&self, request: &AuthorizeRequest) -> Result<Decision> {
        let start = Instant::now();

        let documents = match self.effective_policies(&request.principal).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!(error = %e, "Failed to load effective policies");
                if let Some(metrics) = &self.metrics {
                    metrics.record_error().await;
                }
                return Err(e);
            }
        };

        let decision = evaluate_documents(
            &documents,
            &request.action,
            &request.resource,
            &request.context,
        );

        debug!(
            %decision,
            documents = documents.len(),
            "Authorization decision"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_latency(start.elapsed()).await;
            metrics.record_decision(decision).await;
        }

        Ok(decision)
    }

    /// Effective policy set for a principal, bounded by the store timeout
    pub async fn effective_policies(&self, principal: &Principal) -> Result<Arc<Vec<PolicyDocument>>> {
        if let Some(cache) = &self.cache {
            if let Some(documents) = cache.get(principal) {
                if let Some(metrics) = &self.metrics {
                    metrics.record_cache_hit().await;
                }
                return Ok(documents);
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_miss().await;
            }
        }

        let fetch = self.policy_store.get_effective_policies(principal);
        let documents = Arc::new(
            with_timeout(self.config.store_timeout, "get_effective_policies", async {
                Ok::<_, CoreError>(fetch.await)
            })
            .await??,
        );

        if let Some(cache) = &self.cache {
            cache.put(principal, Arc::clone(&documents));
        }

        Ok(documents)
    }

    /// Fetch a document owned by `org_id`, bounded by the store timeout
    pub async fn policy_document(&self, org_id: &str, policy_id: &str) -> Result<PolicyDocument> {
        let fetch = self.policy_store.get_policy_document(org_id, policy_id);
        with_timeout(self.config.store_timeout, "get_policy_document", async {
            Ok::<_, CoreError>(fetch.await)
        })
        .await?
    }

    /// Run test cases against a candidate document
    pub fn simulate(&self, document: &PolicyDocument, cases: &[SimulationCase]) -> Vec<SimulationResult> {
        simulation::simulate(document, cases)
    }

    /// Run test cases against a stored document
    pub async fn simulate_stored(
        &self,
        org_id: &str,
        policy_id: &str,
        cases: &[SimulationCase],
    ) -> Result<Vec<SimulationResult>> {
        let document = self.policy_document(org_id, policy_id).await?;
        Ok(simulation::simulate(&document, cases))
    }

    /// Drop a principal's cached policy set after an attachment change
    pub fn invalidate_principal(&self, principal_id: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate_principal(principal_id);
            debug!(principal_id, "Policy cache entry invalidated");
        }
    }

    /// Invalidate the whole cache on policy document updates
    pub fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
            info!("Policy cache invalidated");
        }
    }

    /// Get engine metrics
    pub async fn get_metrics(&self) -> Option<EngineMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    /// Prometheus text export, empty when metrics are disabled
    pub async fn export_prometheus(&self) -> String {
        match &self.metrics {
            Some(metrics) => metrics.export_prometheus().await,
            None => String::new(),
        }
    }

    /// Get cache statistics
    pub fn get_cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }
}
