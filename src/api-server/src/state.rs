use crate::config::Settings;
use crate::cors::{InMemorySharedOriginSet, OriginCache, RedisOriginSet, SharedOriginSet};
use crate::gate::AuthorizationGate;
use crate::server::ServerConfig;
use crate::stores::PostgresOrganizationStore;
use anyhow::Context;
use monkeys_authn::{
    AuthService, RedisRevocationStore, SystemOrgResolver, TenantResolver, TokenValidator,
};
use monkeys_authz::policy::PostgresPolicyStore;
use monkeys_authz::{Authorizer, InMemoryPolicyStore, PolicyStore};
use monkeys_core::{InMemoryOrganizationStore, OrganizationStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Policy evaluation
    pub authorizer: Arc<Authorizer>,

    /// Credential validation and tenant resolution
    pub auth: Arc<AuthService>,

    pub gate: AuthorizationGate,

    /// Allowed cross-origin callers
    pub origins: OriginCache,

    pub organizations: Arc<dyn OrganizationStore>,

    pub trust_proxy: bool,

    pub request_timeout: Duration,

    /// Server start time for uptime calculation
    pub start_time: Instant,

    pub version: String,
}

impl AppState {
    pub fn new(
        authorizer: Arc<Authorizer>,
        auth: Arc<AuthService>,
        origins: OriginCache,
        organizations: Arc<dyn OrganizationStore>,
        server: &ServerConfig,
    ) -> Self {
        Self {
            gate: AuthorizationGate::new(authorizer.clone()),
            authorizer,
            auth,
            origins,
            organizations,
            trust_proxy: server.trust_proxy,
            request_timeout: server.request_timeout,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Wire every component from configuration
    ///
    /// Without a database URL the stores are in-memory; without a Redis URL
    /// revocation is not checked and the origin set is process-local.
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let keys = settings
            .auth
            .signing_keys()
            .context("Token verification keys")?;
        let mut validator = TokenValidator::new(keys, settings.auth.validator.clone())?;

        let (organizations, policies): (Arc<dyn OrganizationStore>, Arc<dyn PolicyStore>) =
            match &settings.database_url {
                Some(url) => {
                    let organizations = PostgresOrganizationStore::new(url)
                        .await
                        .context("Failed to connect to PostgreSQL")?;
                    let policies = PostgresPolicyStore::from_pool(organizations.pool().clone());
                    info!("Using PostgreSQL stores");
                    (Arc::new(organizations), Arc::new(policies))
                }
                None => {
                    warn!("No database configured, using in-memory stores");
                    (
                        Arc::new(InMemoryOrganizationStore::new()),
                        Arc::new(InMemoryPolicyStore::new()),
                    )
                }
            };

        let shared: Arc<dyn SharedOriginSet> = match &settings.redis_url {
            Some(url) => {
                let revocation = RedisRevocationStore::new(url, settings.auth.revocation_prefix.clone())?;
                validator = validator.with_revocation_store(Arc::new(revocation));
                info!("Using Redis for revocation and origin sharing");
                Arc::new(RedisOriginSet::new(url, settings.origins.redis_key.clone())?)
            }
            None => {
                warn!("No Redis configured, session revocation is not checked");
                Arc::new(InMemorySharedOriginSet::new())
            }
        };

        let system_org = Arc::new(SystemOrgResolver::new(
            organizations.clone(),
            settings.system_org.clone(),
        ));
        let auth = AuthService::new(validator, TenantResolver::new(system_org))
            .with_cookie_name(settings.auth.cookie_name.clone());
        let authorizer = Arc::new(Authorizer::new(settings.authorizer.clone(), policies));
        let origins = OriginCache::new(settings.origins.clone(), organizations.clone(), shared);

        Ok(Self::new(
            authorizer,
            Arc::new(auth),
            origins,
            organizations,
            &settings.server,
        ))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
