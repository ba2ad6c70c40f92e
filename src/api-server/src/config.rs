//! Server configuration
//!
//! Every option can be given on the command line or through a `MONKEYS_*`
//! environment variable. [`Args::into_settings`] turns the flat argument
//! list into the typed configuration of each component.

use crate::cors::{OriginCacheConfig, DEFAULT_ORIGIN_SET_KEY};
use crate::server::ServerConfig;
use clap::Parser;
use monkeys_authn::{
    AuthError, SigningKeys, SystemOrgConfig, TokenValidatorConfig, DEFAULT_REVOCATION_PREFIX,
    DEFAULT_SYSTEM_ORG_SLUG, DEFAULT_TOKEN_COOKIE,
};
use monkeys_authz::{AuthorizerConfig, PolicyCacheConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Monkeys IAM API Server
#[derive(Parser, Debug, Clone)]
#[command(
    name = "monkeys-server",
    version,
    about = "Authorization core HTTP server for Monkeys IAM",
    long_about = None
)]
pub struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "MONKEYS_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "8080", env = "MONKEYS_PORT")]
    pub port: u16,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", env = "MONKEYS_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// Take the client address from X-Forwarded-For
    #[arg(long, env = "MONKEYS_TRUST_PROXY")]
    pub trust_proxy: bool,

    /// PostgreSQL URL; in-memory stores are used when absent
    #[arg(long, env = "MONKEYS_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Redis URL for revocation and the shared origin set
    #[arg(long, env = "MONKEYS_REDIS_URL")]
    pub redis_url: Option<String>,

    /// HMAC secret for HS256/384/512 tokens
    #[arg(long, env = "MONKEYS_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// PEM file with the RSA public key for RS*/PS* tokens
    #[arg(long, env = "MONKEYS_JWT_RSA_PUBLIC_KEY")]
    pub jwt_rsa_public_key: Option<PathBuf>,

    /// PEM file with the EC public key for ES* tokens
    #[arg(long, env = "MONKEYS_JWT_EC_PUBLIC_KEY")]
    pub jwt_ec_public_key: Option<PathBuf>,

    /// Required token issuer
    #[arg(long, env = "MONKEYS_JWT_ISSUER")]
    pub jwt_issuer: Option<String>,

    /// Required token audience
    #[arg(long, env = "MONKEYS_JWT_AUDIENCE")]
    pub jwt_audience: Option<String>,

    /// Clock skew tolerated on token expiry, in seconds
    #[arg(long, default_value = "0", env = "MONKEYS_JWT_LEEWAY")]
    pub jwt_leeway: u64,

    /// Session cookie consulted when no Authorization header is sent
    #[arg(long, default_value = DEFAULT_TOKEN_COOKIE, env = "MONKEYS_COOKIE_NAME")]
    pub cookie_name: String,

    /// Revocation lookup deadline in milliseconds
    #[arg(long, default_value = "500", env = "MONKEYS_REVOCATION_TIMEOUT_MS")]
    pub revocation_timeout_ms: u64,

    /// Redis key prefix of revoked sessions
    #[arg(long, default_value = DEFAULT_REVOCATION_PREFIX, env = "MONKEYS_REVOCATION_PREFIX")]
    pub revocation_prefix: String,

    /// Origins always allowed (comma separated)
    #[arg(long, value_delimiter = ',', env = "MONKEYS_CORS_ORIGINS")]
    pub cors_origins: Vec<String>,

    /// Allow every origin
    #[arg(long, env = "MONKEYS_CORS_ALLOW_ALL")]
    pub cors_allow_all: bool,

    /// Lifetime of the shared origin set in seconds
    #[arg(long, default_value = "300", env = "MONKEYS_ORIGIN_TTL")]
    pub origin_ttl: u64,

    /// Origin refresh period in seconds
    #[arg(long, default_value = "60", env = "MONKEYS_ORIGIN_REFRESH_INTERVAL")]
    pub origin_refresh_interval: u64,

    /// Shared origin set read deadline in milliseconds
    #[arg(long, default_value = "500", env = "MONKEYS_ORIGIN_READ_TIMEOUT_MS")]
    pub origin_read_timeout_ms: u64,

    /// Origin database refresh deadline in milliseconds
    #[arg(long, default_value = "5000", env = "MONKEYS_ORIGIN_REFRESH_TIMEOUT_MS")]
    pub origin_refresh_timeout_ms: u64,

    /// Redis key of the shared origin set
    #[arg(long, default_value = DEFAULT_ORIGIN_SET_KEY, env = "MONKEYS_ORIGIN_REDIS_KEY")]
    pub origin_redis_key: String,

    /// Slug of the system (root) organization
    #[arg(long, default_value = DEFAULT_SYSTEM_ORG_SLUG, env = "MONKEYS_SYSTEM_ORG_SLUG")]
    pub system_org_slug: String,

    /// Lifetime of the resolved system organization id in seconds
    #[arg(long, default_value = "86400", env = "MONKEYS_SYSTEM_ORG_TTL")]
    pub system_org_ttl: u64,

    /// System organization lookup deadline in milliseconds
    #[arg(long, default_value = "2000", env = "MONKEYS_SYSTEM_ORG_LOOKUP_TIMEOUT_MS")]
    pub system_org_lookup_timeout_ms: u64,

    /// Lifetime of a failed system organization lookup in seconds
    #[arg(long, default_value = "30", env = "MONKEYS_SYSTEM_ORG_NEGATIVE_TTL")]
    pub system_org_negative_ttl: u64,

    /// Disable the effective-policy cache
    #[arg(long, env = "MONKEYS_NO_POLICY_CACHE")]
    pub no_policy_cache: bool,

    /// Effective-policy cache capacity
    #[arg(long, default_value = "10000", env = "MONKEYS_POLICY_CACHE_CAPACITY")]
    pub policy_cache_capacity: usize,

    /// Effective-policy cache TTL in seconds
    #[arg(long, default_value = "60", env = "MONKEYS_POLICY_CACHE_TTL")]
    pub policy_cache_ttl: u64,

    /// Enable JSON logging format
    #[arg(long, env = "MONKEYS_JSON_LOGS")]
    pub json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info", env = "MONKEYS_LOG_LEVEL")]
    pub log_level: String,
}

/// Token verification settings
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub hmac_secret: Option<String>,
    pub rsa_public_key_path: Option<PathBuf>,
    pub ec_public_key_path: Option<PathBuf>,
    pub validator: TokenValidatorConfig,
    pub cookie_name: String,
    pub revocation_prefix: String,
}

impl AuthConfig {
    /// Load every configured verification key
    ///
    /// Fails when no key is configured or a PEM file cannot be read.
    pub fn signing_keys(&self) -> Result<SigningKeys, AuthError> {
        let mut keys = SigningKeys::new();
        if let Some(secret) = &self.hmac_secret {
            keys = keys.with_hmac_secret(secret.as_bytes());
        }
        if let Some(path) = &self.rsa_public_key_path {
            keys = keys.with_rsa_pem(&read_pem(path)?)?;
        }
        if let Some(path) = &self.ec_public_key_path {
            keys = keys.with_ec_pem(&read_pem(path)?)?;
        }
        if keys.is_empty() {
            return Err(AuthError::Configuration(
                "no token signing key configured (MONKEYS_JWT_SECRET, MONKEYS_JWT_RSA_PUBLIC_KEY or MONKEYS_JWT_EC_PUBLIC_KEY)"
                    .to_string(),
            ));
        }
        Ok(keys)
    }
}

fn read_pem(path: &PathBuf) -> Result<Vec<u8>, AuthError> {
    std::fs::read(path)
        .map_err(|e| AuthError::Configuration(format!("cannot read {}: {}", path.display(), e)))
}

/// Typed configuration of every component
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub origins: OriginCacheConfig,
    pub system_org: SystemOrgConfig,
    pub authorizer: AuthorizerConfig,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
}

impl Args {
    pub fn into_settings(self) -> Settings {
        Settings {
            server: ServerConfig {
                host: self.host,
                port: self.port,
                request_timeout: Duration::from_secs(self.request_timeout),
                trust_proxy: self.trust_proxy,
            },
            auth: AuthConfig {
                hmac_secret: self.jwt_secret.filter(|s| !s.is_empty()),
                rsa_public_key_path: self.jwt_rsa_public_key,
                ec_public_key_path: self.jwt_ec_public_key,
                validator: TokenValidatorConfig {
                    issuer: self.jwt_issuer,
                    audience: self.jwt_audience,
                    leeway: Duration::from_secs(self.jwt_leeway),
                    revocation_timeout: Duration::from_millis(self.revocation_timeout_ms),
                },
                cookie_name: self.cookie_name,
                revocation_prefix: self.revocation_prefix,
            },
            origins: OriginCacheConfig {
                static_origins: self.cors_origins,
                allow_all: self.cors_allow_all,
                ttl: Duration::from_secs(self.origin_ttl),
                refresh_interval: Duration::from_secs(self.origin_refresh_interval.max(1)),
                read_timeout: Duration::from_millis(self.origin_read_timeout_ms),
                refresh_timeout: Duration::from_millis(self.origin_refresh_timeout_ms),
                redis_key: self.origin_redis_key,
                ..Default::default()
            },
            system_org: SystemOrgConfig {
                slug: self.system_org_slug,
                ttl: Duration::from_secs(self.system_org_ttl),
                lookup_timeout: Duration::from_millis(self.system_org_lookup_timeout_ms),
                negative_ttl: Duration::from_secs(self.system_org_negative_ttl),
            },
            authorizer: AuthorizerConfig {
                policy_cache: PolicyCacheConfig {
                    enabled: !self.no_policy_cache,
                    capacity: self.policy_cache_capacity,
                    ttl: Duration::from_secs(self.policy_cache_ttl),
                },
                ..Default::default()
            },
            database_url: self.database_url,
            redis_url: self.redis_url,
        }
    }
}
