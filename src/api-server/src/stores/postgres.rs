//! PostgreSQL organization store
//!
//! Reads `organizations(id, slug, allowed_origins text[])`.

use async_trait::async_trait;
use monkeys_core::{CoreError, OrgId, OrganizationStore, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

pub struct PostgresOrganizationStore {
    pool: PgPool,
}

impl PostgresOrganizationStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| CoreError::database(format!("Failed to connect to database: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(operation: &str, e: sqlx::Error) -> CoreError {
    CoreError::database(format!("{}: {}", operation, e))
}

#[async_trait]
impl OrganizationStore for PostgresOrganizationStore {
    async fn get_organization_origins(&self, org_id: &str) -> Result<Vec<String>> {
        let row = sqlx::query("SELECT allowed_origins FROM organizations WHERE id::text = $1")
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("get organization origins", e))?;

        match row {
            Some(row) => {
                let origins: Option<Vec<String>> = row
                    .try_get("allowed_origins")
                    .map_err(|e| db_error("decode allowed_origins", e))?;
                Ok(origins.unwrap_or_default())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn list_all_organization_origins(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT unnest(allowed_origins) AS origin FROM organizations WHERE allowed_origins IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list organization origins", e))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("origin").map_err(|e| db_error("decode origin", e)))
            .collect()
    }

    async fn resolve_org_id_by_slug(&self, slug: &str) -> Result<OrgId> {
        let row = sqlx::query("SELECT id::text AS id FROM organizations WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("resolve organization slug", e))?;

        match row {
            Some(row) => row.try_get("id").map_err(|e| db_error("decode organization id", e)),
            None => Err(CoreError::not_found(format!("organization with slug '{}'", slug))),
        }
    }

    async fn update_organization_origins(&self, org_id: &str, origins: Vec<String>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE organizations SET allowed_origins = $2, updated_at = NOW() WHERE id::text = $1",
        )
        .bind(org_id)
        .bind(&origins)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update organization origins", e))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("organization '{}'", org_id)));
        }
        Ok(())
    }
}

impl std::fmt::Debug for PostgresOrganizationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresOrganizationStore").finish_non_exhaustive()
    }
}
