use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};

use crate::common::{DomainError, DomainResult};
use crate::config::PostgresConfig;
use crate::domains::path_planning::{Obstacle, Plan, PlanStore, Wall, WallSource};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS walls (
        id TEXT PRIMARY KEY,
        width DOUBLE PRECISION NOT NULL,
        height DOUBLE PRECISION NOT NULL,
        obstacles JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS plans (
        id TEXT PRIMARY KEY,
        wall_id TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        algorithm TEXT NOT NULL,
        path_json JSONB NOT NULL,
        metrics_json JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE INDEX IF NOT EXISTS idx_plans_wall_id ON plans(wall_id);
"#;

fn infra<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> DomainError + '_ {
    move |e| DomainError::InfrastructureError(format!("{}: {}", context, e))
}

/// Creates a connection pool and makes sure the `walls` and `plans` tables exist.
pub async fn connect(config: &PostgresConfig) -> DomainResult<Pool> {
    let mut pg_config = Config::new();
    pg_config.host = Some(config.host.clone());
    pg_config.port = Some(config.port);
    pg_config.dbname = Some(config.database.clone());
    pg_config.user = Some(config.username.clone());
    pg_config.password = Some(config.password.clone());
    pg_config.pool = Some(PoolConfig::new(config.max_connections));

    let pool = pg_config
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(infra("Failed to create PostgreSQL pool"))?;

    initialize_schema(&pool).await?;
    info!(host = %config.host, database = %config.database, "postgres schema ready");
    Ok(pool)
}

pub async fn initialize_schema(pool: &Pool) -> DomainResult<()> {
    let client = pool.get().await.map_err(infra("Failed to get database connection"))?;
    client
        .batch_execute(SCHEMA)
        .await
        .map_err(infra("Failed to initialize database schema"))
}

#[derive(Clone)]
pub struct PostgresPlanStore {
    pool: Pool,
}

impl PostgresPlanStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PostgresPlanStore {
    async fn save(&self, plan: &Plan) -> DomainResult<()> {
        let client = self.pool.get().await.map_err(infra("Failed to get database connection"))?;

        let path_json = serde_json::to_value(&plan.path)?;
        let metrics_json = serde_json::to_value(plan.metrics)?;

        let inserted = client
            .execute(
                "INSERT INTO plans (id, wall_id, fingerprint, algorithm, path_json, metrics_json, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (id) DO NOTHING",
                &[
                    &plan.id,
                    &plan.wall_id,
                    &plan.fingerprint,
                    &plan.algorithm,
                    &path_json,
                    &metrics_json,
                    &plan.created_at,
                ],
            )
            .await
            .map_err(infra("Failed to save plan"))?;

        debug!(plan_id = %plan.id, inserted, "plan saved");
        Ok(())
    }

    async fn load(&self, plan_id: &str) -> DomainResult<Option<Plan>> {
        let client = self.pool.get().await.map_err(infra("Failed to get database connection"))?;

        let row = client
            .query_opt(
                "SELECT id, wall_id, fingerprint, algorithm, path_json, metrics_json, created_at
                 FROM plans WHERE id = $1",
                &[&plan_id],
            )
            .await
            .map_err(infra("Failed to load plan"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let path_json: serde_json::Value = row.get(4);
        let metrics_json: serde_json::Value = row.get(5);
        Ok(Some(Plan {
            id: row.get(0),
            wall_id: row.get(1),
            fingerprint: row.get(2),
            algorithm: row.get(3),
            path: serde_json::from_value(path_json)?,
            metrics: serde_json::from_value(metrics_json)?,
            created_at: row.get(6),
        }))
    }
}

#[derive(Clone)]
pub struct PostgresWallSource {
    pool: Pool,
}

impl PostgresWallSource {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a wall. Registration proper lives outside this
    /// service; this is used for seeding.
    pub async fn upsert_wall(&self, wall: &Wall) -> DomainResult<()> {
        let client = self.pool.get().await.map_err(infra("Failed to get database connection"))?;
        let obstacles = serde_json::to_value(&wall.obstacles)?;

        client
            .execute(
                "INSERT INTO walls (id, width, height, obstacles, created_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (id) DO UPDATE SET
                 width = EXCLUDED.width,
                 height = EXCLUDED.height,
                 obstacles = EXCLUDED.obstacles",
                &[&wall.id, &wall.width, &wall.height, &obstacles, &wall.created_at],
            )
            .await
            .map_err(infra("Failed to save wall"))?;
        Ok(())
    }
}

#[async_trait]
impl WallSource for PostgresWallSource {
    async fn get_wall(&self, wall_id: &str) -> DomainResult<Option<Wall>> {
        let client = self.pool.get().await.map_err(infra("Failed to get database connection"))?;

        let row = client
            .query_opt(
                "SELECT id, width, height, obstacles, created_at FROM walls WHERE id = $1",
                &[&wall_id],
            )
            .await
            .map_err(infra("Failed to load wall"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let obstacles: serde_json::Value = row.get(3);
        let obstacles: Vec<Obstacle> = serde_json::from_value(obstacles)?;
        Ok(Some(Wall {
            id: row.get(0),
            width: row.get(1),
            height: row.get(2),
            obstacles,
            created_at: row.get(4),
        }))
    }
}
