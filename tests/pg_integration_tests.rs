#[cfg(feature = "pg_integration")]
use wallpath::adapters::outbound::{connect, PostgresPlanStore, PostgresWallSource};
#[cfg(feature = "pg_integration")]
use wallpath::config::PostgresConfig;
#[cfg(feature = "pg_integration")]
use wallpath::domains::path_planning::*;
#[cfg(all(feature = "pg_integration", feature = "use_testcontainers"))]
use testcontainers::runners::AsyncRunner;
#[cfg(all(feature = "pg_integration", feature = "use_testcontainers"))]
use testcontainers_modules::postgres::Postgres;

#[cfg(feature = "pg_integration")]
fn pg_config(port: u16) -> PostgresConfig {
    PostgresConfig {
        host: "127.0.0.1".to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_connections: 4,
    }
}

#[cfg(feature = "pg_integration")]
async fn connect_with_retry(config: &PostgresConfig) -> Result<deadpool_postgres::Pool, Box<dyn std::error::Error>> {
    let mut last_error = None;
    for _ in 0..10 {
        match connect(config).await {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                last_error = Some(e);
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
        }
    }
    Err(format!("Postgres did not become ready: {:?}", last_error).into())
}

#[cfg(feature = "pg_integration")]
#[tokio::test]
async fn test_postgres_plan_store_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    // With use_testcontainers a throwaway Postgres is started in-process;
    // otherwise an external instance on PG_TEST_PORT (default 5433) is used.
    #[cfg(feature = "use_testcontainers")]
    let (_node, port) = {
        let node = Postgres::default().start().await?;
        let port = node.get_host_port_ipv4(5432).await?;
        (node, port)
    };
    #[cfg(not(feature = "use_testcontainers"))]
    let port = std::env::var("PG_TEST_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(5433u16);

    let pool = connect_with_retry(&pg_config(port)).await?;
    let walls = PostgresWallSource::new(pool.clone());
    let store = PostgresPlanStore::new(pool);

    let wall = Wall::new(
        format!("pg-wall-{}", uuid::Uuid::new_v4()),
        10.0,
        10.0,
        vec![Obstacle::circle(5.0, 5.0, 1.0), Obstacle::rectangle(1.0, 6.0, 2.0, 1.0)],
    );
    walls.upsert_wall(&wall).await?;
    let loaded_wall = walls.get_wall(&wall.id).await?.ok_or("wall missing")?;
    assert_eq!(loaded_wall.obstacles, wall.obstacles);
    assert!(walls.get_wall("pg-no-such-wall").await?.is_none());

    let grid = rasterize(&loaded_wall, 10)?;
    let spec = AlgorithmSpec::astar(Connectivity::Eight);
    let start = GridCell::new(0, 0);
    let goal = GridCell::new(9, 9);
    let result = search(&grid, start, goal, spec)?;
    let key = fingerprint(&grid, start, goal, &spec);
    let plan = Plan::new(
        plan_id_for(&key),
        wall.id.clone(),
        key.to_string(),
        spec.identifier(),
        result.path,
        result.metrics,
    );

    store.save(&plan).await?;
    store.save(&plan).await?;
    let loaded = store.load(&plan.id).await?.ok_or("plan missing")?;
    assert_eq!(loaded, plan);
    assert!(store.load("pg-no-such-plan").await?.is_none());

    Ok(())
}
