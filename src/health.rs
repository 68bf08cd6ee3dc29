use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::sources::SourceClient;

const CHECK_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl ToString) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

pub struct RedisChecker {
    client: redis::Client,
}

impl RedisChecker {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DependencyChecker for RedisChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => return DependencyStatus::unhealthy(e),
        };

        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

pub struct SourceChecker {
    client: SourceClient,
}

impl SourceChecker {
    pub fn new(client: SourceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DependencyChecker for SourceChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.client.ping().await {
            Ok(()) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

/// Named dependency checks run together by the health endpoint.
#[derive(Clone)]
pub struct HealthChecks {
    checkers: Vec<(String, Arc<dyn DependencyChecker>)>,
    critical: Vec<String>,
    start_time: Instant,
}

impl HealthChecks {
    pub fn new() -> Self {
        Self {
            checkers: Vec::new(),
            critical: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn with_checker(mut self, name: &str, checker: Arc<dyn DependencyChecker>) -> Self {
        self.checkers.push((name.to_string(), checker));
        self
    }

    /// A failing critical dependency makes the whole service unhealthy.
    pub fn with_critical(mut self, name: &str, checker: Arc<dyn DependencyChecker>) -> Self {
        self.critical.push(name.to_string());
        self.with_checker(name, checker)
    }

    pub async fn check_health(&self) -> HealthResponse {
        let timeout_duration = Duration::from_secs(CHECK_TIMEOUT_SECS);

        let results = join_all(self.checkers.iter().map(|(name, checker)| async move {
            let status = timeout(timeout_duration, checker.check())
                .await
                .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
            (name.clone(), status)
        }))
        .await;

        let dependencies: HashMap<String, DependencyStatus> = results.into_iter().collect();

        HealthResponse {
            status: determine_overall_status(&dependencies, &self.critical),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            dependencies,
        }
    }
}

impl Default for HealthChecks {
    fn default() -> Self {
        Self::new()
    }
}

fn determine_overall_status(dependencies: &HashMap<String, DependencyStatus>, critical: &[String]) -> String {
    let mut has_critical_failure = false;
    let mut has_non_critical_failure = false;

    for (name, status) in dependencies {
        if matches!(status, DependencyStatus::Unhealthy { .. }) {
            if critical.iter().any(|c| c == name) {
                has_critical_failure = true;
            } else {
                has_non_critical_failure = true;
            }
        }
    }

    if has_critical_failure {
        "unhealthy".to_string()
    } else if has_non_critical_failure {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}
