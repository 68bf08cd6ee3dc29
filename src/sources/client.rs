use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{SourceKind, SourceRecord};
use crate::ports::SourceGateway;

const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_RESET_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

impl SourceError {
    fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(url.to_string())
        } else {
            SourceError::RequestError(err)
        }
    }
}

/// HTTP client bound to one upstream service.
#[derive(Clone)]
pub struct SourceClient {
    kind: SourceKind,
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl SourceClient {
    /// Creates a client with the default circuit breaker configuration
    pub fn new(kind: SourceKind, base_url: String, timeout: Duration) -> Result<Self, SourceError> {
        Self::with_circuit_breaker(
            kind,
            base_url,
            timeout,
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_RESET_TIMEOUT_SECS,
        )
    }

    /// Creates a client with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        kind: SourceKind,
        base_url: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Ok(SourceClient {
            kind,
            client,
            base_url,
            circuit_breaker,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Fetches the complete record set of this source. No retries.
    pub async fn fetch_all(&self) -> Result<Vec<SourceRecord>, SourceError> {
        let url = format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.kind.collection_path()
        );
        let client = self.client.clone();
        let kind = self.kind;

        let result: Result<Vec<SourceRecord>, FailsafeError<SourceError>> = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| SourceError::from_reqwest(e, &url))?;

                if !response.status().is_success() {
                    return Err(SourceError::UnexpectedStatus {
                        status: response.status().as_u16(),
                        url,
                    });
                }

                let body = response
                    .bytes()
                    .await
                    .map_err(|e| SourceError::from_reqwest(e, &url))?;
                SourceRecord::list_from_json(kind, &body).map_err(SourceError::from)
            })
            .await;

        match result {
            Ok(records) => Ok(records),
            Err(FailsafeError::Rejected) => Err(SourceError::CircuitBreakerOpen(format!(
                "{} service circuit breaker is open",
                self.kind
            ))),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    /// Connectivity check used by health checks. Any HTTP response counts.
    pub async fn ping(&self) -> Result<(), SourceError> {
        self.client
            .get(&self.base_url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| SourceError::from_reqwest(e, &self.base_url))
    }
}

/// The three upstream services behind one gateway.
#[derive(Clone)]
pub struct HttpSourceGateway {
    income: SourceClient,
    expense: SourceClient,
    investment: SourceClient,
}

impl HttpSourceGateway {
    pub fn new(income: SourceClient, expense: SourceClient, investment: SourceClient) -> Self {
        Self {
            income,
            expense,
            investment,
        }
    }

    pub fn from_urls(
        income_url: String,
        expense_url: String,
        investment_url: String,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self::new(
            SourceClient::new(SourceKind::Income, income_url, timeout)?,
            SourceClient::new(SourceKind::Expense, expense_url, timeout)?,
            SourceClient::new(SourceKind::Investment, investment_url, timeout)?,
        ))
    }

    pub fn client(&self, kind: SourceKind) -> &SourceClient {
        match kind {
            SourceKind::Income => &self.income,
            SourceKind::Expense => &self.expense,
            SourceKind::Investment => &self.investment,
        }
    }
}

#[async_trait]
impl SourceGateway for HttpSourceGateway {
    async fn fetch_all(&self, kind: SourceKind) -> Result<Vec<SourceRecord>, SourceError> {
        self.client(kind).fetch_all().await
    }
}
