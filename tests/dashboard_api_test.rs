use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bigdecimal::BigDecimal;
use mockito::{Mock, Server, ServerGuard};
use serde_json::Value;
use tower::ServiceExt;

use ledger_core::adapters::InMemoryTransactionRepository;
use ledger_core::domain::SourceKind;
use ledger_core::health::HealthChecks;
use ledger_core::services::Aggregator;
use ledger_core::sources::{HttpSourceGateway, SourceClient};
use ledger_core::{create_app, AppState};

struct Upstreams {
    income: ServerGuard,
    expense: ServerGuard,
    investment: ServerGuard,
    // held so the mocks outlive the requests
    _mocks: Vec<Mock>,
}

impl Upstreams {
    async fn start() -> Self {
        Self {
            income: Server::new_async().await,
            expense: Server::new_async().await,
            investment: Server::new_async().await,
            _mocks: Vec::new(),
        }
    }

    fn server(&mut self, kind: SourceKind) -> &mut ServerGuard {
        match kind {
            SourceKind::Income => &mut self.income,
            SourceKind::Expense => &mut self.expense,
            SourceKind::Investment => &mut self.investment,
        }
    }

    async fn serve_json(&mut self, kind: SourceKind, body: &str) {
        let mock = self
            .server(kind)
            .mock("GET", kind.collection_path())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
        self._mocks.push(mock);
    }

    async fn serve_error(&mut self, kind: SourceKind) {
        let mock = self
            .server(kind)
            .mock("GET", kind.collection_path())
            .with_status(503)
            .create_async()
            .await;
        self._mocks.push(mock);
    }

    fn gateway(&self) -> HttpSourceGateway {
        HttpSourceGateway::from_urls(
            self.income.url(),
            self.expense.url(),
            self.investment.url(),
            Duration::from_secs(5),
        )
        .unwrap()
    }
}

/// Accepts connections and never answers.
async fn silent_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });
    format!("http://{}", addr)
}

fn app_with(gateway: HttpSourceGateway, repository: Arc<InMemoryTransactionRepository>) -> axum::Router {
    let state = AppState {
        aggregator: Arc::new(Aggregator::new(Arc::new(gateway), repository.clone())),
        repository,
        health: Arc::new(HealthChecks::new()),
    };
    create_app(state)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn decimal(value: &Value) -> BigDecimal {
    match value {
        Value::String(s) => BigDecimal::from_str(s).unwrap(),
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a decimal: {:?}", other),
    }
}

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

#[tokio::test]
async fn test_dashboard_combines_all_sources() {
    let mut upstreams = Upstreams::start().await;
    upstreams
        .serve_json(
            SourceKind::Income,
            r#"[{"id":"i1","incomeDate":"2024-01-01","amountReceived":500,"createdBy":"A"}]"#,
        )
        .await;
    upstreams
        .serve_json(
            SourceKind::Expense,
            r#"[{"id":"e1","expenseDate":"2024-01-02","amountPaid":200,"createdBy":"A"}]"#,
        )
        .await;
    upstreams
        .serve_json(
            SourceKind::Investment,
            r#"[{"id":"v1","currentBalance":100,"createdBy":"A"}]"#,
        )
        .await;

    let repository = Arc::new(InMemoryTransactionRepository::new());
    let app = app_with(upstreams.gateway(), repository.clone());

    let (status, body) = get(app, "/api/transactions/dashboard?range=30").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 3);
    assert_eq!(decimal(&body["totalIncome"]), dec("500"));
    assert_eq!(decimal(&body["totalExpense"]), dec("200"));
    assert_eq!(decimal(&body["totalInvestment"]), dec("100"));
    assert_eq!(decimal(&body["netGain"]), dec("200"));
    assert_eq!(decimal(&body["netLoss"]), dec("0"));
    assert_eq!(repository.len().await, 3);

    let types: Vec<&str> = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"INCOME"));
    assert!(types.contains(&"EXPENSE"));
    assert!(types.contains(&"INVESTMENT"));
}

#[tokio::test]
async fn test_dashboard_tolerates_failing_source() {
    let mut upstreams = Upstreams::start().await;
    upstreams
        .serve_json(
            SourceKind::Income,
            r#"[{"id":"i1","incomeDate":"2024-01-01","amountReceived":"100.10","createdBy":"A"}]"#,
        )
        .await;
    upstreams.serve_error(SourceKind::Expense).await;
    upstreams
        .serve_json(
            SourceKind::Investment,
            r#"[{"id":"v1","currentBalance":"0.20","createdBy":"A"}]"#,
        )
        .await;

    let app = app_with(upstreams.gateway(), Arc::new(InMemoryTransactionRepository::new()));
    let (status, body) = get(app, "/api/transactions/dashboard?range=7").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&body["totalExpense"]), dec("0"));
    assert_eq!(decimal(&body["netGain"]), dec("99.90"));
}

#[tokio::test]
async fn test_dashboard_survives_unresponsive_source() {
    let mut upstreams = Upstreams::start().await;
    upstreams
        .serve_json(
            SourceKind::Expense,
            r#"[{"id":"e1","expenseDate":"2024-01-02","amountPaid":200,"createdBy":"A"}]"#,
        )
        .await;
    upstreams
        .serve_json(
            SourceKind::Investment,
            r#"[{"id":"v1","currentBalance":100,"createdBy":"A"}]"#,
        )
        .await;

    let timeout = Duration::from_millis(100);
    let gateway = HttpSourceGateway::new(
        SourceClient::new(SourceKind::Income, silent_upstream().await, timeout).unwrap(),
        SourceClient::new(SourceKind::Expense, upstreams.expense.url(), timeout).unwrap(),
        SourceClient::new(SourceKind::Investment, upstreams.investment.url(), timeout).unwrap(),
    );
    let repository = Arc::new(InMemoryTransactionRepository::new());
    let app = app_with(gateway, repository.clone());

    let (status, body) = tokio::time::timeout(
        Duration::from_secs(5),
        get(app, "/api/transactions/dashboard?range=30"),
    )
    .await
    .expect("dashboard should not wait on the silent source");

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&body["totalIncome"]), dec("0"));
    assert_eq!(decimal(&body["totalExpense"]), dec("200"));
    assert_eq!(decimal(&body["totalInvestment"]), dec("100"));
    assert_eq!(repository.len().await, 2);
}

#[tokio::test]
async fn test_dashboard_reports_net_loss() {
    let mut upstreams = Upstreams::start().await;
    upstreams.serve_json(SourceKind::Income, "[]").await;
    upstreams
        .serve_json(
            SourceKind::Expense,
            r#"[{"id":"e1","expenseDate":"2024-03-01","amountPaid":75.5,"createdBy":"B"}]"#,
        )
        .await;
    upstreams.serve_json(SourceKind::Investment, "[]").await;

    let app = app_with(upstreams.gateway(), Arc::new(InMemoryTransactionRepository::new()));
    let (status, body) = get(app, "/api/transactions/dashboard?range=0").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["netGain"]), dec("0"));
    assert_eq!(decimal(&body["netLoss"]), dec("75.5"));
}

#[tokio::test]
async fn test_dashboard_not_found_when_every_source_fails() {
    let mut upstreams = Upstreams::start().await;
    upstreams.serve_error(SourceKind::Income).await;
    upstreams.serve_error(SourceKind::Expense).await;
    upstreams.serve_json(SourceKind::Investment, "not json").await;

    let repository = Arc::new(InMemoryTransactionRepository::new());
    let app = app_with(upstreams.gateway(), repository.clone());
    let (status, body) = get(app, "/api/transactions/dashboard?range=30").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert!(repository.is_empty().await);
}

#[tokio::test]
async fn test_dashboard_rejects_bad_range() {
    let upstreams = Upstreams::start().await;
    let app = app_with(upstreams.gateway(), Arc::new(InMemoryTransactionRepository::new()));

    for uri in [
        "/api/transactions/dashboard",
        "/api/transactions/dashboard?range=",
        "/api/transactions/dashboard?range=abc",
        "/api/transactions/dashboard?range=-5",
    ] {
        let (status, body) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri {}", uri);
        assert!(body["error"].as_str().unwrap().contains("range"));
    }
}

#[tokio::test]
async fn test_dashboard_store_failure_is_internal_error() {
    let mut upstreams = Upstreams::start().await;
    upstreams
        .serve_json(
            SourceKind::Income,
            r#"[{"id":"i1","incomeDate":"2024-01-01","amountReceived":500,"createdBy":"A"}]"#,
        )
        .await;
    upstreams.serve_json(SourceKind::Expense, "[]").await;
    upstreams.serve_json(SourceKind::Investment, "[]").await;

    let repository = Arc::new(InMemoryTransactionRepository::new());
    repository.set_unavailable(true);
    let app = app_with(upstreams.gateway(), repository);

    let (status, body) = get(app, "/api/transactions/dashboard?range=30").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], 500);
}

#[tokio::test]
async fn test_repeated_dashboard_calls_do_not_duplicate_rows() {
    let mut upstreams = Upstreams::start().await;
    upstreams
        .serve_json(
            SourceKind::Income,
            r#"[{"id":"i1","incomeDate":"2024-01-01","amountReceived":500,"createdBy":"A"}]"#,
        )
        .await;
    upstreams.serve_json(SourceKind::Expense, "[]").await;
    upstreams.serve_json(SourceKind::Investment, "[]").await;

    let repository = Arc::new(InMemoryTransactionRepository::new());
    let app = app_with(upstreams.gateway(), repository.clone());

    let (_, first) = get(app.clone(), "/api/transactions/dashboard?range=30").await;
    let (_, second) = get(app, "/api/transactions/dashboard?range=30").await;

    assert_eq!(repository.len().await, 1);
    assert_eq!(first["transactions"][0]["id"], second["transactions"][0]["id"]);
}

#[tokio::test]
async fn test_list_transactions_filters_by_type() {
    let mut upstreams = Upstreams::start().await;
    upstreams
        .serve_json(
            SourceKind::Income,
            r#"[{"id":"i1","incomeDate":"2024-01-01","amountReceived":500,"createdBy":"A"}]"#,
        )
        .await;
    upstreams
        .serve_json(
            SourceKind::Expense,
            r#"[{"id":"e1","expenseDate":"2024-01-02","amountPaid":200,"createdBy":"A"},
            {"id":"e2","expenseDate":"2024-01-03","amountPaid":50,"createdBy":"A"}]"#,
        )
        .await;
    upstreams.serve_json(SourceKind::Investment, "[]").await;

    let app = app_with(upstreams.gateway(), Arc::new(InMemoryTransactionRepository::new()));

    let (status, empty) = get(app.clone(), "/api/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty.as_array().unwrap().len(), 0);

    get(app.clone(), "/api/transactions/dashboard?range=30").await;

    let (_, all) = get(app.clone(), "/api/transactions").await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (status, expenses) = get(app.clone(), "/api/transactions?type=expense").await;
    assert_eq!(status, StatusCode::OK);
    let expenses = expenses.as_array().unwrap();
    assert_eq!(expenses.len(), 2);
    assert!(expenses.iter().all(|t| t["type"] == "EXPENSE"));

    let (status, _) = get(app, "/api/transactions?type=transfer").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_endpoint_without_checks_is_healthy() {
    let upstreams = Upstreams::start().await;
    let app = app_with(upstreams.gateway(), Arc::new(InMemoryTransactionRepository::new()));

    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
