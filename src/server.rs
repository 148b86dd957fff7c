// REST adapter over the Tracker (feature = "server")
//
// The owner id comes from the X-User-Id header set by the upstream auth
// gateway; this layer trusts it and does no credential checks.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::aggregator::Dashboard;
use crate::budget::Budget;
use crate::error::FinanceError;
use crate::model::{NewTransaction, RawAmount, Transaction, TransactionPatch};
use crate::report::{write_csv, Report};
use crate::storage::SqliteRepository;
use crate::tracker::Tracker;

pub const OWNER_HEADER: &str = "x-user-id";
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<Tracker<SqliteRepository>>,
}

impl AppState {
    pub fn new(repo: Arc<SqliteRepository>) -> Self {
        AppState {
            tracker: Arc::new(Tracker::new(repo)),
        }
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

pub enum ApiError {
    MissingOwner,
    BadHeader(String),
    Finance(FinanceError),
}

impl From<FinanceError> for ApiError {
    fn from(err: FinanceError) -> Self {
        ApiError::Finance(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingOwner => (
                StatusCode::UNAUTHORIZED,
                format!("missing {} header", OWNER_HEADER),
            ),
            ApiError::BadHeader(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Finance(err) => {
                let status = match &err {
                    FinanceError::Validation(_) => StatusCode::BAD_REQUEST,
                    FinanceError::NotFound { .. } => StatusCode::NOT_FOUND,
                    FinanceError::Conflict { .. } => StatusCode::CONFLICT,
                    FinanceError::Storage(_) => {
                        error!("storage failure: {}", err);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.to_string())
            }
        };

        (status, Json(ApiResponse::<()>::err(message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn owner_from(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::MissingOwner)
}

/// If-Match carries the version the client last read, quoted or bare
fn expected_version(headers: &HeaderMap) -> Result<Option<i64>, ApiError> {
    let Some(value) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .map(|v| v.trim().trim_matches('"'))
        .and_then(|v| v.parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadHeader("If-Match must be a version number".to_string()))
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check(State(state): State<AppState>) -> Response {
    match state.tracker.health() {
        Ok(()) => Json(ApiResponse::ok("OK")).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::err(e.to_string())),
        )
            .into_response(),
    }
}

/// GET /api/transactions
async fn list_transactions(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<Transaction>> {
    let owner = owner_from(&headers)?;
    Ok(Json(ApiResponse::ok(state.tracker.transactions.list(&owner)?)))
}

/// POST /api/transactions
async fn create_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(fields): Json<NewTransaction>,
) -> Result<(StatusCode, Json<ApiResponse<Transaction>>), ApiError> {
    let owner = owner_from(&headers)?;
    let key = headers.get(IDEMPOTENCY_HEADER).and_then(|v| v.to_str().ok());

    let tx = state.tracker.transactions.create(&owner, fields, key)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(tx))))
}

/// GET /api/transactions/:id
async fn get_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let owner = owner_from(&headers)?;
    Ok(Json(ApiResponse::ok(state.tracker.transactions.get(&owner, &id)?)))
}

/// PUT /api/transactions/:id
async fn update_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<TransactionPatch>,
) -> ApiResult<Transaction> {
    let owner = owner_from(&headers)?;
    let store = &state.tracker.transactions;

    let updated = match expected_version(&headers)? {
        Some(version) => store.update_at_version(&owner, &id, version, patch)?,
        None => store.update(&owner, &id, patch)?,
    };
    Ok(Json(ApiResponse::ok(updated)))
}

/// DELETE /api/transactions/:id
async fn delete_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<String> {
    let owner = owner_from(&headers)?;
    state.tracker.transactions.delete(&owner, &id)?;
    Ok(Json(ApiResponse::ok(format!("Transaction {} deleted", id))))
}

/// GET /api/dashboard
async fn get_dashboard(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Dashboard> {
    let owner = owner_from(&headers)?;
    Ok(Json(ApiResponse::ok(state.tracker.dashboard(&owner)?)))
}

#[derive(Debug, Deserialize)]
struct AddBudgetRequest {
    category: String,
    limit: RawAmount,
}

#[derive(Debug, Deserialize)]
struct SetLimitRequest {
    limit: RawAmount,
}

/// Mutation result plus the ledger as it now stands
#[derive(Debug, Serialize, Deserialize)]
pub struct BudgetChange {
    pub changed: bool,
    pub budgets: Vec<Budget>,
}

/// GET /api/budgets
async fn list_budgets(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<Budget>> {
    let owner = owner_from(&headers)?;
    Ok(Json(ApiResponse::ok(state.tracker.budgets.get_all(&owner)?)))
}

/// POST /api/budgets
async fn add_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddBudgetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Budget>>), ApiError> {
    let owner = owner_from(&headers)?;
    let added = state
        .tracker
        .budgets
        .add_category(&owner, &request.category, &request.limit)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(added))))
}

/// PUT /api/budgets/:category
async fn set_budget_limit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(category): Path<String>,
    Json(request): Json<SetLimitRequest>,
) -> ApiResult<BudgetChange> {
    let owner = owner_from(&headers)?;
    let budgets = &state.tracker.budgets;

    let changed = budgets.set_limit(&owner, &category, &request.limit)?;
    Ok(Json(ApiResponse::ok(BudgetChange {
        changed,
        budgets: budgets.get_all(&owner)?,
    })))
}

/// DELETE /api/budgets/:category
async fn remove_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(category): Path<String>,
) -> ApiResult<BudgetChange> {
    let owner = owner_from(&headers)?;
    let budgets = &state.tracker.budgets;

    let changed = budgets.remove_category(&owner, &category)?;
    Ok(Json(ApiResponse::ok(BudgetChange {
        changed,
        budgets: budgets.get_all(&owner)?,
    })))
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    name: Option<String>,
}

fn build_owner_report(state: &AppState, owner: &str, query: &ReportQuery) -> Result<Report, ApiError> {
    let name = query.name.as_deref().unwrap_or(owner);
    Ok(state.tracker.report(owner, name, Utc::now().date_naive())?)
}

/// GET /api/report?name=...
async fn get_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Report> {
    let owner = owner_from(&headers)?;
    Ok(Json(ApiResponse::ok(build_owner_report(&state, &owner, &query)?)))
}

/// GET /api/report.csv?name=...
async fn get_report_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let owner = owner_from(&headers)?;
    let report = build_owner_report(&state, &owner, &query)?;

    let mut body = Vec::new();
    write_csv(&report, &mut body)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report.file_name()),
            ),
        ],
        body,
    )
        .into_response())
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route(
            "/transactions/:id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        .route("/dashboard", get(get_dashboard))
        .route("/budgets", get(list_budgets).post(add_budget))
        .route("/budgets/:category", put(set_budget_limit).delete(remove_budget))
        .route("/report", get(get_report))
        .route("/report.csv", get(get_report_csv))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}
