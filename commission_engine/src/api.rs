//! HTTP API for the Commission Engine.
//!
//! This module exposes the rule store, the scenario test runner and the
//! tier calculator as a small JSON API using the
//! [`axum`](https://crates.io/crates/axum) framework.  Evaluation always
//! runs against a snapshot of the rule list so that a slow request never
//! holds the store lock while computing.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::EngineConfig;
use crate::engine::{run_scenario_with, run_scenarios, summarize};
use crate::error::RuleError;
use crate::models::{CommissionRule, ScenarioSummary, TestResult, TestScenario};
use crate::store::{AuditEntry, InMemoryRuleStore, RuleDraft, RuleStore};
use crate::tiered::{
    calculate_tiered_commission, validate_tiered_config, TierCatalog, TierSource,
    TieredCommissionConfig, TieredCommissionResult,
};

/// Application state shared across requests.
pub struct AppState {
    pub store: RwLock<InMemoryRuleStore>,
    pub tiers: RwLock<TierCatalog>,
}

impl AppState {
    pub fn new(store: InMemoryRuleStore, tiers: TierCatalog) -> Arc<Self> {
        Arc::new(AppState {
            store: RwLock::new(store),
            tiers: RwLock::new(tiers),
        })
    }
}

/// Build the API router, loading tier ladders and seed rules as
/// described by `config`.  Returns the router and a handle to the state.
pub fn build_router(config: &EngineConfig) -> Result<(Router, Arc<AppState>)> {
    // Load tier ladders before the rules that may refer to them
    let tiers = config.load_tier_catalog()?;
    let seed = config.load_seed_rules()?;
    let seeded = seed.len();
    let store = InMemoryRuleStore::with_rules(seed).context("seeding rule store")?;
    tracing::info!(
        rules = seeded,
        tier_ladders = tiers.configs().len(),
        "commission engine state initialised"
    );
    // Construct router
    let state = AppState::new(store, tiers);
    Ok((router(state.clone()), state))
}

/// Routes over an existing state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/rules", get(list_rules).post(create_rule))
        .route("/api/rules/:id", put(update_rule).delete(delete_rule))
        .route("/api/rules/:id/toggle", post(toggle_rule))
        .route("/api/audit", get(audit_log))
        .route("/api/test", post(test_scenario))
        .route("/api/test/batch", post(test_batch))
        .route("/api/tiered/templates", get(tier_templates))
        .route("/api/tiered/calculate", post(calculate_tiered))
        .with_state(state)
}

/// Error body returned for rejected requests.
pub struct ApiError(RuleError);

impl From<RuleError> for ApiError {
    fn from(err: RuleError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            RuleError::NotFound(_) | RuleError::UnknownTierConfig(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        let body = Json(serde_json::json!({"error": self.0.to_string()}));
        (status, body).into_response()
    }
}

async fn list_rules(State(state): State<Arc<AppState>>) -> Json<Vec<CommissionRule>> {
    Json(state.store.read().await.snapshot())
}

async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<RuleDraft>,
) -> Result<(StatusCode, Json<AuditEntry>), ApiError> {
    let entry = state.store.write().await.create(draft)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(draft): Json<RuleDraft>,
) -> Result<Json<AuditEntry>, ApiError> {
    Ok(Json(state.store.write().await.update(&id, draft)?))
}

async fn toggle_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AuditEntry>, ApiError> {
    Ok(Json(state.store.write().await.toggle(&id)?))
}

async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AuditEntry>, ApiError> {
    Ok(Json(state.store.write().await.delete(&id)?))
}

async fn audit_log(State(state): State<Arc<AppState>>) -> Json<Vec<AuditEntry>> {
    Json(state.store.read().await.audit_log().to_vec())
}

/// Results of one scenario run with their aggregate.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub results: Vec<TestResult>,
    pub summary: ScenarioSummary,
}

impl ScenarioReport {
    fn new(results: Vec<TestResult>) -> Self {
        let summary = summarize(&results);
        ScenarioReport { results, summary }
    }
}

async fn test_scenario(
    State(state): State<Arc<AppState>>,
    Json(scenario): Json<TestScenario>,
) -> Json<ScenarioReport> {
    let rules = state.store.read().await.snapshot();
    let tiers = state.tiers.read().await;
    Json(ScenarioReport::new(run_scenario_with(&rules, &scenario, &*tiers)))
}

async fn test_batch(
    State(state): State<Arc<AppState>>,
    Json(scenarios): Json<Vec<TestScenario>>,
) -> Response {
    let rules = state.store.read().await.snapshot();
    let tiers = state.tiers.read().await.clone();
    // The rayon fan-out runs off the async workers
    let outcome = tokio::task::spawn_blocking(move || {
        run_scenarios(&rules, &scenarios, &tiers)
            .into_iter()
            .map(ScenarioReport::new)
            .collect::<Vec<_>>()
    })
    .await;
    batch_response(outcome)
}

fn batch_response(outcome: Result<Vec<ScenarioReport>, tokio::task::JoinError>) -> Response {
    match outcome {
        Ok(reports) => (StatusCode::OK, Json(reports)).into_response(),
        Err(err) => {
            tracing::error!(%err, "batch scenario run failed");
            let body = Json(serde_json::json!({"error": format!("batch run failed: {}", err)}));
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}

async fn tier_templates(State(state): State<Arc<AppState>>) -> Json<Vec<TieredCommissionConfig>> {
    Json(state.tiers.read().await.configs().to_vec())
}

/// Body of `POST /api/tiered/calculate`.  Either a catalog id or an
/// inline ladder must be given; an inline ladder wins.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredCalculationRequest {
    pub amount: f64,
    #[serde(default)]
    pub config_id: Option<String>,
    #[serde(default)]
    pub config: Option<TieredCommissionConfig>,
}

async fn calculate_tiered(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TieredCalculationRequest>,
) -> Result<Json<TieredCommissionResult>, ApiError> {
    if let Some(config) = &request.config {
        validate_tiered_config(config)?;
        return Ok(Json(calculate_tiered_commission(request.amount, config)));
    }
    let id = request
        .config_id
        .ok_or_else(|| RuleError::MissingField("configId".into()))?;
    let tiers = state.tiers.read().await;
    let config = tiers
        .tiered_config(&id)
        .ok_or_else(|| RuleError::UnknownTierConfig(id.clone()))?;
    Ok(Json(calculate_tiered_commission(request.amount, config)))
}

/// Launch the API server.  This function builds the router from the
/// given configuration and binds to its address.  It blocks until the
/// server terminates (e.g. when interrupted).
pub async fn serve(config: &EngineConfig) -> Result<()> {
    let (router, _state) = build_router(config)?;
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "commission engine listening");
    axum::serve(listener, router).await?;
    Ok(())
}
