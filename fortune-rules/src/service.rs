use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::info;

use crate::fortune::{Fortune, FortuneService, InMemoryCatalog};
use crate::loader::{validate_rule_contents, ValidationIssue};
use crate::{Identity, PersonalizationOutcome, Rule, RuleHistoryEntry, RuleStore, UserContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDocument {
    pub rule: Rule,
    #[serde(default)]
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRequest {
    pub active: bool,
    #[serde(default)]
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizeRequest {
    pub message: String,
    pub context: UserContext,
    #[serde(default)]
    pub identity: Identity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FortuneRequest {
    pub context: UserContext,
    #[serde(default)]
    pub identity: Identity,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Clone)]
struct RuleServiceState {
    fortunes: Arc<FortuneService>,
}

impl RuleServiceState {
    fn store(&self) -> &RuleStore {
        self.fortunes.store()
    }
}

/// Configuration for the rule API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleServiceConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8081".to_string()
}

impl Default for RuleServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Helper used by binaries and tests to compose the REST API router.
#[derive(Clone)]
pub struct RuleApiBuilder {
    state: RuleServiceState,
}

impl RuleApiBuilder {
    /// API over `store` with an empty catalog and no generator.
    pub fn new(store: RuleStore) -> Self {
        Self::with_fortunes(FortuneService::new(store, Arc::new(InMemoryCatalog::new())))
    }

    pub fn with_fortunes(fortunes: FortuneService) -> Self {
        Self {
            state: RuleServiceState {
                fortunes: Arc::new(fortunes),
            },
        }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/rules", get(list_rules).post(upsert_rule))
            .route("/rules/:rule_id", get(get_rule).delete(delete_rule))
            .route("/rules/:rule_id/history", get(rule_history))
            .route("/rules/:rule_id/active", put(set_active))
            .route("/personalize", post(personalize))
            .route("/fortune", post(fortune))
            .with_state(self.state)
    }

    /// Spawns an HTTP server binding to the configured address.
    pub async fn serve(self, config: RuleServiceConfig) -> anyhow::Result<oneshot::Sender<()>> {
        let (tx, rx) = oneshot::channel();
        let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
        let router = self.into_router();

        tokio::spawn(async move {
            info!(address = %config.bind_address, "starting rule service");
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
                .ok();
        });

        Ok(tx)
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_rules(State(state): State<RuleServiceState>) -> Json<Vec<RuleHistoryEntry>> {
    Json(state.store().list_rules())
}

async fn get_rule(
    State(state): State<RuleServiceState>,
    Path(rule_id): Path<String>,
) -> Result<Json<RuleHistoryEntry>, ApiError> {
    state
        .store()
        .latest_rule(&rule_id)
        .map(Json)
        .ok_or_else(|| rule_not_found(&rule_id))
}

async fn rule_history(
    State(state): State<RuleServiceState>,
    Path(rule_id): Path<String>,
) -> Result<Json<Vec<RuleHistoryEntry>>, ApiError> {
    let history = state.store().rule_history(&rule_id);
    if history.is_empty() {
        return Err(rule_not_found(&rule_id));
    }
    Ok(Json(history))
}

async fn upsert_rule(
    State(state): State<RuleServiceState>,
    Json(payload): Json<RuleDocument>,
) -> Result<(StatusCode, Json<RuleHistoryEntry>), ApiError> {
    // Blank ids are fine here: the store assigns one.
    let rule = payload.rule;
    let issues = validate_rule_contents(&rule);
    if !issues.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                code: "invalid_rule".into(),
                message: format!("rule has {} validation issue(s)", issues.len()),
                issues,
            }),
        ));
    }

    let entry = state.store().put_rule(rule, payload.updated_by);
    let status = if entry.version == 1 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(entry)))
}

async fn set_active(
    State(state): State<RuleServiceState>,
    Path(rule_id): Path<String>,
    Json(payload): Json<ActivationRequest>,
) -> Result<Json<RuleHistoryEntry>, ApiError> {
    state
        .store()
        .set_active(&rule_id, payload.active, payload.updated_by)
        .map(Json)
        .map_err(|_| rule_not_found(&rule_id))
}

async fn delete_rule(
    State(state): State<RuleServiceState>,
    Path(rule_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .store()
        .remove_rule(&rule_id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|_| rule_not_found(&rule_id))
}

async fn personalize(
    State(state): State<RuleServiceState>,
    Json(payload): Json<PersonalizeRequest>,
) -> Json<PersonalizationOutcome> {
    let engine = state.store().engine();
    Json(engine.personalize(&payload.message, &payload.context, &payload.identity))
}

async fn fortune(
    State(state): State<RuleServiceState>,
    Json(payload): Json<FortuneRequest>,
) -> Json<Fortune> {
    Json(
        state
            .fortunes
            .fortune(&payload.context, &payload.identity)
            .await,
    )
}

fn rule_not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            code: "not_found".into(),
            message: format!("rule {} not found", id),
            issues: Vec::new(),
        }),
    )
}
