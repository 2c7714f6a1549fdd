use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::warn;
use utoipa::OpenApi;
use uuid::Uuid;

use super::{
    dto::{
        AlertEventDto, AlertRuleDto, NewReadingRequest, PlantSummaryDto, QueuedResponse,
        RuleUpsertRequest,
    },
    errors::AppError,
    AppState,
};
use crate::{
    alerts::RuleError,
    models::{AlertKind, AlertRule, Reading, StatusClass, SupervisedPlant},
    monitor::PLANTS_KEY,
    plants_api::models::NewReadingDoc,
    status::{derive_status, rate_conditions, ConditionRating, Status},
    sync::PendingOp,
};

async fn supervised_plants(state: &AppState) -> Result<Vec<SupervisedPlant>, AppError> {
    let api = state.api.clone();
    let connectivity = state.sync.connectivity().clone();
    state
        .plants
        .get_or_fetch(PLANTS_KEY, move || async move {
            let plants = api.fetch_supervised_plants().await?;
            // Only real upstream contact marks the service online; a
            // cache hit must not.
            connectivity.set_online();
            Ok(plants)
        })
        .await
        .map_err(AppError::Upstream)
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// List alert events, most recent first (at most 50).
#[utoipa::path(
    get,
    path = "/alerts",
    responses(
        (status = 200, description = "Alert events, most recent first", body = Vec<AlertEventDto>),
    ),
    tag = "alerts"
)]
pub async fn get_alerts(State(state): State<AppState>) -> Json<Vec<AlertEventDto>> {
    let events = state.ledger.list().await;
    Json(events.into_iter().map(Into::into).collect())
}

/// Acknowledge one alert event. Unknown ids succeed too: the event may
/// already have been evicted from the capped ledger.
#[utoipa::path(
    post,
    path = "/alerts/{id}/acknowledge",
    params(("id" = String, Path, description = "Alert event ID")),
    responses(
        (status = 204, description = "Acknowledged (or already gone)"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "alerts"
)]
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.ledger.acknowledge(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Plants & status
// ---------------------------------------------------------------------------

/// Dashboard: every supervised plant with its latest reading and derived
/// status.
#[utoipa::path(
    get,
    path = "/plants",
    responses(
        (status = 200, description = "Supervised plants with latest reading and status", body = Vec<PlantSummaryDto>),
        (status = 502, description = "Plants API unreachable"),
    ),
    tag = "plants"
)]
pub async fn get_plants(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlantSummaryDto>>, AppError> {
    let plants = supervised_plants(&state).await?;
    let now = Utc::now();

    let mut summaries = Vec::with_capacity(plants.len());
    for plant in plants {
        // Per-plant reading failures degrade to "no data" rather than
        // failing the whole dashboard.
        let latest: Option<Reading> = match state.api.fetch_latest_reading(&plant.id).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(plant_id = %plant.id, error = %e, "could not fetch latest reading");
                None
            }
        };

        let status = derive_status(&plant, latest.as_ref(), now);
        let soil_condition = soil_condition(&state, &plant.id, latest.as_ref()).await;
        summaries.push(PlantSummaryDto {
            plant,
            latest_reading: latest,
            status,
            soil_condition,
        });
    }

    Ok(Json(summaries))
}

/// Rate the latest soil humidity against the band implied by the plant's
/// own low/high rules. Needs both rules and a soil value; otherwise there
/// is nothing to rate against.
async fn soil_condition(
    state: &AppState,
    plant_id: &str,
    latest: Option<&Reading>,
) -> Option<ConditionRating> {
    let current = latest?.soil_humidity?;
    let low = state.rules.get(plant_id, AlertKind::SoilHumidityLow).await?;
    let high = state.rules.get(plant_id, AlertKind::SoilHumidityHigh).await?;
    if high.threshold <= low.threshold {
        return None;
    }

    let optimal = (low.threshold + high.threshold) / 2.0;
    let tolerance = (high.threshold - low.threshold) / 2.0;
    Some(rate_conditions(current, optimal, tolerance))
}

/// Derived monitoring status for one plant.
#[utoipa::path(
    get,
    path = "/plants/{plant_id}/status",
    params(("plant_id" = String, Path, description = "Supervised plant ID")),
    responses(
        (status = 200, description = "Derived status", body = Status),
        (status = 404, description = "Unknown plant"),
        (status = 502, description = "Plants API unreachable"),
    ),
    tag = "plants"
)]
pub async fn get_plant_status(
    State(state): State<AppState>,
    Path(plant_id): Path<String>,
) -> Result<Json<Status>, AppError> {
    let plants = supervised_plants(&state).await?;
    let Some(plant) = plants.into_iter().find(|p| p.id == plant_id) else {
        return Err(AppError::NotFound(format!("unknown plant: {plant_id}")));
    };

    let latest = if plant.active {
        match state.api.fetch_latest_reading(&plant.id).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(plant_id = %plant.id, error = %e, "could not fetch latest reading");
                None
            }
        }
    } else {
        // Paused plants classify as inactive regardless of readings.
        None
    };

    Ok(Json(derive_status(&plant, latest.as_ref(), Utc::now())))
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// List the alert rules configured for one plant.
#[utoipa::path(
    get,
    path = "/plants/{plant_id}/rules",
    params(("plant_id" = String, Path, description = "Supervised plant ID")),
    responses(
        (status = 200, description = "Alert rules for the plant", body = Vec<AlertRuleDto>),
    ),
    tag = "rules"
)]
pub async fn get_rules(
    State(state): State<AppState>,
    Path(plant_id): Path<String>,
) -> Json<Vec<AlertRuleDto>> {
    let rules = state.rules.list_for_plant(&plant_id).await;
    Json(rules.into_iter().map(Into::into).collect())
}

/// Create or replace the rule of the given kind for one plant.
#[utoipa::path(
    put,
    path = "/plants/{plant_id}/rules",
    params(("plant_id" = String, Path, description = "Supervised plant ID")),
    request_body = RuleUpsertRequest,
    responses(
        (status = 200, description = "Saved rule", body = AlertRuleDto),
        (status = 422, description = "Invalid threshold"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "rules"
)]
pub async fn put_rule(
    State(state): State<AppState>,
    Path(plant_id): Path<String>,
    Json(body): Json<RuleUpsertRequest>,
) -> Result<Json<AlertRuleDto>, AppError> {
    let rule = AlertRule {
        id: Uuid::new_v4().to_string(),
        plant_id,
        kind: body.kind,
        threshold: body.threshold,
        enabled: body.enabled,
    };

    state.rules.save(rule.clone()).await.map_err(|e| match e {
        RuleError::InvalidThreshold(_) => AppError::Invalid(e.to_string()),
        RuleError::Storage(e) => AppError::Internal(e.into()),
    })?;

    Ok(Json(rule.into()))
}

/// Delete one alert rule. Unknown ids succeed.
#[utoipa::path(
    delete,
    path = "/rules/{id}",
    params(("id" = String, Path, description = "Rule ID")),
    responses(
        (status = 204, description = "Deleted (or never existed)"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "rules"
)]
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .rules
        .delete(&id)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize, utoipa::IntoParams)]
pub struct ReadingsQuery {
    /// Only return readings taken at or after this instant (RFC 3339).
    pub since: Option<chrono::DateTime<Utc>>,
}

/// Reading history for one plant, most recent first.
#[utoipa::path(
    get,
    path = "/plants/{plant_id}/readings",
    params(
        ("plant_id" = String, Path, description = "Supervised plant ID"),
        ReadingsQuery,
    ),
    responses(
        (status = 200, description = "Readings, most recent first", body = Vec<Reading>),
        (status = 502, description = "Plants API unreachable"),
    ),
    tag = "readings"
)]
pub async fn get_readings(
    State(state): State<AppState>,
    Path(plant_id): Path<String>,
    Query(query): Query<ReadingsQuery>,
) -> Result<Json<Vec<Reading>>, AppError> {
    let readings = state
        .api
        .fetch_readings(&plant_id, query.since)
        .await
        .map_err(|e| AppError::Upstream(e.into()))?;
    Ok(Json(readings))
}

/// Record a reading for one plant. Sent upstream immediately when online;
/// queued durably (202) when offline or when the upstream call fails with
/// a transient error.
#[utoipa::path(
    post,
    path = "/plants/{plant_id}/readings",
    params(("plant_id" = String, Path, description = "Supervised plant ID")),
    request_body = NewReadingRequest,
    responses(
        (status = 201, description = "Reading created upstream", body = Reading),
        (status = 202, description = "Offline: reading queued for sync", body = QueuedResponse),
        (status = 502, description = "Plants API rejected the reading"),
    ),
    tag = "readings"
)]
pub async fn post_reading(
    State(state): State<AppState>,
    Path(plant_id): Path<String>,
    Json(body): Json<NewReadingRequest>,
) -> Result<Response, AppError> {
    let doc = NewReadingDoc {
        plant_id,
        soil_humidity: body.soil_humidity,
        air_humidity: body.air_humidity,
        temperature_c: body.temperature_c,
        light_level: body.light_level,
        timestamp: body.timestamp.unwrap_or_else(Utc::now),
    };

    let connectivity = state.sync.connectivity();
    if connectivity.is_online() {
        match state.api.create_reading(&doc).await {
            Ok(reading) => return Ok((StatusCode::CREATED, Json(reading)).into_response()),
            Err(e) if e.is_transient() => {
                connectivity.set_offline();
                // Cached plants must not satisfy the next poll, or the
                // service would flip straight back online.
                state.plants.invalidate(&PLANTS_KEY).await;
                warn!(error = %e, "create reading failed, queueing for sync");
            }
            Err(e) => return Err(AppError::Upstream(e.into())),
        }
    }

    state
        .sync
        .enqueue(PendingOp {
            endpoint: "/lecturas".to_owned(),
            method: "POST".to_owned(),
            payload: serde_json::to_value(&doc)?,
            timestamp: Utc::now(),
        })
        .await?;

    let body = QueuedResponse {
        queued: true,
        pending: state.sync.pending().await,
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with the current connectivity and queue depth.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "online": state.sync.connectivity().is_online(),
        "pending_sync": state.sync.pending().await,
        "unacknowledged_alerts": state.ledger.unacknowledged().await,
    }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        get_alerts,
        acknowledge_alert,
        get_plants,
        get_plant_status,
        get_rules,
        put_rule,
        delete_rule,
        get_readings,
        post_reading,
        health,
    ),
    components(schemas(
        AlertEventDto,
        AlertRuleDto,
        RuleUpsertRequest,
        NewReadingRequest,
        QueuedResponse,
        PlantSummaryDto,
        Status,
        StatusClass,
        ConditionRating,
        AlertKind,
        Reading,
        SupervisedPlant,
    )),
    tags(
        (name = "alerts",   description = "Alert ledger endpoints"),
        (name = "plants",   description = "Supervised plant dashboard and status"),
        (name = "rules",    description = "Per-plant alert rule endpoints"),
        (name = "readings", description = "Reading ingestion endpoints"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Plant Monitor API",
        version = "0.1.0",
        description = "Threshold alerts, status, and rules for supervised plants"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum_test::TestServer;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    use crate::{
        alerts::{AlertLedger, RuleStore},
        api::{router, AppState},
        cache::TtlCache,
        config::Config,
        models::{AlertEvent, AlertKind},
        plants_api::PlantsApiClient,
        storage::KvStore,
        sync::{Connectivity, SyncCoordinator},
    };

    /// Config pointing at a port nothing listens on, so any accidental
    /// upstream call fails fast instead of hanging.
    fn test_config(dir: &tempfile::TempDir) -> Config {
        Config {
            plants_api_base_url: "http://127.0.0.1:9".to_owned(),
            server_host: "127.0.0.1".to_owned(),
            server_port: 0,
            data_dir: dir.path().display().to_string(),
            poll_interval_secs: 60,
            cache_ttl_secs: 300,
            http_timeout_secs: 1,
        }
    }

    async fn test_state(dir: &tempfile::TempDir, online: bool) -> AppState {
        let config = test_config(dir);
        let store = KvStore::new(dir.path());
        let api = PlantsApiClient::new(&config).unwrap();
        let connectivity = Connectivity::new(online);

        AppState {
            api: api.clone(),
            plants: TtlCache::new(Duration::from_secs(config.cache_ttl_secs)),
            rules: RuleStore::load(store.clone()).await,
            ledger: AlertLedger::load(store.clone()).await,
            sync: SyncCoordinator::load(store, api, connectivity).await,
        }
    }

    async fn test_server(state: AppState) -> TestServer {
        TestServer::new(router(state)).unwrap()
    }

    fn event(id: &str) -> AlertEvent {
        AlertEvent {
            id: id.to_owned(),
            plant_id: "sp1".to_owned(),
            kind: AlertKind::SoilHumidityLow,
            message: "Fern: soil humidity too low (12.0%)".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap(),
            acknowledged: false,
        }
    }

    // -----------------------------------------------------------------------
    // GET /alerts, POST /alerts/{id}/acknowledge
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn alerts_empty_returns_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(test_state(&dir, true).await).await;

        let resp = server.get("/alerts").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn alerts_are_listed_most_recent_first() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, true).await;
        state.ledger.append(event("older")).await.unwrap();
        state.ledger.append(event("newer")).await.unwrap();

        let server = test_server(state).await;
        let resp = server.get("/alerts").await;
        resp.assert_status_ok();

        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0]["id"], "newer");
        assert_eq!(body[0]["kind"], "soil_humidity_low");
        assert_eq!(body[1]["id"], "older");
    }

    #[tokio::test]
    async fn acknowledge_flips_the_flag_and_unknown_ids_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, true).await;
        state.ledger.append(event("a")).await.unwrap();

        let server = test_server(state).await;
        server.post("/alerts/a/acknowledge").await.assert_status(
            axum::http::StatusCode::NO_CONTENT,
        );
        server
            .post("/alerts/long-gone/acknowledge")
            .await
            .assert_status(axum::http::StatusCode::NO_CONTENT);

        let body: Vec<Value> = server.get("/alerts").await.json();
        assert_eq!(body[0]["acknowledged"], true);
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_rule_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(test_state(&dir, true).await).await;

        let resp = server
            .put("/plants/sp1/rules")
            .json(&json!({"kind": "soil_humidity_low", "threshold": 30.0}))
            .await;
        resp.assert_status_ok();
        let saved: Value = resp.json();
        assert_eq!(saved["plant_id"], "sp1");
        assert_eq!(saved["enabled"], true);

        let body: Vec<Value> = server.get("/plants/sp1/rules").await.json();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["threshold"], 30.0);
    }

    #[tokio::test]
    async fn put_same_kind_twice_replaces_the_rule() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(test_state(&dir, true).await).await;

        for threshold in [30.0, 20.0] {
            server
                .put("/plants/sp1/rules")
                .json(&json!({"kind": "soil_humidity_low", "threshold": threshold}))
                .await
                .assert_status_ok();
        }

        let body: Vec<Value> = server.get("/plants/sp1/rules").await.json();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["threshold"], 20.0);
    }

    #[tokio::test]
    async fn put_rule_with_unknown_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(test_state(&dir, true).await).await;

        let resp = server
            .put("/plants/sp1/rules")
            .json(&json!({"kind": "ph_low", "threshold": 6.5}))
            .await;
        resp.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

        let body: Vec<Value> = server.get("/plants/sp1/rules").await.json();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn delete_rule_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(test_state(&dir, true).await).await;

        let saved: Value = server
            .put("/plants/sp1/rules")
            .json(&json!({"kind": "temperature_low", "threshold": 5.0}))
            .await
            .json();

        server
            .delete(&format!("/rules/{}", saved["id"].as_str().unwrap()))
            .await
            .assert_status(axum::http::StatusCode::NO_CONTENT);

        let body: Vec<Value> = server.get("/plants/sp1/rules").await.json();
        assert!(body.is_empty());
    }

    // -----------------------------------------------------------------------
    // POST /plants/{id}/readings (offline queueing)
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reading_posted_while_offline_is_queued() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, false).await;
        let sync = state.sync.clone();

        let server = test_server(state).await;
        let resp = server
            .post("/plants/sp1/readings")
            .json(&json!({"soil_humidity": 41.0, "temperature_c": 20.5}))
            .await;
        resp.assert_status(axum::http::StatusCode::ACCEPTED);

        let body: Value = resp.json();
        assert_eq!(body["queued"], true);
        assert_eq!(body["pending"], 1);
        assert_eq!(sync.pending().await, 1);
    }

    #[tokio::test]
    async fn transient_upstream_failure_queues_and_flips_offline() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, true).await;
        let sync = state.sync.clone();

        // Nothing listens upstream, so the direct send fails with a
        // connect error and the write falls back to the queue.
        let server = test_server(state).await;
        let resp = server
            .post("/plants/sp1/readings")
            .json(&json!({"soil_humidity": 41.0}))
            .await;
        resp.assert_status(axum::http::StatusCode::ACCEPTED);

        assert!(!sync.connectivity().is_online());
        assert_eq!(sync.pending().await, 1);
    }

    // -----------------------------------------------------------------------
    // Upstream failure surface
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn plants_dashboard_maps_unreachable_upstream_to_502() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(test_state(&dir, true).await).await;

        let resp = server.get("/plants").await;
        resp.assert_status(axum::http::StatusCode::BAD_GATEWAY);
        let body: Value = resp.json();
        assert!(body["error"].is_string());
    }

    // -----------------------------------------------------------------------
    // System endpoints
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_reports_connectivity_and_queue_depth() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(test_state(&dir, false).await).await;

        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["online"], false);
        assert_eq!(body["pending_sync"], 0);
        assert_eq!(body["unacknowledged_alerts"], 0);
    }

    #[tokio::test]
    async fn openapi_spec_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(test_state(&dir, true).await).await;

        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Plant Monitor API");
    }
}
