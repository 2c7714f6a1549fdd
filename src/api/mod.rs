pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    alerts::{AlertLedger, RuleStore},
    cache::TtlCache,
    models::SupervisedPlant,
    plants_api::PlantsApiClient,
    sync::SyncCoordinator,
};

/// Everything the handlers need, cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    pub api: PlantsApiClient,
    pub plants: TtlCache<&'static str, Vec<SupervisedPlant>>,
    pub rules: RuleStore,
    pub ledger: AlertLedger,
    pub sync: SyncCoordinator<PlantsApiClient>,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/alerts", get(handlers::get_alerts))
        .route("/alerts/{id}/acknowledge", post(handlers::acknowledge_alert))
        .route("/plants", get(handlers::get_plants))
        .route("/plants/{plant_id}/status", get(handlers::get_plant_status))
        .route(
            "/plants/{plant_id}/rules",
            get(handlers::get_rules).put(handlers::put_rule),
        )
        .route("/rules/{id}", delete(handlers::delete_rule))
        .route(
            "/plants/{plant_id}/readings",
            get(handlers::get_readings).post(handlers::post_reading),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
        .split_for_parts();

    router.route(
        "/api-docs/openapi.json",
        get(move || async move { axum::Json(api) }),
    )
}
