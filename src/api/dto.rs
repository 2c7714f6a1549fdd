use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{AlertEvent, AlertKind, AlertRule, Reading, SupervisedPlant},
    status::{ConditionRating, Status},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertEventDto {
    pub id: String,
    pub plant_id: String,
    pub kind: AlertKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

impl From<AlertEvent> for AlertEventDto {
    fn from(e: AlertEvent) -> Self {
        Self {
            id: e.id,
            plant_id: e.plant_id,
            kind: e.kind,
            message: e.message,
            timestamp: e.timestamp,
            acknowledged: e.acknowledged,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertRuleDto {
    pub id: String,
    pub plant_id: String,
    pub kind: AlertKind,
    pub threshold: f64,
    pub enabled: bool,
}

impl From<AlertRule> for AlertRuleDto {
    fn from(r: AlertRule) -> Self {
        Self {
            id: r.id,
            plant_id: r.plant_id,
            kind: r.kind,
            threshold: r.threshold,
            enabled: r.enabled,
        }
    }
}

/// Body for `PUT /plants/{plant_id}/rules`. The rule id is assigned by the
/// server; saving a kind that already has a rule replaces it.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RuleUpsertRequest {
    pub kind: AlertKind,
    pub threshold: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Body for `POST /plants/{plant_id}/readings`. `timestamp` defaults to
/// the server clock when omitted.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NewReadingRequest {
    pub soil_humidity: Option<f64>,
    pub air_humidity: Option<f64>,
    pub temperature_c: Option<f64>,
    pub light_level: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Response for `POST /plants/{plant_id}/readings` when the service is
/// offline and the write was queued instead of sent upstream.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueuedResponse {
    pub queued: bool,
    pub pending: usize,
}

/// One dashboard row: the plant, its latest reading, and derived status.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlantSummaryDto {
    pub plant: SupervisedPlant,
    pub latest_reading: Option<Reading>,
    pub status: Status,
    /// Latest soil humidity rated against the band between this plant's
    /// low and high soil rules, when both exist.
    pub soil_condition: Option<ConditionRating>,
}
