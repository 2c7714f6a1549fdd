use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One timestamped sample from a plant's sensor set.
///
/// Sensor fields are optional: partial samples are common (a probe may be
/// unplugged or mid-calibration) and must never abort evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reading {
    pub id: String,
    pub plant_id: String,
    /// Soil humidity, percent (0–100).
    pub soil_humidity: Option<f64>,
    /// Air humidity, percent (0–100).
    pub air_humidity: Option<f64>,
    /// Degrees Celsius.
    pub temperature_c: Option<f64>,
    pub light_level: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// A catalog plant instance the user actively monitors via sensor readings.
///
/// `active = false` suppresses alert evaluation but not status display.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SupervisedPlant {
    pub id: String,
    pub catalog_plant_id: String,
    pub display_name: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub active: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The measured quantity and direction a rule watches.
///
/// Adding a variant forces every `match` over rule kinds to be revisited,
/// including the evaluator predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SoilHumidityLow,
    SoilHumidityHigh,
    TemperatureHigh,
    TemperatureLow,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertKind::SoilHumidityLow => "soil_humidity_low",
            AlertKind::SoilHumidityHigh => "soil_humidity_high",
            AlertKind::TemperatureHigh => "temperature_high",
            AlertKind::TemperatureLow => "temperature_low",
        };
        f.write_str(s)
    }
}

/// A user-defined threshold condition for one measured quantity.
///
/// At most one rule per `(plant_id, kind)` — saving a second one replaces
/// the first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertRule {
    pub id: String,
    pub plant_id: String,
    pub kind: AlertKind,
    pub threshold: f64,
    pub enabled: bool,
}

/// A materialized rule violation, retained in the capped ledger.
///
/// Never mutated after creation except the one-way `acknowledged`
/// false → true flip.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertEvent {
    pub id: String,
    pub plant_id: String,
    pub kind: AlertKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Coarse, time-derived classification of a plant's monitoring health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Active,
    Stale,
    Disconnected,
    Inactive,
    NoData,
}

impl StatusClass {
    /// Human-readable label shown next to the plant in UI clients.
    pub fn label(self) -> &'static str {
        match self {
            StatusClass::Active => "Active",
            StatusClass::Stale => "Stale data",
            StatusClass::Disconnected => "No recent data",
            StatusClass::Inactive => "Monitoring paused",
            StatusClass::NoData => "No readings",
        }
    }
}
