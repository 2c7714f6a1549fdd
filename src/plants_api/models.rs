//! Wire documents for the plants CRUD API.
//!
//! The upstream store keeps its original (Spanish) field names; the serde
//! renames here are the only place in the crate that knows about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Reading, SupervisedPlant};

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisedPlantDoc {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "plantId")]
    pub plant_id: String,
    /// Custom display name given by the user; falls back to the id.
    #[serde(rename = "nombre")]
    pub name: Option<String>,
    #[serde(rename = "ubicacion")]
    pub location: Option<String>,
    #[serde(rename = "notas")]
    pub notes: Option<String>,
    #[serde(rename = "activa")]
    pub active: bool,
    #[serde(rename = "fechaInicio")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<SupervisedPlantDoc> for SupervisedPlant {
    fn from(doc: SupervisedPlantDoc) -> Self {
        let display_name = doc.name.unwrap_or_else(|| doc.id.clone());
        Self {
            id: doc.id,
            catalog_plant_id: doc.plant_id,
            display_name,
            location: doc.location,
            notes: doc.notes,
            active: doc.active,
            started_at: doc.started_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadingDoc {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "plantaSupervisadaId")]
    pub plant_id: String,
    #[serde(rename = "humedadSuelo")]
    pub soil_humidity: Option<f64>,
    #[serde(rename = "humedadAtmosferica")]
    pub air_humidity: Option<f64>,
    #[serde(rename = "temperatura")]
    pub temperature_c: Option<f64>,
    #[serde(rename = "luz")]
    pub light_level: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl From<ReadingDoc> for Reading {
    fn from(doc: ReadingDoc) -> Self {
        Self {
            id: doc.id,
            plant_id: doc.plant_id,
            soil_humidity: doc.soil_humidity,
            air_humidity: doc.air_humidity,
            temperature_c: doc.temperature_c,
            light_level: doc.light_level,
            timestamp: doc.timestamp,
        }
    }
}

/// Body for `POST /lecturas`. The upstream assigns `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReadingDoc {
    #[serde(rename = "plantaSupervisadaId")]
    pub plant_id: String,
    #[serde(rename = "humedadSuelo", skip_serializing_if = "Option::is_none")]
    pub soil_humidity: Option<f64>,
    #[serde(rename = "humedadAtmosferica", skip_serializing_if = "Option::is_none")]
    pub air_humidity: Option<f64>,
    #[serde(rename = "temperatura", skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(rename = "luz", skip_serializing_if = "Option::is_none")]
    pub light_level: Option<f64>,
    pub timestamp: DateTime<Utc>,
}
