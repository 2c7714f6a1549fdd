//! Pure threshold evaluation: one reading against one plant's rules.
//!
//! No I/O and no clock access — event timestamps come from the reading, so
//! the same inputs always produce the same events. The caller decides what
//! to do with them (usually: append to the ledger).
//!
//! The evaluator deliberately does not look at `plant.active`; suppressing
//! evaluation for paused plants is the caller's job.

use crate::models::{AlertEvent, AlertKind, AlertRule, Reading, SupervisedPlant};

/// Evaluate `reading` against the given rules and return one event per
/// violated rule.
///
/// Disabled rules and rules for other plants are skipped. A rule whose
/// sensor field is absent from the reading never triggers (fail-open):
/// partial samples are normal and must not raise.
pub fn evaluate(reading: &Reading, plant: &SupervisedPlant, rules: &[AlertRule]) -> Vec<AlertEvent> {
    rules
        .iter()
        .filter(|rule| rule.enabled && rule.plant_id == reading.plant_id)
        .filter_map(|rule| violation_message(reading, plant, rule).map(|message| AlertEvent {
            id: format!("{}_{}", rule.id, reading.timestamp.timestamp_millis()),
            plant_id: reading.plant_id.clone(),
            kind: rule.kind,
            message,
            timestamp: reading.timestamp,
            acknowledged: false,
        }))
        .collect()
}

/// Returns the alert message when `rule` is violated by `reading`,
/// `None` otherwise.
///
/// Predicates are strict: a value exactly at the threshold does not trigger.
fn violation_message(
    reading: &Reading,
    plant: &SupervisedPlant,
    rule: &AlertRule,
) -> Option<String> {
    let name = &plant.display_name;
    match rule.kind {
        AlertKind::SoilHumidityLow => reading
            .soil_humidity
            .filter(|v| *v < rule.threshold)
            .map(|v| format!("{name}: soil humidity too low ({v:.1}%)")),
        AlertKind::SoilHumidityHigh => reading
            .soil_humidity
            .filter(|v| *v > rule.threshold)
            .map(|v| format!("{name}: soil humidity too high ({v:.1}%)")),
        AlertKind::TemperatureHigh => reading
            .temperature_c
            .filter(|v| *v > rule.threshold)
            .map(|v| format!("{name}: temperature too high ({v:.1}\u{b0}C)")),
        AlertKind::TemperatureLow => reading
            .temperature_c
            .filter(|v| *v < rule.threshold)
            .map(|v| format!("{name}: temperature too low ({v:.1}\u{b0}C)")),
    }
}
