//! Time-derived plant status and condition rating.
//!
//! Both functions are pure; callers inject `now` so tests stay
//! deterministic.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Reading, StatusClass, SupervisedPlant};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Status {
    pub class: StatusClass,
    pub label: &'static str,
}

impl From<StatusClass> for Status {
    fn from(class: StatusClass) -> Self {
        Self {
            class,
            label: class.label(),
        }
    }
}

/// Classify a plant's monitoring health from its latest reading.
///
/// Ordered, first match wins: paused plants are `Inactive` regardless of
/// data; then `NoData`; then the reading age buckets. A reading exactly
/// 2 h old is already `Stale` and one exactly 24 h old is already
/// `Disconnected`.
pub fn derive_status(
    plant: &SupervisedPlant,
    latest: Option<&Reading>,
    now: DateTime<Utc>,
) -> Status {
    if !plant.active {
        return StatusClass::Inactive.into();
    }

    let Some(reading) = latest else {
        return StatusClass::NoData.into();
    };

    let hours_since = (now - reading.timestamp).num_milliseconds() as f64 / 3_600_000.0;
    let class = if hours_since < 2.0 {
        StatusClass::Active
    } else if hours_since < 24.0 {
        StatusClass::Stale
    } else {
        StatusClass::Disconnected
    };
    class.into()
}

/// How far current conditions sit from a plant's optimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConditionRating {
    Excellent,
    Good,
    Warning,
    Danger,
}

/// Rate a measured value against its optimum with a tolerance band:
/// within half the tolerance is `Excellent`, within it `Good`, within
/// one-and-a-half times `Warning`, beyond that `Danger`.
pub fn rate_conditions(current: f64, optimal: f64, tolerance: f64) -> ConditionRating {
    let diff = (current - optimal).abs();
    if diff <= tolerance * 0.5 {
        ConditionRating::Excellent
    } else if diff <= tolerance {
        ConditionRating::Good
    } else if diff <= tolerance * 1.5 {
        ConditionRating::Warning
    } else {
        ConditionRating::Danger
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn plant(active: bool) -> SupervisedPlant {
        SupervisedPlant {
            id: "sp1".to_owned(),
            catalog_plant_id: "cat1".to_owned(),
            display_name: "Test fern".to_owned(),
            location: None,
            notes: None,
            active,
            started_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn reading_aged(now: DateTime<Utc>, minutes_old: i64) -> Reading {
        Reading {
            id: "r1".to_owned(),
            plant_id: "sp1".to_owned(),
            soil_humidity: Some(50.0),
            air_humidity: Some(50.0),
            temperature_c: Some(21.0),
            light_level: Some(100.0),
            timestamp: now - Duration::minutes(minutes_old),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn inactive_plant_wins_over_everything() {
        let now = now();
        let r = reading_aged(now, 1);
        let status = derive_status(&plant(false), Some(&r), now);
        assert_eq!(status.class, StatusClass::Inactive);
        assert_eq!(status.label, "Monitoring paused");
    }

    #[test]
    fn missing_reading_is_no_data() {
        let status = derive_status(&plant(true), None, now());
        assert_eq!(status.class, StatusClass::NoData);
    }

    #[test]
    fn fresh_reading_is_active() {
        let now = now();
        let r = reading_aged(now, 30);
        assert_eq!(derive_status(&plant(true), Some(&r), now).class, StatusClass::Active);
    }

    #[test]
    fn boundaries_between_active_stale_and_disconnected() {
        let now = now();

        // 1.999 h old → active
        let r = reading_aged(now, 0);
        let just_under_two = Reading {
            timestamp: now - Duration::milliseconds(2 * 3_600_000 - 1),
            ..r.clone()
        };
        assert_eq!(
            derive_status(&plant(true), Some(&just_under_two), now).class,
            StatusClass::Active
        );

        // exactly 2 h old → stale
        let exactly_two = Reading {
            timestamp: now - Duration::hours(2),
            ..r.clone()
        };
        assert_eq!(
            derive_status(&plant(true), Some(&exactly_two), now).class,
            StatusClass::Stale
        );

        // 23.999 h old → stale
        let just_under_day = Reading {
            timestamp: now - Duration::milliseconds(24 * 3_600_000 - 1),
            ..r.clone()
        };
        assert_eq!(
            derive_status(&plant(true), Some(&just_under_day), now).class,
            StatusClass::Stale
        );

        // exactly 24 h old → disconnected
        let exactly_day = Reading {
            timestamp: now - Duration::hours(24),
            ..r
        };
        assert_eq!(
            derive_status(&plant(true), Some(&exactly_day), now).class,
            StatusClass::Disconnected
        );
    }

    #[test]
    fn condition_rating_bands() {
        // optimum 60, tolerance 10
        assert_eq!(rate_conditions(62.0, 60.0, 10.0), ConditionRating::Excellent);
        assert_eq!(rate_conditions(52.0, 60.0, 10.0), ConditionRating::Good);
        assert_eq!(rate_conditions(73.0, 60.0, 10.0), ConditionRating::Warning);
        assert_eq!(rate_conditions(90.0, 60.0, 10.0), ConditionRating::Danger);
    }
}
