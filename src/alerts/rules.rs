use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::{
    models::{AlertKind, AlertRule},
    storage::{KvStore, StorageError},
};

/// Storage key for the persisted rules blob.
const RULES_KEY: &str = "alert_rules";

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule threshold must be a finite number, got {0}")]
    InvalidThreshold(f64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Durable CRUD store of per-plant alert rules.
///
/// At most one rule exists per `(plant_id, kind)`; saving replaces any
/// previous rule of the same kind for the same plant.
#[derive(Clone)]
pub struct RuleStore {
    store: KvStore,
    inner: Arc<RwLock<Vec<AlertRule>>>,
}

impl RuleStore {
    /// Load persisted rules, starting empty when the blob is missing or
    /// unreadable.
    pub async fn load(store: KvStore) -> Self {
        let rules = match store.read::<Vec<AlertRule>>(RULES_KEY).await {
            Ok(Some(rules)) => rules,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "could not load persisted alert rules, starting empty");
                Vec::new()
            }
        };

        Self {
            store,
            inner: Arc::new(RwLock::new(rules)),
        }
    }

    /// Upsert `rule`, replacing any existing rule with the same id or the
    /// same `(plant_id, kind)`.
    pub async fn save(&self, rule: AlertRule) -> Result<(), RuleError> {
        if !rule.threshold.is_finite() {
            return Err(RuleError::InvalidThreshold(rule.threshold));
        }

        let mut rules = self.inner.write().await;
        rules.retain(|r| {
            r.id != rule.id && !(r.plant_id == rule.plant_id && r.kind == rule.kind)
        });
        rules.push(rule);
        self.store.write(RULES_KEY, &*rules).await?;
        Ok(())
    }

    /// All rules for one plant, enabled or not.
    pub async fn list_for_plant(&self, plant_id: &str) -> Vec<AlertRule> {
        self.inner
            .read()
            .await
            .iter()
            .filter(|r| r.plant_id == plant_id)
            .cloned()
            .collect()
    }

    /// Every stored rule, across all plants.
    pub async fn list_all(&self) -> Vec<AlertRule> {
        self.inner.read().await.clone()
    }

    /// The rule of `kind` for `plant_id`, if one exists.
    pub async fn get(&self, plant_id: &str, kind: AlertKind) -> Option<AlertRule> {
        self.inner
            .read()
            .await
            .iter()
            .find(|r| r.plant_id == plant_id && r.kind == kind)
            .cloned()
    }

    /// Delete the rule with `id`. Unknown ids are a no-op.
    pub async fn delete(&self, id: &str) -> Result<(), RuleError> {
        let mut rules = self.inner.write().await;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        if rules.len() == before {
            return Ok(());
        }
        self.store.write(RULES_KEY, &*rules).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, plant_id: &str, kind: AlertKind, threshold: f64) -> AlertRule {
        AlertRule {
            id: id.to_owned(),
            plant_id: plant_id.to_owned(),
            kind,
            threshold,
            enabled: true,
        }
    }

    async fn store() -> (tempfile::TempDir, RuleStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RuleStore::load(KvStore::new(dir.path())).await;
        (dir, store)
    }

    #[tokio::test]
    async fn save_then_list_round_trips() {
        let (_dir, rules) = store().await;
        rules
            .save(rule("a", "sp1", AlertKind::SoilHumidityLow, 30.0))
            .await
            .unwrap();

        let got = rules.list_for_plant("sp1").await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].threshold, 30.0);
    }

    #[tokio::test]
    async fn same_kind_replaces_instead_of_duplicating() {
        let (_dir, rules) = store().await;
        rules
            .save(rule("a", "sp1", AlertKind::SoilHumidityLow, 30.0))
            .await
            .unwrap();
        rules
            .save(rule("b", "sp1", AlertKind::SoilHumidityLow, 20.0))
            .await
            .unwrap();

        let got = rules.list_for_plant("sp1").await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "b");
        assert_eq!(got[0].threshold, 20.0);
    }

    #[tokio::test]
    async fn same_kind_for_other_plant_is_kept() {
        let (_dir, rules) = store().await;
        rules
            .save(rule("a", "sp1", AlertKind::TemperatureHigh, 28.0))
            .await
            .unwrap();
        rules
            .save(rule("b", "sp2", AlertKind::TemperatureHigh, 32.0))
            .await
            .unwrap();

        assert_eq!(rules.list_all().await.len(), 2);
        assert_eq!(rules.list_for_plant("sp1").await.len(), 1);
    }

    #[tokio::test]
    async fn non_finite_threshold_is_rejected() {
        let (_dir, rules) = store().await;
        let got = rules
            .save(rule("a", "sp1", AlertKind::TemperatureHigh, f64::NAN))
            .await;

        assert!(matches!(got, Err(RuleError::InvalidThreshold(_))));
        assert!(rules.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_only_the_matching_rule() {
        let (_dir, rules) = store().await;
        rules
            .save(rule("a", "sp1", AlertKind::SoilHumidityLow, 30.0))
            .await
            .unwrap();
        rules
            .save(rule("b", "sp1", AlertKind::TemperatureHigh, 28.0))
            .await
            .unwrap();

        rules.delete("a").await.unwrap();
        rules.delete("not-there").await.unwrap();

        let got = rules.list_for_plant("sp1").await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "b");
    }

    #[tokio::test]
    async fn rules_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let rules = RuleStore::load(KvStore::new(dir.path())).await;
            rules
                .save(rule("a", "sp1", AlertKind::TemperatureLow, 5.0))
                .await
                .unwrap();
        }

        let reloaded = RuleStore::load(KvStore::new(dir.path())).await;
        let got = reloaded.get("sp1", AlertKind::TemperatureLow).await.unwrap();
        assert_eq!(got.threshold, 5.0);
    }
}
