use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{sync::Mutex, time};
use tracing::{error, info, warn};

use crate::{
    alerts::{evaluate, AlertLedger, RuleStore},
    cache::TtlCache,
    models::SupervisedPlant,
    plants_api::PlantsApiClient,
    sync::Connectivity,
};

/// Cache key for the supervised-plant list (a single shared entry, reused
/// by the HTTP handlers).
pub const PLANTS_KEY: &str = "supervised_plants";

/// Background loop that turns new readings into alerts.
///
/// Every interval it fetches the supervised plants (through the shared TTL
/// cache), pulls the latest reading per active plant, evaluates that
/// plant's rules, and appends any violations to the ledger. A reading that
/// was already evaluated in a previous cycle is skipped, so a sensor that
/// stops reporting does not re-alert every tick. Poll outcomes drive the
/// connectivity signal that the sync coordinator listens to.
pub struct MonitorService {
    api: PlantsApiClient,
    plants: TtlCache<&'static str, Vec<SupervisedPlant>>,
    rules: RuleStore,
    ledger: AlertLedger,
    connectivity: Connectivity,
    interval: Duration,
    /// plant id → id of the last reading evaluated for it.
    seen: Arc<Mutex<HashMap<String, String>>>,
}

impl MonitorService {
    pub fn new(
        api: PlantsApiClient,
        plants: TtlCache<&'static str, Vec<SupervisedPlant>>,
        rules: RuleStore,
        ledger: AlertLedger,
        connectivity: Connectivity,
        interval_secs: u64,
    ) -> Self {
        Self {
            api,
            plants,
            rules,
            ledger,
            connectivity,
            interval: Duration::from_secs(interval_secs),
            seen: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs the monitoring loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "monitor loop started");
        let mut ticker = time::interval(self.interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once().await {
                error!(error = %e, "monitor iteration failed");
            }
        }
    }

    /// One full evaluation pass over every active supervised plant.
    pub async fn poll_once(&self) -> Result<()> {
        let api = self.api.clone();
        let connectivity = self.connectivity.clone();
        let plants = self
            .plants
            .get_or_fetch(PLANTS_KEY, move || async move {
                let plants = api.fetch_supervised_plants().await?;
                // Only real upstream contact marks the service online; a
                // cache hit must not.
                connectivity.set_online();
                Ok(plants)
            })
            .await;

        let plants = match plants {
            Ok(plants) => plants,
            Err(e) => {
                // The plants API is unreachable; queue writes until it returns.
                self.connectivity.set_offline();
                return Err(e);
            }
        };

        for plant in plants.iter().filter(|p| p.active) {
            if let Err(e) = self.evaluate_plant(plant).await {
                warn!(plant_id = %plant.id, error = %e, "failed to evaluate plant");
            }
        }

        Ok(())
    }

    async fn evaluate_plant(&self, plant: &SupervisedPlant) -> Result<()> {
        let Some(reading) = self.api.fetch_latest_reading(&plant.id).await? else {
            return Ok(());
        };

        {
            let mut seen = self.seen.lock().await;
            match seen.get(&plant.id) {
                Some(last) if *last == reading.id => return Ok(()),
                _ => {
                    seen.insert(plant.id.clone(), reading.id.clone());
                }
            }
        }

        let rules = self.rules.list_for_plant(&plant.id).await;
        if rules.is_empty() {
            return Ok(());
        }

        let events = evaluate(&reading, plant, &rules);
        if events.is_empty() {
            return Ok(());
        }

        info!(plant_id = %plant.id, count = events.len(), "threshold violations detected");
        self.ledger.append_all(events).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{config::Config, storage::KvStore};

    fn config(dir: &tempfile::TempDir) -> Config {
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

    fn plant(id: &str) -> SupervisedPlant {
        SupervisedPlant {
            id: id.to_owned(),
            catalog_plant_id: "cat1".to_owned(),
            display_name: "Test fern".to_owned(),
            location: None,
            notes: None,
            active: true,
            started_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    async fn service(
        dir: &tempfile::TempDir,
        online: bool,
    ) -> (MonitorService, Connectivity, TtlCache<&'static str, Vec<SupervisedPlant>>) {
        let config = config(dir);
        let store = KvStore::new(dir.path());
        let api = PlantsApiClient::new(&config).unwrap();
        let connectivity = Connectivity::new(online);
        let plants = TtlCache::new(std::time::Duration::from_secs(config.cache_ttl_secs));

        let monitor = MonitorService::new(
            api,
            plants.clone(),
            RuleStore::load(store.clone()).await,
            AlertLedger::load(store).await,
            connectivity.clone(),
            config.poll_interval_secs,
        );
        (monitor, connectivity, plants)
    }

    #[tokio::test]
    async fn failed_poll_flips_connectivity_offline() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, connectivity, _plants) = service(&dir, true).await;

        // Nothing listens on the configured port, so the fetch fails.
        assert!(monitor.poll_once().await.is_err());
        assert!(!connectivity.is_online());
    }

    #[tokio::test]
    async fn cached_plants_do_not_flip_connectivity_online() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, connectivity, plants) = service(&dir, false).await;

        // Warm the cache without any upstream contact.
        plants
            .get_or_fetch(PLANTS_KEY, || async { Ok(vec![plant("sp1")]) })
            .await
            .unwrap();

        // The cache hit satisfies the poll, so the service must stay
        // offline until a real fetch succeeds.
        monitor.poll_once().await.unwrap();
        assert!(!connectivity.is_online());
    }
}
