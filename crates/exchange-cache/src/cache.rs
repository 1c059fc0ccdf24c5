use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use exchange_core::error::CacheError;
use exchange_core::model::{AppsSnapshot, DspRoster};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::loader::{load_apps, load_dsps};

/// The two independently updatable, lock-free snapshot holders. Readers
/// obtain the current `Arc` with one `load()`; writers publish with one
/// `store()`.
#[derive(Clone, Default)]
pub struct State {
    pub apps: Arc<ArcSwap<AppsSnapshot>>,
    pub dsps: Arc<ArcSwap<DspRoster>>,
}

impl State {
    pub fn new() -> Self {
        Self {
            apps: Arc::new(ArcSwap::from_pointee(AppsSnapshot::default())),
            dsps: Arc::new(ArcSwap::from_pointee(DspRoster::default())),
        }
    }
}

/// Periodically reloads the apps snapshot and DSP roster from their
/// configured JSON sources and publishes each atomically.
pub struct Cache {
    state: State,
    apps_path: String,
    dsps_path: String,
    ticker: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    stop: CancellationToken,
}

impl Cache {
    pub fn new(state: State, apps_path: impl Into<String>, dsps_path: impl Into<String>) -> Self {
        Self {
            state,
            apps_path: apps_path.into(),
            dsps_path: dsps_path.into(),
            ticker: std::sync::Mutex::new(None),
            stop: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state.clone()
    }

    /// Runs both plan entries concurrently. Returns once both have completed;
    /// `Err` if either failed, but a failed entry leaves its previously
    /// published snapshot untouched — the two entries never interact.
    pub async fn load(&self) -> Result<(), CacheError> {
        let apps_path = self.apps_path.clone();
        let dsps_path = self.dsps_path.clone();
        let apps_state = self.state.apps.clone();
        let dsps_state = self.state.dsps.clone();

        let (apps_res, dsps_res) = tokio::join!(
            reload_apps(apps_path, apps_state),
            reload_dsps(dsps_path, dsps_state),
        );

        match (apps_res, dsps_res) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Err(err), Err(_)) => Err(err),
        }
    }

    /// Launches the background reload ticker. Errors are logged and do not
    /// abort the schedule.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let this = self.clone();
        let stop = self.stop.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; the caller already ran the
            // blocking initial load, so skip it here.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => {
                        info!("cache reload ticker stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = this.load().await {
                            warn!(error = %err, "cache reload failed; previous snapshot retained");
                        }
                    }
                }
            }
        });
        *self.ticker.lock().expect("ticker mutex poisoned") = Some(handle);
    }

    /// Signals the ticker to stop. In-flight loads continue until they
    /// finish on their own.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

async fn reload_apps(path: String, state: Arc<ArcSwap<AppsSnapshot>>) -> Result<(), CacheError> {
    let snapshot = tokio::task::spawn_blocking(move || load_apps(&path))
        .await
        .map_err(|err| CacheError::Io(format!("join error: {err}")))??;
    let len = snapshot.len();
    state.store(Arc::new(snapshot));
    info!(count = len, "published apps snapshot");
    Ok(())
}

async fn reload_dsps(path: String, state: Arc<ArcSwap<DspRoster>>) -> Result<(), CacheError> {
    let snapshot = tokio::task::spawn_blocking(move || load_dsps(&path))
        .await
        .map_err(|err| CacheError::Io(format!("join error: {err}")))??;
    let len = snapshot.len();
    state.store(Arc::new(snapshot));
    info!(count = len, "published dsp roster");
    Ok(())
}

/// Runs the initial load; fails the process on error (the caller is expected
/// to log at `error` and exit non-zero).
pub async fn initial_load(cache: &Cache) -> Result<(), CacheError> {
    match cache.load().await {
        Ok(()) => Ok(()),
        Err(err) => {
            error!(error = %err, "initial cache load failed");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn apps_json(ids: &[i64]) -> String {
        let entries: Vec<String> = ids
            .iter()
            .map(|id| format!(r#"{{"id":{id},"name":"app-{id}","publisher":{{"id":1,"name":"publisher-1"}}}}"#))
            .collect();
        format!("[{}]", entries.join(","))
    }

    #[tokio::test]
    async fn initial_load_publishes_both_snapshots() {
        let apps = write_tmp(&apps_json(&[1, 2, 3]));
        let dsps = write_tmp(r#"[{"id":1,"name":"a","endpoint":"https://a/bid"}]"#);
        let cache = Cache::new(
            State::new(),
            apps.path().to_str().unwrap(),
            dsps.path().to_str().unwrap(),
        );

        initial_load(&cache).await.unwrap();

        let state = cache.state();
        assert_eq!(state.apps.load().len(), 3);
        assert_eq!(state.dsps.load().len(), 1);
    }

    #[tokio::test]
    async fn initial_load_fails_on_missing_source() {
        let dsps = write_tmp(r#"[]"#);
        let cache = Cache::new(State::new(), "/nonexistent/apps.json", dsps.path().to_str().unwrap());
        assert!(initial_load(&cache).await.is_err());
    }

    #[tokio::test]
    async fn failed_reload_leaves_previous_snapshot_untouched() {
        let apps = write_tmp(&apps_json(&[1, 2]));
        let dsps = write_tmp(r#"[]"#);
        let cache = Cache::new(
            State::new(),
            apps.path().to_str().unwrap(),
            dsps.path().to_str().unwrap(),
        );
        initial_load(&cache).await.unwrap();
        assert_eq!(cache.state().apps.load().len(), 2);

        std::fs::write(apps.path(), "not json").unwrap();
        assert!(cache.load().await.is_err());

        // The previously published snapshot survives the failed reload.
        assert_eq!(cache.state().apps.load().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_readers_see_consistent_snapshots_across_a_reload() {
        let apps = write_tmp(&apps_json(&[1, 2]));
        let dsps = write_tmp(r#"[]"#);
        let cache = Arc::new(Cache::new(
            State::new(),
            apps.path().to_str().unwrap(),
            dsps.path().to_str().unwrap(),
        ));
        initial_load(&cache).await.unwrap();

        let mut readers = tokio::task::JoinSet::new();
        for _ in 0..50 {
            let state = cache.state();
            readers.spawn(async move {
                let snapshot = state.apps.load();
                // Every observed snapshot must be a fully-formed publication:
                // either the 2-app or the 5-app generation, never a partial one.
                let len = snapshot.len();
                assert!(len == 2 || len == 5, "torn read: len={len}");
            });
        }

        std::fs::write(apps.path(), apps_json(&[1, 2, 3, 4, 5])).unwrap();
        cache.load().await.unwrap();

        while readers.join_next().await.is_some() {}
        assert_eq!(cache.state().apps.load().len(), 5);
    }
}
