use std::time::{SystemTime, UNIX_EPOCH};

use comms::specs::Metrics;
use parking_lot::RwLock;
use serde::Serialize;

use crate::{GlobalMetrics, Rejection, RunError, TrainingConfig};

/// Returns the current time as Unix epoch milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// The metrics one client reported for one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientMetrics {
    pub client_id: String,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// A client that didn't contribute to a round, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientFailure {
    pub client_id: String,
    pub reason: String,
}

/// The outcome of one round. Appended once, never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub round: usize,
    pub client_metrics: Vec<ClientMetrics>,
    pub failures: Vec<ClientFailure>,
    /// `None` when every client failed.
    pub average_metrics: Option<Metrics>,
    pub timestamp: u64,
}

/// A snapshot of the orchestrator's progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingStatus {
    pub is_training: bool,
    pub current_round: usize,
    pub total_rounds: usize,
    pub round_history: Vec<RoundRecord>,
    /// The per-client metrics of the latest recorded round.
    pub client_metrics: Vec<ClientMetrics>,
    pub global_metrics: Option<GlobalMetrics>,
    pub error: Option<String>,
    pub last_updated: Option<u64>,
    pub config: Option<TrainingConfig>,
}

/// The completed rounds of the latest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct History {
    pub round_history: Vec<RoundRecord>,
    pub total_rounds_completed: usize,
    pub global_metrics: Option<GlobalMetrics>,
}

struct Inner {
    run: u64,
    status: TrainingStatus,
}

/// The single owner of `TrainingStatus`.
///
/// Every run gets its own id when it starts, writes tagged with an older id are
/// dropped so a stale run can never touch a newer run's status.
pub(crate) struct StatusStore {
    inner: RwLock<Inner>,
}

impl StatusStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                run: 0,
                status: TrainingStatus::default(),
            }),
        }
    }

    /// Atomically checks that no run is active and that there are clients, then
    /// resets the status for a new run.
    ///
    /// The client count is taken by the caller, this lock is never held across a
    /// registry read.
    ///
    /// # Arguments
    /// * `config` - The configuration of the new run.
    /// * `clients` - The amount of registered clients.
    ///
    /// # Returns
    /// The id of the new run or the reason it was refused.
    pub(crate) fn begin_run(
        &self,
        config: TrainingConfig,
        clients: usize,
    ) -> Result<u64, Rejection> {
        let mut inner = self.inner.write();

        if inner.status.is_training {
            return Err(Rejection::AlreadyRunning);
        }

        if clients == 0 {
            return Err(Rejection::NoClients);
        }

        inner.run += 1;
        inner.status = TrainingStatus {
            is_training: true,
            total_rounds: config.rounds.get(),
            config: Some(config),
            last_updated: Some(now_millis()),
            ..TrainingStatus::default()
        };

        Ok(inner.run)
    }

    /// Advances `current_round` for the given run.
    ///
    /// # Returns
    /// The new round number, or `None` if the run is stale or was stopped.
    pub(crate) fn begin_round(&self, run: u64) -> Option<usize> {
        let mut inner = self.inner.write();
        if inner.run != run || !inner.status.is_training {
            return None;
        }

        inner.status.current_round += 1;
        inner.status.last_updated = Some(now_millis());
        Some(inner.status.current_round)
    }

    /// Appends a round's record. A round that was in flight when the run got stopped
    /// is still recorded, keeping `current_round` equal to the recorded rounds.
    pub(crate) fn push_round(&self, run: u64, record: RoundRecord) {
        let mut inner = self.inner.write();
        if inner.run != run {
            return;
        }

        let status = &mut inner.status;
        status.client_metrics = record.client_metrics.clone();
        status.round_history.push(record);
        if !status.is_training {
            status.current_round = status.round_history.len();
        }
        status.last_updated = Some(now_millis());
    }

    /// Records the evaluation of a run that completed every round. Dropped if the run
    /// got stopped in the meantime.
    pub(crate) fn finish(&self, run: u64, global_metrics: GlobalMetrics) {
        let mut inner = self.inner.write();
        if inner.run != run || !inner.status.is_training {
            return;
        }

        let status = &mut inner.status;
        status.is_training = false;
        status.global_metrics = Some(global_metrics);
        status.last_updated = Some(now_millis());
    }

    pub(crate) fn fail(&self, run: u64, error: &RunError) {
        let mut inner = self.inner.write();
        if inner.run != run {
            return;
        }

        let status = &mut inner.status;
        status.is_training = false;
        status.error = Some(error.to_string());
        status.last_updated = Some(now_millis());
    }

    /// Marks the active run as stopped.
    ///
    /// # Returns
    /// The id of the stopped run and the rounds it completed, or `NotRunning`.
    pub(crate) fn stop(&self) -> Result<(u64, usize), Rejection> {
        let mut inner = self.inner.write();
        if !inner.status.is_training {
            return Err(Rejection::NotRunning);
        }

        let run = inner.run;
        let status = &mut inner.status;
        let completed = status.round_history.len();

        status.is_training = false;
        status.current_round = completed;
        status.last_updated = Some(now_millis());

        Ok((run, completed))
    }

    pub(crate) fn snapshot(&self) -> TrainingStatus {
        self.inner.read().status.clone()
    }

    pub(crate) fn history(&self) -> History {
        let inner = self.inner.read();

        History {
            round_history: inner.status.round_history.clone(),
            total_rounds_completed: inner.status.round_history.len(),
            global_metrics: inner.status.global_metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use serde_json::json;

    use super::*;

    fn config(rounds: usize) -> TrainingConfig {
        TrainingConfig::with_rounds(NonZeroUsize::new(rounds).unwrap())
    }

    fn record(round: usize) -> RoundRecord {
        RoundRecord {
            round,
            client_metrics: vec![],
            failures: vec![],
            average_metrics: None,
            timestamp: now_millis(),
        }
    }

    fn global(loss: f64) -> GlobalMetrics {
        GlobalMetrics {
            metrics: Metrics::new(0.9, 0.8, 0.7, 0.75, loss),
            total_test_samples: 40,
        }
    }

    fn scored(round: usize, client_id: &str) -> RoundRecord {
        RoundRecord {
            client_metrics: vec![ClientMetrics {
                client_id: client_id.into(),
                metrics: Metrics::new(0.5, 0.5, 0.5, 0.5, 0.5),
            }],
            ..record(round)
        }
    }

    #[test]
    fn begin_run_checks_running_before_clients() {
        let store = StatusStore::new();

        assert_eq!(store.begin_run(config(2), 0), Err(Rejection::NoClients));
        assert_eq!(store.begin_run(config(2), 1), Ok(1));
        assert_eq!(store.begin_run(config(2), 0), Err(Rejection::AlreadyRunning));

        let status = store.snapshot();
        assert!(status.is_training);
        assert_eq!(status.total_rounds, 2);
        assert_eq!(status.current_round, 0);
    }

    #[test]
    fn stale_runs_cannot_write() {
        let store = StatusStore::new();
        let old = store.begin_run(config(3), 1).unwrap();
        store.stop().unwrap();
        let new = store.begin_run(config(3), 1).unwrap();

        store.push_round(old, record(1));
        store.fail(old, &RunError::ConsecutiveFailures { rounds: 3 });
        assert_eq!(store.begin_round(old), None);

        let status = store.snapshot();
        assert!(status.is_training);
        assert!(status.round_history.is_empty());
        assert_eq!(status.error, None);
        assert_eq!(store.begin_round(new), Some(1));
    }

    #[test]
    fn stop_reports_completed_rounds_and_keeps_late_records() {
        let store = StatusStore::new();
        let run = store.begin_run(config(5), 1).unwrap();

        store.begin_round(run);
        store.push_round(run, record(1));
        store.begin_round(run);

        assert_eq!(store.stop(), Ok((run, 1)));
        assert_eq!(store.snapshot().current_round, 1);
        assert_eq!(store.stop(), Err(Rejection::NotRunning));

        store.push_round(run, record(2));
        let status = store.snapshot();
        assert_eq!(status.current_round, 2);
        assert_eq!(store.history().total_rounds_completed, 2);
        assert_eq!(store.begin_round(run), None);
    }

    #[test]
    fn finish_after_stop_is_dropped() {
        let store = StatusStore::new();
        let run = store.begin_run(config(1), 1).unwrap();
        store.begin_round(run);
        store.push_round(run, record(1));

        store.stop().unwrap();
        store.finish(run, global(0.3));

        let status = store.snapshot();
        assert!(!status.is_training);
        assert_eq!(status.global_metrics, None);
        assert_eq!(store.history().global_metrics, None);
    }

    #[test]
    fn client_metrics_follow_the_latest_round() {
        let store = StatusStore::new();
        let run = store.begin_run(config(2), 1).unwrap();

        store.push_round(run, scored(1, "a"));
        store.push_round(run, scored(2, "b"));

        let status = store.snapshot();
        assert_eq!(status.client_metrics.len(), 1);
        assert_eq!(status.client_metrics[0].client_id, "b");

        store.stop().unwrap();
        store.begin_run(config(2), 1).unwrap();
        assert!(store.snapshot().client_metrics.is_empty());
    }

    #[test]
    fn status_serializes_non_finite_metrics_as_null() {
        let store = StatusStore::new();
        let run = store.begin_run(config(1), 1).unwrap();
        store.finish(run, global(f64::NAN));

        let value = serde_json::to_value(store.snapshot()).unwrap();
        assert_eq!(value["is_training"], json!(false));
        assert_eq!(value["global_metrics"]["accuracy"], json!(0.9));
        assert_eq!(value["global_metrics"]["loss"], json!(null));
        assert_eq!(value["global_metrics"]["total_test_samples"], json!(40));
        assert_eq!(value["config"]["rounds"], json!(1));
    }

    #[test]
    fn client_metrics_are_flattened() {
        let entry = ClientMetrics {
            client_id: "a".into(),
            metrics: Metrics::new(0.5, 0.5, 0.5, 0.5, 0.25),
        };

        assert_eq!(
            serde_json::to_value(entry).unwrap(),
            json!({
                "client_id": "a",
                "accuracy": 0.5,
                "precision": 0.5,
                "recall": 0.5,
                "f1_score": 0.5,
                "loss": 0.25,
            })
        );
    }
}
