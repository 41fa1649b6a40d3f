//! Calculation driver.
//!
//! Runs a batch of activity events through lookup, calculation and emission
//! with bounded parallelism. Each event is independent: a failure is retried
//! if it is transient, otherwise reported as a [`Rejection`], and never stops
//! the rest of the batch.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use ghg_core::{
  CalculationError, EmitError,
  calculate::Calculator,
  emission::{CalculatedEmission, Rejection},
  emit::Emitter,
  event::ActivityEvent,
  store::{EmissionStore, FactorStore},
};
use tokio::{sync::Semaphore, task::JoinSet, time::timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{config::CalculatorConfig, error::EventError, input::EventBatch};

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts per event, including the first.
  pub max_attempts:    u32,
  /// Delay before the second attempt; doubles after each further failure.
  pub initial_backoff: Duration,
}

impl RetryPolicy {
  fn backoff(&self, attempt: u32) -> Duration {
    self
      .initial_backoff
      .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 3, initial_backoff: Duration::from_millis(100) }
  }
}

/// Outcome of one [`Driver::run`].
#[derive(Debug)]
pub struct RunSummary {
  pub run_id:    Uuid,
  /// Events read, including malformed lines.
  pub processed: usize,
  /// Successful results, in input order.
  pub emitted:   Vec<CalculatedEmission>,
  pub rejected:  Vec<Rejection>,
}

enum Outcome {
  Emitted(CalculatedEmission),
  Rejected(Rejection),
}

// ─── Driver ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Driver<S> {
  store:       S,
  calculator:  Arc<Calculator>,
  concurrency: usize,
  io_timeout:  Duration,
  retry:       RetryPolicy,
}

impl<S> Driver<S>
where
  S: FactorStore + EmissionStore + Clone + 'static,
{
  pub fn new(store: S, calculator: Calculator) -> Self {
    Self {
      store,
      calculator: Arc::new(calculator),
      concurrency: 8,
      io_timeout: Duration::from_secs(5),
      retry: RetryPolicy::default(),
    }
  }

  pub fn from_config(store: S, cfg: &CalculatorConfig) -> Self {
    Self::new(store, cfg.calculator())
      .with_concurrency(cfg.concurrency)
      .with_io_timeout(cfg.io_timeout())
      .with_retry(cfg.retry_policy())
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
    self.io_timeout = io_timeout;
    self
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = RetryPolicy { max_attempts: retry.max_attempts.max(1), ..retry };
    self
  }

  /// Process every event in `batch` and record each failure.
  pub async fn run(&self, batch: EventBatch) -> RunSummary {
    let run_id = Uuid::new_v4();
    let processed = batch.len();
    info!(
      %run_id,
      events = processed,
      standard = self.calculator.standard().as_str(),
      "starting calculation run"
    );

    let mut rejected = Vec::new();
    for line in batch.malformed {
      rejected.push(self.reject(run_id, line.id(), "malformed_event", line.message).await);
    }

    let ids: Vec<String> = batch.events.iter().map(|e| e.activity_event_id.clone()).collect();

    // Events sharing an id run one after another in input order, so the
    // stored row is always the last of them.
    let mut groups: Vec<Vec<(usize, ActivityEvent)>> = Vec::new();
    let mut group_of: HashMap<String, usize> = HashMap::new();
    for (index, event) in batch.events.into_iter().enumerate() {
      let slot = *group_of.entry(event.activity_event_id.clone()).or_insert_with(|| {
        groups.push(Vec::new());
        groups.len() - 1
      });
      groups[slot].push((index, event));
    }
    if groups.len() < ids.len() {
      debug!(%run_id, repeated = ids.len() - groups.len(), "events with repeated ids run in order");
    }

    let semaphore = Arc::new(Semaphore::new(self.concurrency));
    let mut tasks = JoinSet::new();

    for group in groups {
      let driver = self.clone();
      let semaphore = Arc::clone(&semaphore);
      tasks.spawn(async move {
        let _permit = semaphore.acquire_owned().await.ok();
        let mut outcomes = Vec::with_capacity(group.len());
        for (index, event) in group {
          outcomes.push((index, driver.handle(run_id, event).await));
        }
        outcomes
      });
    }

    let mut emitted = Vec::new();
    let mut finished = vec![false; ids.len()];
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(outcomes) => {
          for (index, outcome) in outcomes {
            finished[index] = true;
            match outcome {
              Outcome::Emitted(emission) => emitted.push((index, emission)),
              Outcome::Rejected(rejection) => rejected.push(rejection),
            }
          }
        }
        Err(e) => error!(%run_id, error = %e, "calculation task failed"),
      }
    }

    // A task that panicked still owes its event a report.
    for (index, id) in ids.into_iter().enumerate() {
      if !finished[index] {
        rejected.push(
          self
            .reject(run_id, id, "task_failed", "calculation task aborted".into())
            .await,
        );
      }
    }

    emitted.sort_by_key(|(index, _)| *index);
    let emitted: Vec<_> = emitted.into_iter().map(|(_, emission)| emission).collect();

    info!(
      %run_id,
      processed,
      emitted = emitted.len(),
      rejected = rejected.len(),
      "calculation run finished"
    );

    RunSummary { run_id, processed, emitted, rejected }
  }

  async fn handle(&self, run_id: Uuid, event: ActivityEvent) -> Outcome {
    match self.process(&event).await {
      Ok(emission) => Outcome::Emitted(emission),
      Err(e) => Outcome::Rejected(
        self
          .reject(run_id, event.activity_event_id, e.kind(), e.to_string())
          .await,
      ),
    }
  }

  /// Run one event, retrying transient failures with exponential backoff.
  async fn process(&self, event: &ActivityEvent) -> Result<CalculatedEmission, EventError> {
    let mut attempt = 1;
    loop {
      match self.attempt(event).await {
        Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
          let backoff = self.retry.backoff(attempt);
          warn!(
            event = %event.activity_event_id,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %e,
            "retrying event"
          );
          tokio::time::sleep(backoff).await;
          attempt += 1;
        }
        result => return result,
      }
    }
  }

  async fn attempt(&self, event: &ActivityEvent) -> Result<CalculatedEmission, EventError> {
    let factor = timeout(self.io_timeout, self.calculator.resolve(&self.store, event))
      .await
      .map_err(|_| CalculationError::Timeout)??;

    let emission = self.calculator.compute(event, &factor)?;

    timeout(self.io_timeout, Emitter::new(&self.store).emit(&emission))
      .await
      .map_err(|_| EmitError::Timeout)??;

    debug!(event = %event.activity_event_id, "event processed");
    Ok(emission)
  }

  /// Log and persist a rejection. A rejection that cannot be persisted is
  /// still returned in the run summary.
  async fn reject(
    &self,
    run_id: Uuid,
    activity_event_id: String,
    kind: &str,
    message: String,
  ) -> Rejection {
    warn!(%run_id, event = %activity_event_id, kind, %message, "event rejected");

    let rejection = Rejection {
      run_id,
      activity_event_id,
      kind: kind.to_owned(),
      message,
      recorded_at: Utc::now(),
    };

    match timeout(self.io_timeout, self.store.record_rejection(&rejection)).await {
      Ok(Ok(())) => {}
      Ok(Err(e)) => {
        error!(event = %rejection.activity_event_id, error = %e, "failed to record rejection");
      }
      Err(_) => {
        error!(event = %rejection.activity_event_id, "recording rejection timed out");
      }
    }
    rejection
  }
}
