//! Fixed-resolution job scheduler.
//!
//! One coarse tick drives every registered job. A job fires once more than
//! its interval has elapsed since it last fired; `last_run` is stamped with
//! the tick time at firing, not at completion. Each firing runs on its own
//! tokio task and is never awaited by the loop. Panics and errors are caught
//! per execution and never reach the loop or other jobs. Each execution runs
//! inside a `job` span carrying the job name.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, info_span, warn, Instrument};

type Job = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

pub struct ScheduledTask {
    name: String,
    interval: Duration,
    job: Job,
    last_run: Option<Instant>,
    in_flight: Arc<AtomicBool>,
}

impl ScheduledTask {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_run(&self) -> Option<Instant> {
        self.last_run
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.last_run {
            Some(last) => now.saturating_duration_since(last) > self.interval,
            None => true,
        }
    }
}

pub struct Scheduler {
    resolution: Duration,
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn new(resolution: Duration) -> Self {
        Self {
            resolution,
            tasks: Vec::new(),
        }
    }

    /// Register a recurring job. Names are for logging only and need not be unique.
    pub fn schedule<F, Fut>(&mut self, name: impl Into<String>, job: F, interval: Duration)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        info!(job = %name, interval_secs = interval.as_secs(), "Job scheduled");
        self.tasks.push(ScheduledTask {
            name,
            interval,
            job: Arc::new(move || job().boxed()),
            last_run: None,
            in_flight: Arc::new(AtomicBool::new(false)),
        });
    }

    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    /// Drive all jobs until the process exits.
    pub async fn run(mut self) {
        info!(
            jobs = self.tasks.len(),
            resolution_secs = self.resolution.as_secs(),
            "Scheduler started"
        );
        let mut ticker = tokio::time::interval(self.resolution);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let now = ticker.tick().await;
            self.tick(now);
        }
    }

    /// One pass over the registered jobs. Returns the handles of the
    /// executions started on this tick; `run` drops them.
    pub fn tick(&mut self, now: Instant) -> Vec<JoinHandle<()>> {
        let mut fired = Vec::new();

        for task in &mut self.tasks {
            if !task.is_due(now) {
                continue;
            }

            // A job still running from an earlier tick is not fired again.
            if task.in_flight.swap(true, Ordering::SeqCst) {
                warn!(job = %task.name, "Job still running; skipping this tick");
                continue;
            }

            task.last_run = Some(now);
            // The span puts the job name on everything logged during the run,
            // including the panic hook's backtrace record.
            let span = info_span!("job", name = %task.name);
            fired.push(tokio::spawn(
                execute(
                    task.name.clone(),
                    Arc::clone(&task.job),
                    Arc::clone(&task.in_flight),
                )
                .instrument(span),
            ));
        }

        fired
    }
}

async fn execute(name: String, job: Job, in_flight: Arc<AtomicBool>) {
    let started = Instant::now();

    // Calling `job` inside the future keeps a panic in the closure itself
    // on the caught side of the boundary.
    let outcome = AssertUnwindSafe(async { job().await })
        .catch_unwind()
        .await;
    in_flight.store(false, Ordering::SeqCst);

    match outcome {
        Ok(Ok(())) => {
            info!(job = %name, elapsed_ms = started.elapsed().as_millis() as u64, "Job ran successfully");
        }
        Ok(Err(e)) => {
            error!(job = %name, error = ?e, "Job failed");
        }
        Err(panic) => {
            error!(job = %name, panic = %panic_message(panic.as_ref()), "Job panicked");
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
