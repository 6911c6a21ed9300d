//! Minimal job scheduler: fixed-interval and cron triggers, one tokio task
//! per job.
//!
//! A job never overlaps itself. Each task awaits its run before computing
//! the next firing, so interval ticks that elapse during a slow run are
//! skipped rather than queued.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub enum Trigger {
    Interval(Duration),
    Cron(Box<cron::Schedule>),
}

type JobFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct Job {
    name: String,
    trigger: Trigger,
    run: JobFn,
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<Job>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job<F, Fut>(&mut self, name: impl Into<String>, trigger: Trigger, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let run: JobFn = Arc::new(move || Box::pin(job()) as BoxFuture<'static, ()>);
        self.jobs.push(Job {
            name: name.into(),
            trigger,
            run,
        });
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name.as_str()).collect()
    }

    /// Spawn every job. Dropping the handles does not stop them.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        self.jobs
            .into_iter()
            .map(|job| {
                log::info!("[SCHEDULER] Starting job '{}' ({})", job.name, describe(&job.trigger));
                tokio::spawn(run_job(job))
            })
            .collect()
    }
}

fn describe(trigger: &Trigger) -> String {
    match trigger {
        Trigger::Interval(period) => format!("every {}s", period.as_secs()),
        Trigger::Cron(schedule) => match schedule.upcoming(Utc).next() {
            Some(next) => format!("cron, next at {}", next.to_rfc3339()),
            None => "cron, never fires".to_string(),
        },
    }
}

async fn run_job(job: Job) {
    match &job.trigger {
        Trigger::Interval(period) => {
            let start = tokio::time::Instant::now() + *period;
            let mut ticker = tokio::time::interval_at(start, *period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                run_once(&job).await;
            }
        }
        Trigger::Cron(schedule) => loop {
            let Some(wait) = next_fire_delay(schedule, Utc::now()) else {
                log::warn!("[SCHEDULER] Job '{}' has no upcoming firings, stopping", job.name);
                return;
            };
            tokio::time::sleep(wait).await;
            run_once(&job).await;
        },
    }
}

/// Run the job on its own task so a panic is contained and logged
async fn run_once(job: &Job) {
    let started = std::time::Instant::now();
    match tokio::spawn((job.run)()).await {
        Ok(()) => log::debug!(
            "[SCHEDULER] Job '{}' finished in {}ms",
            job.name,
            started.elapsed().as_millis()
        ),
        Err(e) => log::error!("[SCHEDULER] Job '{}' failed: {}", job.name, e),
    }
}

/// Time from `now` until the schedule next fires
pub fn next_fire_delay(schedule: &cron::Schedule, now: DateTime<Utc>) -> Option<Duration> {
    let next = schedule.after(&now).next()?;
    Some((next - now).to_std().unwrap_or(Duration::ZERO))
}
