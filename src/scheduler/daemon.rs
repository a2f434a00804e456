use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info};

use crate::{
    config::Config,
    scheduler::{Scheduler, TaskKind, cadence::DailyCadence},
};

const TRIGGER_MINUTE: u32 = 0;

/// Spawns the daily OAuth check and curate daemons.
///
/// # Errors
/// Fails when the configured offset or hours do not form a valid cadence.
pub fn spawn_daily_daemons(scheduler: &Scheduler, config: &Config) -> Result<Vec<JoinHandle<()>>> {
    let schedule = [
        (TaskKind::CheckOauthToken, config.oauth_check_hour()),
        (TaskKind::FetchAndCurate, config.curate_hour()),
    ];

    schedule
        .into_iter()
        .map(|(task, hour)| -> Result<JoinHandle<()>> {
            let cadence =
                DailyCadence::new(config.schedule_utc_offset_hours(), hour, TRIGGER_MINUTE)
                    .ok_or_else(|| anyhow!("invalid schedule for {task}: hour {hour}"))?;
            Ok(TaskDaemon::new(scheduler.clone(), cadence, task).spawn())
        })
        .collect()
}

struct TaskDaemon {
    scheduler: Scheduler,
    cadence: DailyCadence,
    task: TaskKind,
}

impl TaskDaemon {
    fn new(scheduler: Scheduler, cadence: DailyCadence, task: TaskKind) -> Self {
        Self {
            scheduler,
            cadence,
            task,
        }
    }

    fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let state = self;
        loop {
            let now = Utc::now();
            let next = state.cadence.next_run_from(now);
            let wait = duration_until(next, now);
            let next_local = next.with_timezone(&state.cadence.timezone());
            info!(
                task = %state.task,
                next_run_utc = %next.to_rfc3339(),
                next_run_local = %next_local.to_rfc3339(),
                wait_seconds = wait.as_secs(),
                "scheduled daily task"
            );
            sleep(wait).await;

            match state.scheduler.run_task(state.task).await {
                Ok(()) => info!(task = %state.task, "scheduled task completed"),
                Err(err) => error!(task = %state.task, error = %err, "scheduled task failed"),
            }

            // keep the next computation strictly after this trigger
            if wait.is_zero() {
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

fn duration_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn past_instants_wait_zero() {
        let now = Utc::now();
        assert_eq!(duration_until(now - chrono::Duration::seconds(5), now), Duration::ZERO);
        assert_eq!(
            duration_until(now + chrono::Duration::seconds(5), now),
            Duration::from_secs(5)
        );
    }
}
