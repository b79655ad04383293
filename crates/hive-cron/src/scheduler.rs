//! `CronScheduler`: a wall-clock poll loop that fires due schedules as
//! synthetic user messages into a target manager.
//!
//! Schedules are grouped one file per owning manager
//! (`schedules/{managerId}.json`) and treated as the source of truth on
//! every tick — nothing about a schedule is cached in memory between ticks
//! beyond what's needed to run the current one.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use hive_core::ids::AgentId;
use hive_core::model::{Channel, Schedule, SourceContext};
use hive_swarm::{HandleUserMessageOptions, SwarmManager};

use crate::errors::{CronError, Result};
use crate::store::ScheduleStore;

/// Configuration for a [`CronScheduler`].
pub struct CronSchedulerConfig {
    pub data_dir: PathBuf,
    pub tick_interval: Duration,
}

/// Drives the schedules files against a [`SwarmManager`] on a fixed tick.
pub struct CronScheduler {
    store: ScheduleStore,
    swarm: Arc<SwarmManager>,
    tick_interval: Duration,
    cancel: CancellationToken,
}

impl CronScheduler {
    #[must_use]
    pub fn new(config: CronSchedulerConfig, swarm: Arc<SwarmManager>) -> Self {
        Self {
            store: ScheduleStore::new(&config.data_dir),
            swarm,
            tick_interval: config.tick_interval,
            cancel: CancellationToken::new(),
        }
    }

    /// A token the caller can hold to cancel [`Self::run`] from elsewhere
    /// (e.g. a signal handler).
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drains the current tick to completion on cancellation; it does not
    /// abort an in-flight dispatch.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Run the poll loop until [`Self::stop`] is called or the token is
    /// cancelled externally.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = self.tick(Utc::now()).await {
                        error!(error = %err, category = err.category(), "cron tick failed");
                    }
                }
            }
        }
    }

    /// Run a single tick against `now`. Exposed directly so tests (and a
    /// future admin-triggered "run now") don't have to wait on the real
    /// clock.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        for (manager_id, schedules) in self.store.load_all()? {
            self.tick_manager(&manager_id, schedules, now).await?;
        }
        Ok(())
    }

    async fn tick_manager(
        &self,
        manager_id: &AgentId,
        schedules: Vec<Schedule>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut remaining = Vec::with_capacity(schedules.len());
        let mut mutated = false;

        for schedule in schedules {
            if !is_due(&schedule, now) {
                remaining.push(schedule);
                continue;
            }

            match self.fire(manager_id, &schedule).await {
                Ok(()) => {
                    mutated = true;
                    if schedule.one_shot {
                        continue;
                    }
                    match advance(&schedule, now) {
                        Ok(advanced) => remaining.push(advanced),
                        Err(err) => {
                            warn!(
                                schedule = %schedule.id,
                                manager = %manager_id,
                                error = %err,
                                "failed to advance schedule after firing; dropping it"
                            );
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        schedule = %schedule.id,
                        manager = %manager_id,
                        error = %err,
                        "schedule dispatch failed; state unchanged, will retry next tick"
                    );
                    remaining.push(schedule);
                }
            }
        }

        if mutated {
            self.store.save(manager_id, &remaining)?;
        }
        Ok(())
    }

    async fn fire(&self, manager_id: &AgentId, schedule: &Schedule) -> Result<()> {
        let metadata = serde_json::json!({ "scheduleId": schedule.id.as_str() });
        let text = format!(
            "[Scheduled Task: {}]\n{}\n\n{}",
            schedule.name, metadata, schedule.message
        );
        let options = HandleUserMessageOptions {
            target_agent_id: Some(manager_id.clone()),
            source_context: Some(SourceContext {
                channel: Channel::Web,
                channel_id: None,
                user_id: None,
                message_id: None,
                thread_id: None,
            }),
            attachments: Vec::new(),
        };
        self.swarm.handle_user_message(&text, options).await?;
        Ok(())
    }
}

/// A schedule is due when its fire time has arrived and firing it hasn't
/// already been recorded (`lastFiredAt` only ever equals a *previous*
/// `nextFireAt`, never the current one, once it's been fired).
fn is_due(schedule: &Schedule, now: DateTime<Utc>) -> bool {
    schedule.next_fire_at <= now && schedule.last_fired_at != Some(schedule.next_fire_at)
}

/// Produce the post-fire schedule: `lastFiredAt` becomes the fire time that
/// just elapsed, `nextFireAt` advances per the cron expression in the
/// schedule's timezone.
fn advance(schedule: &Schedule, now: DateTime<Utc>) -> Result<Schedule> {
    let fired_at = schedule.next_fire_at;
    let next_fire_at = compute_next_fire(&schedule.cron, &schedule.timezone, now.max(fired_at))?;
    Ok(Schedule {
        last_fired_at: Some(fired_at),
        next_fire_at,
        ..schedule.clone()
    })
}

/// Parse `cron_expr` (standard 6-field `sec min hour dom month dow`
/// syntax) and find the first occurrence strictly after `after`,
/// interpreted in `tz_name`.
fn compute_next_fire(cron_expr: &str, tz_name: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let tz: Tz = tz_name
        .parse()
        .map_err(|_| CronError::InvalidTimezone(tz_name.to_owned()))?;
    let schedule = cron::Schedule::from_str(cron_expr)
        .map_err(|source| CronError::InvalidExpression { expr: cron_expr.to_owned(), source })?;
    let after_tz = after.with_timezone(&tz);
    let next = schedule
        .after(&after_tz)
        .next()
        .ok_or_else(|| CronError::NoUpcomingFire(cron_expr.to_owned()))?;
    Ok(next.with_timezone(&Utc))
}
