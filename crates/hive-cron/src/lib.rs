//! # hive-cron
//!
//! `CronScheduler`: a single poll loop, driven by a monotonic clock, that
//! treats each manager's `schedules/{managerId}.json` file as the source of
//! truth and fires due schedules as synthetic `SwarmManager::handle_user_message`
//! calls. Exclusively owns the schedules files; `SwarmManager` is the only
//! downstream dispatcher it calls.

#![deny(unsafe_code)]

pub mod errors;
pub mod scheduler;
pub mod store;

pub use errors::{CronError, Result};
pub use scheduler::{CronScheduler, CronSchedulerConfig};
pub use store::ScheduleStore;
