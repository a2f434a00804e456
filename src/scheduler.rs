pub(crate) mod cadence;
pub mod daemon;
pub(crate) mod jobs;

pub use daemon::spawn_daily_daemons;
pub(crate) use jobs::RunContext;
pub use jobs::{Scheduler, TaskKind, UnknownTask};
