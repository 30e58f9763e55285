//! # FastFlow Core Library
//!
//! Core logic for the FastFlow intermittent-fasting timer: the active fast,
//! metabolic phase detection, completed-fast history, the notification plan
//! for a running fast and a daily start/end reminder.
//!
//! Host shells (mobile app, widgets, CLI) are thin layers over this crate.
//! They provide durable storage and a notification gateway and forward
//! taps on reminders back into [`FastingService::handle_notification_action`].
//!
//! ## Architecture
//!
//! - **Timer**: a wall-clock-based state machine. Elapsed time and phase are
//!   re-derived from the persisted start time, so the caller only needs to
//!   invoke `tick()` periodically for display updates
//! - **Storage**: a key/value seam with SQLite and in-memory backends, plus
//!   TOML-based configuration
//! - **Notifications**: a pure planner that turns a fast into descriptors,
//!   delivered through a [`NotificationGateway`]
//! - **Scheduler**: a recurring daily reminder, deduplicated per day
//!
//! ## Key Components
//!
//! - [`FastingService`]: start, stop, tick and resume a fast
//! - [`FastStateStore`]: typed records over a [`KeyValueStore`]
//! - [`Config`]: application configuration management
//! - [`plan`]: notification planning for an active fast

pub mod clock;
pub mod error;
pub mod events;
pub mod history;
pub mod notifications;
pub mod phases;
pub mod preferences;
pub mod protocols;
pub mod scheduler;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, NotificationError, StorageError, ValidationError};
pub use events::{Event, EventEmitter};
pub use history::FastingStats;
pub use notifications::{
    plan, MemoryGateway, NotificationCategory, NotificationDescriptor, NotificationGateway,
    SchedulerAction,
};
pub use phases::{detect_phase, Phase, PHASES};
pub use preferences::{MaintenanceState, NotificationPreferences};
pub use protocols::{get_protocol, Protocol, PROTOCOLS};
pub use scheduler::{RecurringScheduler, ScheduleOutcome, SchedulerSettings};
pub use storage::{Config, Database, FastStateStore, KeyValueStore, MemoryStore};
pub use timer::{
    spawn_ticker, ActiveFast, CompletedSession, FastStatus, FastingService, TickerHandle,
    TimerSnapshot,
};
