mod engine;
pub mod session;
mod ticker;

pub use engine::{format_hms, FastStatus, FastingService, TimerSnapshot, TimerStats, MAX_CUSTOM_FASTING_HOURS};
pub use session::{ActiveFast, CompletedSession, CompletionReason, SyncStatus};
pub use ticker::{spawn_ticker, SharedService, TickerHandle};
