pub mod batch;
pub mod event_log;
pub mod history;
pub mod notifications;
pub mod poller;
pub mod preferences;
pub mod respawn;
pub mod supervisor;
pub mod watchlist;

pub use supervisor::Supervisor;
