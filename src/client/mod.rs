//! Headless game client: local simulation plus session participation

pub mod adapter;
pub mod autopilot;
pub mod highscore;
pub mod runtime;
pub mod scheduler;
pub mod timer;

pub use adapter::{ClientError, Directive, SessionClient};
pub use autopilot::Autopilot;
pub use highscore::{FileHighScoreStore, HighScoreError, HighScoreStore, MemoryHighScoreStore};
pub use runtime::{run_client, run_solo, ClientControl, ClientSummary, PlayerLoop, SOLO_ORIGIN};
pub use scheduler::FrameScheduler;
pub use timer::{CountdownTimer, TimerEvent, TimerKind, TimerSlot};
