//! Time utilities for the simulation and the coordinator

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Display refresh rate the client ticks at by default
pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Interval between countdown steps
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);

/// Duration of one frame at the given refresh rate
pub fn frame_period(frame_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / frame_rate.max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_period_at_sixty_hz() {
        assert_eq!(frame_period(60), Duration::from_micros(16_666));
    }

    #[test]
    fn zero_frame_rate_does_not_divide_by_zero() {
        assert_eq!(frame_period(0), Duration::from_secs(1));
    }

    #[test]
    fn uptime_starts_after_init() {
        init_server_time();
        assert!(uptime_secs() < 5);
    }
}
