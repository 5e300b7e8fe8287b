use std::time::Duration;

/// Tuning parameters shared by every controller a registry creates.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Interval of the progress tick while an engine is live.
    pub seek_tick_interval: Duration,
    /// Capacity of the error broadcast channel. Raw event feeds are unbounded.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seek_tick_interval: Duration::from_millis(200),
            event_buffer: 64,
        }
    }
}

impl SessionConfig {
    pub fn with_seek_tick_interval(mut self, interval: Duration) -> Self {
        self.seek_tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }
}
