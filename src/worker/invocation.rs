use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// The host running one worker invocation.
pub trait Invocation {
    /// Time left before the host stops this invocation.
    fn remaining(&self) -> Duration;
    /// Wall clock in unix seconds.
    fn now(&self) -> f64;
}

/// An invocation with a fixed budget measured from its creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemInvocation {
    deadline: Instant,
}

impl SystemInvocation {
    pub fn new(budget: Duration) -> Self {
        Self { deadline: Instant::now() + budget }
    }
}

impl Invocation for SystemInvocation {
    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn now(&self) -> f64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0.0, |d| d.as_secs_f64())
    }
}
