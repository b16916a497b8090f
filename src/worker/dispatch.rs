use std::{collections::VecDeque, sync::Mutex};

use anyhow::{anyhow, Context, Result};

use crate::partial::Continuation;

/// Sends a payload to a fresh worker invocation.
pub trait Dispatcher {
    fn dispatch(&self, payload: &Continuation) -> Result<()>;
}

/// In-process FIFO of serialized payloads, for local runs and tests.
///
/// Payloads are kept as JSON so every hop goes through the wire form.
#[derive(Default)]
pub struct QueueDispatcher {
    queue: Mutex<VecDeque<Vec<u8>>>,
}

impl QueueDispatcher {
    pub fn new() -> Self { Self::default() }

    /// Take the oldest payload, if any.
    pub fn pop(&self) -> Result<Option<Continuation>> {
        let mut queue = self.queue.lock().map_err(|_| anyhow!("[worker::dispatch] Lock poisoned"))?;
        queue.pop_front().map(|bytes| Continuation::from_json_bytes(&bytes)).transpose()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Dispatcher for QueueDispatcher {
    fn dispatch(&self, payload: &Continuation) -> Result<()> {
        let bytes = serde_json::to_vec(payload).context("[worker::dispatch] Failed to encode payload")?;
        let mut queue = self.queue.lock().map_err(|_| anyhow!("[worker::dispatch] Lock poisoned"))?;
        queue.push_back(bytes);
        Ok(())
    }
}
