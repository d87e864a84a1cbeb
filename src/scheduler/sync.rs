//! Background sync of review interactions to the predictor.
//!
//! Producers enqueue without ever blocking on a flush: the buffer is
//! bounded and overflow drops the oldest entry. A dedicated drain task
//! flushes on a timer; the flush lock excludes concurrent flushes but is
//! never taken on the enqueue path.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::scheduler::predictor::{Interaction, LearningPredictor};

/// Bounded drop-oldest queue of interactions awaiting predictor training.
pub struct InteractionQueue {
    buffer: Mutex<VecDeque<Interaction>>,
    capacity: usize,
    flush_lock: tokio::sync::Mutex<()>,
}

impl InteractionQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Enqueue an interaction. Never blocks; on overflow the oldest
    /// queued entry is dropped so recent signal wins.
    pub fn enqueue(&self, interaction: Interaction) {
        let mut buffer = self.buffer.lock();
        if buffer.len() == self.capacity {
            buffer.pop_front();
            warn!(
                capacity = self.capacity,
                "interaction queue full, dropping oldest entry"
            );
        }
        buffer.push_back(interaction);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Drain everything queued and hand it to the predictor, grouped by
    /// user. Training failures are logged and the batch is dropped; the
    /// predictor path is best-effort by contract.
    pub async fn flush_now(&self, predictor: &dyn LearningPredictor) {
        let _guard = self.flush_lock.lock().await;
        let drained: Vec<Interaction> = {
            let mut buffer = self.buffer.lock();
            buffer.drain(..).collect()
        };
        if drained.is_empty() {
            return;
        }
        debug!(count = drained.len(), "flushing queued interactions");

        let mut by_user: Vec<(String, Vec<Interaction>)> = Vec::new();
        for interaction in drained {
            match by_user.iter_mut().find(|(u, _)| *u == interaction.user_id) {
                Some((_, batch)) => batch.push(interaction),
                None => by_user.push((interaction.user_id.clone(), vec![interaction])),
            }
        }

        for (user_id, batch) in by_user {
            if let Err(err) = predictor.train(&user_id, &batch).await {
                warn!(user_id, error = %err, "predictor training failed, dropping batch");
            }
        }
    }
}

/// Spawn the periodic drain task. Aborting the handle stops the task; a
/// final [`InteractionQueue::flush_now`] on shutdown picks up stragglers.
pub fn spawn_flush_task(
    queue: Arc<InteractionQueue>,
    predictor: Arc<dyn LearningPredictor>,
    flush_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so the first flush waits
        // a full interval.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            queue.flush_now(predictor.as_ref()).await;
        }
    })
}
