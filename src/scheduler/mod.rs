//! Spaced-repetition scheduling.
//!
//! The baseline is deterministic SM-2: quality below 3 resets the card,
//! quality 3..=5 grows the interval through the 1/6/interval×ease ladder
//! and adjusts the ease factor, floored at 1.3. A configured predictor
//! can blend its recommended interval in, gated on its own confidence,
//! but it only ever adjusts intervals; predictor downtime degrades to
//! pure SM-2, silently.

pub mod predictor;
pub mod sync;

pub use predictor::{HistoryPredictor, Interaction, LearningPredictor, PredictionResult};
pub use sync::{InteractionQueue, spawn_flush_task};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{GraphConfig, SchedulerConfig};
use crate::embedding::ProviderError;
use crate::error::{LexikaError, Result};
use crate::graph::GraphStore;
use crate::resilience::{CircuitBreaker, CircuitState};

/// Hard cap on schedule query size, matching the search limit.
pub const MAX_SCHEDULE_LIMIT: usize = 100;

const MIN_EASE_FACTOR: f32 = 1.3;
const INITIAL_EASE_FACTOR: f32 = 2.5;

/// Per-learner review state for one item. Mutated only by the scheduler;
/// retired instead of deleted while the item stays in the active set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCard {
    pub id: String,
    pub user_id: String,
    pub item_id: String,
    pub ease_factor: f32,
    pub interval_days: f32,
    pub repetition_count: u32,
    pub next_review_at: DateTime<Utc>,
    pub last_review_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retired: bool,
}

impl ReviewCard {
    fn new(user_id: &str, item_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            ease_factor: INITIAL_EASE_FACTOR,
            interval_days: 0.0,
            repetition_count: 0,
            next_review_at: now,
            last_review_at: None,
            retired: false,
        }
    }

    /// Normalized difficulty-to-priority mapping: ease 1.3 maps to 0.0
    /// and 2.5 to 1.0.
    #[must_use]
    pub fn priority(&self) -> f32 {
        (self.ease_factor - MIN_EASE_FACTOR) / 1.2
    }
}

/// One row of a schedule query, enriched with graph neighbors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub item_id: String,
    pub scheduled_date: DateTime<Utc>,
    pub priority: f32,
    pub related_item_ids: Vec<String>,
}

/// SM-2 scheduler with optional predictor blending and graph enrichment.
pub struct SpacedRepetitionScheduler {
    cards: RwLock<HashMap<(String, String), ReviewCard>>,
    predictor: Option<Arc<dyn LearningPredictor>>,
    breaker: Arc<CircuitBreaker>,
    graph: Arc<GraphStore>,
    queue: Arc<InteractionQueue>,
    config: SchedulerConfig,
    graph_config: GraphConfig,
}

impl SpacedRepetitionScheduler {
    #[must_use]
    pub fn new(
        predictor: Option<Arc<dyn LearningPredictor>>,
        breaker: Arc<CircuitBreaker>,
        graph: Arc<GraphStore>,
        queue: Arc<InteractionQueue>,
        config: SchedulerConfig,
        graph_config: GraphConfig,
    ) -> Self {
        Self {
            cards: RwLock::new(HashMap::new()),
            predictor,
            breaker,
            graph,
            queue,
            config,
            graph_config,
        }
    }

    /// Record one review event and return the updated card.
    ///
    /// The deterministic SM-2 update always lands; the predictor, when
    /// configured and its circuit is not open, may blend the interval
    /// afterwards. Predictor failure or timeout falls back to the
    /// baseline without surfacing an error.
    pub async fn record_review(
        &self,
        user_id: &str,
        item_id: &str,
        quality: u8,
        response_time_ms: u64,
    ) -> Result<ReviewCard> {
        if quality > 5 {
            return Err(LexikaError::InvalidQuery(format!(
                "review quality must be within 0..=5, got {quality}"
            )));
        }

        // Blending only applies on the success path; the reset-to-1-day
        // guarantee for failed reviews is never negotiable. The prediction
        // is fetched before the card is touched so the read-modify-write
        // below stays atomic under the write lock and concurrent reviews
        // of the same card cannot lose an update across the await.
        let recommended = if quality >= 3 {
            self.predicted_interval(user_id, item_id).await
        } else {
            None
        };

        let now = Utc::now();
        let card = {
            let mut cards = self.cards.write();
            let card = cards
                .entry((user_id.to_string(), item_id.to_string()))
                .or_insert_with(|| ReviewCard::new(user_id, item_id, now));
            apply_sm2(card, quality, now);
            if let Some(recommended) = recommended {
                let weight = self.config.blend_weight;
                let baseline = card.interval_days;
                card.interval_days = (baseline * (1.0 - weight) + recommended * weight).max(1.0);
                card.next_review_at = now + days(card.interval_days);
                debug!(item_id, baseline, recommended, "blended predictor interval");
            }
            card.clone()
        };

        self.queue.enqueue(Interaction {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            quality,
            response_time_ms,
            recorded_at: now,
        });
        Ok(card)
    }

    /// Cards due now for a learner, soonest first, harder cards breaking
    /// ties. Each entry carries up to the configured number of related
    /// item ids from the graph; graph lookups are best-effort.
    pub fn get_schedule(&self, user_id: &str, limit: usize) -> Result<Vec<ScheduleEntry>> {
        if limit == 0 || limit > MAX_SCHEDULE_LIMIT {
            return Err(LexikaError::InvalidQuery(format!(
                "schedule limit must be within 1..={MAX_SCHEDULE_LIMIT}, got {limit}"
            )));
        }

        let now = Utc::now();
        let mut due: Vec<ReviewCard> = {
            let cards = self.cards.read();
            cards
                .values()
                .filter(|c| c.user_id == user_id && !c.retired && c.next_review_at <= now)
                .cloned()
                .collect()
        };
        due.sort_by(|a, b| {
            a.next_review_at
                .cmp(&b.next_review_at)
                .then_with(|| b.priority().total_cmp(&a.priority()))
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        due.truncate(limit);

        Ok(due
            .into_iter()
            .map(|card| ScheduleEntry {
                related_item_ids: self.graph.related_ids(
                    &card.item_id,
                    &self.graph_config,
                    self.config.max_related,
                ),
                item_id: card.item_id,
                scheduled_date: card.next_review_at,
                priority: (card.ease_factor - MIN_EASE_FACTOR) / 1.2,
            })
            .collect())
    }

    /// Soft-retire a card so it stops appearing in schedules.
    pub fn retire(&self, user_id: &str, item_id: &str) -> bool {
        let mut cards = self.cards.write();
        match cards.get_mut(&(user_id.to_string(), item_id.to_string())) {
            Some(card) => {
                card.retired = true;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn card(&self, user_id: &str, item_id: &str) -> Option<ReviewCard> {
        self.cards
            .read()
            .get(&(user_id.to_string(), item_id.to_string()))
            .cloned()
    }

    #[must_use]
    pub fn card_count(&self) -> usize {
        self.cards.read().len()
    }

    /// Fetch a prediction through the breaker and a hard timeout.
    /// Returns the recommended interval only when confidence clears the
    /// configured gate; everything else reads as "no advice".
    async fn predicted_interval(&self, user_id: &str, item_id: &str) -> Option<f32> {
        let predictor = self.predictor.as_ref()?;
        if self.breaker.state() == CircuitState::Open {
            return None;
        }

        // The timeout sits inside the breaker so a timed-out prediction
        // counts as a failure like any other.
        let call = self.breaker.execute(|| async {
            timeout(self.config.predictor_timeout, predictor.predict(user_id, item_id))
                .await
                .map_err(|_| ProviderError::Timeout)?
        });
        match call.await {
            Ok(prediction) if prediction.confidence >= self.config.confidence_gate => {
                Some(prediction.recommended_interval_days.max(0.0))
            }
            Ok(prediction) => {
                debug!(
                    item_id,
                    confidence = prediction.confidence,
                    gate = self.config.confidence_gate,
                    "prediction below confidence gate, using baseline"
                );
                None
            }
            Err(err) => {
                warn!(item_id, error = %err, "predictor unavailable, using baseline");
                None
            }
        }
    }
}

/// Deterministic SM-2 update.
fn apply_sm2(card: &mut ReviewCard, quality: u8, now: DateTime<Utc>) {
    if quality < 3 {
        card.repetition_count = 0;
        card.interval_days = 1.0;
    } else {
        card.repetition_count += 1;
        card.interval_days = match card.repetition_count {
            1 => 1.0,
            2 => 6.0,
            _ => (card.interval_days * card.ease_factor).round(),
        };
    }

    let miss = f32::from(5 - quality);
    card.ease_factor =
        (card.ease_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE_FACTOR);
    card.last_review_at = Some(now);
    card.next_review_at = now + days(card.interval_days);
}

fn days(interval_days: f32) -> ChronoDuration {
    ChronoDuration::seconds((interval_days * 86_400.0) as i64)
}
