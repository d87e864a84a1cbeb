//! Learning-outcome prediction contract.
//!
//! Predictions are advisory: the scheduler decides whether to blend them
//! into the deterministic baseline, and a missing or failing predictor
//! never blocks a review update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::embedding::ProviderError;

/// Advisory output of a predictor. Never mutates card state directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub item_id: String,
    /// Estimated recall probability at the recommended interval, in [0, 1].
    pub predicted_success_rate: f32,
    pub recommended_interval_days: f32,
    /// How much the prediction should be trusted, in [0, 1].
    pub confidence: f32,
}

/// One recorded review event, queued for best-effort predictor training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub item_id: String,
    pub quality: u8,
    pub response_time_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

/// External learning-model capability.
#[async_trait]
pub trait LearningPredictor: Send + Sync {
    async fn predict(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<PredictionResult, ProviderError>;

    /// Incorporate a batch of interactions. Best-effort, out of the
    /// review-update critical path.
    async fn train(
        &self,
        user_id: &str,
        interactions: &[Interaction],
    ) -> Result<(), ProviderError>;
}

#[derive(Debug, Default, Clone)]
struct ItemHistory {
    reviews: u32,
    successes: u32,
}

/// Frequency-based predictor over trained interaction history.
///
/// Confidence ramps linearly with sample size and the recommended
/// interval stretches with the observed success rate. A stand-in for a
/// real model service, but deterministic enough to exercise the blending
/// path end to end.
#[derive(Debug, Default)]
pub struct HistoryPredictor {
    history: RwLock<HashMap<(String, String), ItemHistory>>,
}

impl HistoryPredictor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LearningPredictor for HistoryPredictor {
    async fn predict(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<PredictionResult, ProviderError> {
        let history = self.history.read();
        let entry = history
            .get(&(user_id.to_string(), item_id.to_string()))
            .cloned()
            .unwrap_or_default();

        let success_rate = if entry.reviews == 0 {
            0.5
        } else {
            entry.successes as f32 / entry.reviews as f32
        };
        Ok(PredictionResult {
            item_id: item_id.to_string(),
            predicted_success_rate: success_rate,
            // 1 day at 0% recall up to 2 weeks at perfect recall.
            recommended_interval_days: 1.0 + success_rate * 13.0,
            confidence: (entry.reviews as f32 / 10.0).min(1.0),
        })
    }

    async fn train(
        &self,
        user_id: &str,
        interactions: &[Interaction],
    ) -> Result<(), ProviderError> {
        let mut history = self.history.write();
        for interaction in interactions {
            let entry = history
                .entry((user_id.to_string(), interaction.item_id.clone()))
                .or_default();
            entry.reviews += 1;
            if interaction.quality >= 3 {
                entry.successes += 1;
            }
        }
        Ok(())
    }
}
