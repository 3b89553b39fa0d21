// Signal aggregation: weighted consensus of all directional strategies
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::registry::{default_tier_map, validate_tiers, StrategySet};
use crate::models::{Candle, Signal};
use crate::Result;

/// Entry thresholds and tier weights (the `[scoring]` config section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub long_threshold: i32,
    pub short_threshold: i32,
    pub tiers: BTreeMap<String, i32>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            long_threshold: 7,
            short_threshold: -7,
            tiers: default_tier_map(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        validate_tiers(&self.tiers)
    }
}

/// Output of one scoring pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Score after regime dampening
    pub total_score: i32,
    /// Plain weighted sum before dampening
    pub raw_score: i32,
    pub signals: BTreeMap<String, Signal>,
    pub filter_signal: Signal,
    pub adx_gate_passed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SignalAggregator {
    config: ScoringConfig,
}

impl SignalAggregator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Run every strategy and the regime filter over the same closed window
    pub fn score(&self, closed: &[Candle], set: &mut StrategySet) -> ScoreBreakdown {
        let mut signals = BTreeMap::new();
        let mut votes = Vec::with_capacity(set.len());

        for entry in set.entries_mut() {
            let signal = entry.strategy.analyze(closed);
            votes.push((entry.weight, signal));
            signals.insert(entry.strategy.name().to_string(), signal);
        }

        let filter_signal = set.filter_mut().analyze(closed);
        let mut breakdown = Self::combine(&votes, filter_signal);
        breakdown.signals = signals;
        breakdown
    }

    /// Pure scoring core over (weight, vote) pairs and the filter's vote
    pub fn combine(votes: &[(i32, Signal)], filter_signal: Signal) -> ScoreBreakdown {
        let raw_score: i32 = votes.iter().map(|(weight, s)| weight * s.sign()).sum();

        // i32 division truncates toward zero
        let total_score = if filter_signal == Signal::Hold {
            raw_score / 2
        } else {
            raw_score
        };

        let adx_gate_passed = !(total_score.signum() != 0
            && filter_signal != Signal::Hold
            && total_score.signum() == -filter_signal.sign());

        ScoreBreakdown {
            total_score,
            raw_score,
            signals: BTreeMap::new(),
            filter_signal,
            adx_gate_passed,
        }
    }

    /// Direction to open, or Hold when the gate fails or no threshold is met
    pub fn entry_signal(&self, breakdown: &ScoreBreakdown) -> Signal {
        if !breakdown.adx_gate_passed {
            return Signal::Hold;
        }

        if breakdown.total_score >= self.config.long_threshold {
            Signal::Buy
        } else if breakdown.total_score <= self.config.short_threshold {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    /// Whether the score has flipped hard against an open position
    pub fn is_reversal(&self, breakdown: &ScoreBreakdown, open: Signal) -> bool {
        let pressure = if breakdown.total_score >= self.config.long_threshold {
            Signal::Buy
        } else if breakdown.total_score <= self.config.short_threshold {
            Signal::Sell
        } else {
            Signal::Hold
        };
        open != Signal::Hold && pressure == open.opposite()
    }
}
