// Trading strategy module
pub mod aggregator;
pub mod oscillator;
pub mod regime;
pub mod registry;
pub mod trend;
pub mod volume;

pub use aggregator::{ScoreBreakdown, ScoringConfig, SignalAggregator};
pub use registry::{StrategyEntry, StrategySet, StrategySetBuilder, DEFAULT_TIERS};

use crate::models::{Candle, Signal};

/// Capability every analyzer in the consensus exposes
pub trait Strategy: Send {
    /// Unique name, used as the key in score breakdowns and trade snapshots
    fn name(&self) -> &str;

    /// Vote on a window of closed candles (oldest first)
    fn analyze(&mut self, candles: &[Candle]) -> Signal;

    /// Human-readable dump of the indicator values behind the last vote
    fn diagnostic_state(&self) -> String;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}

/// Result of a single pure evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub signal: Signal,
    pub readings: Vec<(&'static str, f64)>,
}

impl Evaluation {
    pub fn new(signal: Signal, readings: Vec<(&'static str, f64)>) -> Self {
        Self { signal, readings }
    }
}

/// Pure analysis function, free of any memory between calls
pub trait Analyzer: Send {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation>;

    fn min_candles_required(&self) -> usize;
}

/// Wraps an [`Analyzer`] with the readout of its latest evaluation
pub struct Tracked<A> {
    name: String,
    analyzer: A,
    last: Option<Evaluation>,
}

impl<A: Analyzer> Tracked<A> {
    pub fn new(name: impl Into<String>, analyzer: A) -> Self {
        Self {
            name: name.into(),
            analyzer,
            last: None,
        }
    }

    pub fn boxed(name: impl Into<String>, analyzer: A) -> Box<dyn Strategy>
    where
        A: 'static,
    {
        Box::new(Self::new(name, analyzer))
    }
}

impl<A: Analyzer> Strategy for Tracked<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn analyze(&mut self, candles: &[Candle]) -> Signal {
        if candles.len() < self.analyzer.min_candles_required() {
            self.last = None;
            return Signal::Hold;
        }

        self.last = self.analyzer.evaluate(candles);
        self.last.as_ref().map_or(Signal::Hold, |e| e.signal)
    }

    fn diagnostic_state(&self) -> String {
        match &self.last {
            None => "warming up".to_string(),
            Some(eval) => {
                let readings: Vec<String> = eval
                    .readings
                    .iter()
                    .map(|(k, v)| format!("{}={:.4}", k, v))
                    .collect();
                format!("{} -> {:?}", readings.join(" "), eval.signal)
            }
        }
    }

    fn min_candles_required(&self) -> usize {
        self.analyzer.min_candles_required()
    }
}
