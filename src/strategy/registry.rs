// Strategy registry: the weighted set of directional analyzers plus the regime filter
use std::collections::{BTreeMap, HashSet};

use super::oscillator::{
    BollingerReversion, CciReversion, RateOfChange, RsiReversion, StochasticCross, WilliamsR,
};
use super::regime::AdxFilter;
use super::trend::{DonchianBreakout, EmaCross, HeikinAshiTrend, MacdMomentum, SmaSlope};
use super::volume::{ObvTrend, TradeIntensity, VolumeSurge, VwapTrend};
use super::{Strategy, Tracked};
use crate::error::Error;
use crate::Result;

/// Default tier weights for the bundled directional strategies
pub const DEFAULT_TIERS: &[(&str, i32)] = &[
    // Tier 1: trend structure
    ("ema_cross_9_21", 3),
    ("ema_cross_21_55", 3),
    ("macd_12_26_9", 3),
    ("donchian_20", 3),
    ("heikin_ashi_3", 3),
    // Tier 2: momentum and participation
    ("rsi_14", 2),
    ("stochastic_14_3", 2),
    ("bollinger_20_2", 2),
    ("roc_12", 2),
    ("sma_slope_50", 2),
    ("obv_20", 2),
    ("vwap_50", 2),
    // Tier 3: confirmation
    ("williams_r_14", 1),
    ("cci_20", 1),
    ("volume_surge_20", 1),
    ("trade_intensity_20", 1),
    ("rsi_7", 1),
    ("donchian_55", 1),
    ("ema_cross_5_13", 1),
];

/// Allowed tier weights
pub const WEIGHT_RANGE: std::ops::RangeInclusive<i32> = 1..=3;

/// Tier table as an owned map, the shape `[scoring.tiers]` deserializes into
pub fn default_tier_map() -> BTreeMap<String, i32> {
    DEFAULT_TIERS
        .iter()
        .map(|(name, weight)| (name.to_string(), *weight))
        .collect()
}

/// Reject any tier weight outside [`WEIGHT_RANGE`]
pub fn validate_tiers(tiers: &BTreeMap<String, i32>) -> Result<()> {
    match tiers.iter().find(|(_, w)| !WEIGHT_RANGE.contains(*w)) {
        Some((name, weight)) => Err(Error::InvalidWeight {
            name: name.clone(),
            weight: *weight,
        }),
        None => Ok(()),
    }
}

/// Instantiate one of the bundled directional strategies by name
fn bundled(name: &str) -> Option<Box<dyn Strategy>> {
    let strategy = match name {
        "ema_cross_9_21" => Tracked::boxed(name, EmaCross { fast: 9, slow: 21 }),
        "ema_cross_21_55" => Tracked::boxed(name, EmaCross { fast: 21, slow: 55 }),
        "ema_cross_5_13" => Tracked::boxed(name, EmaCross { fast: 5, slow: 13 }),
        "macd_12_26_9" => Tracked::boxed(name, MacdMomentum::default()),
        "donchian_20" => Tracked::boxed(name, DonchianBreakout { period: 20 }),
        "donchian_55" => Tracked::boxed(name, DonchianBreakout { period: 55 }),
        "heikin_ashi_3" => Tracked::boxed(name, HeikinAshiTrend { streak: 3 }),
        "sma_slope_50" => Tracked::boxed(
            name,
            SmaSlope {
                period: 50,
                lookback: 5,
                min_slope_pct: 0.1,
            },
        ),
        "rsi_14" => Tracked::boxed(
            name,
            RsiReversion {
                period: 14,
                oversold: 30.0,
                overbought: 70.0,
            },
        ),
        "rsi_7" => Tracked::boxed(
            name,
            RsiReversion {
                period: 7,
                oversold: 25.0,
                overbought: 75.0,
            },
        ),
        "stochastic_14_3" => Tracked::boxed(
            name,
            StochasticCross {
                k_period: 14,
                d_period: 3,
                oversold: 20.0,
                overbought: 80.0,
            },
        ),
        "williams_r_14" => Tracked::boxed(name, WilliamsR { period: 14 }),
        "cci_20" => Tracked::boxed(
            name,
            CciReversion {
                period: 20,
                band: 100.0,
            },
        ),
        "bollinger_20_2" => Tracked::boxed(name, BollingerReversion { period: 20, k: 2.0 }),
        "roc_12" => Tracked::boxed(
            name,
            RateOfChange {
                period: 12,
                threshold_pct: 1.0,
            },
        ),
        "volume_surge_20" => Tracked::boxed(
            name,
            VolumeSurge {
                period: 20,
                multiplier: 2.0,
            },
        ),
        "trade_intensity_20" => Tracked::boxed(
            name,
            TradeIntensity {
                period: 20,
                multiplier: 2.0,
            },
        ),
        "obv_20" => Tracked::boxed(name, ObvTrend { period: 20 }),
        "vwap_50" => Tracked::boxed(
            name,
            VwapTrend {
                period: 50,
                band_pct: 0.2,
            },
        ),
        _ => return None,
    };
    Some(strategy)
}

/// A directional strategy tagged with its tier weight
pub struct StrategyEntry {
    pub weight: i32,
    pub strategy: Box<dyn Strategy>,
}

/// The full consensus: weighted directional strategies plus exactly one regime filter
pub struct StrategySet {
    entries: Vec<StrategyEntry>,
    filter: Box<dyn Strategy>,
}

impl StrategySet {
    pub fn builder() -> StrategySetBuilder {
        StrategySetBuilder::default()
    }

    /// The bundled analyzers gated by ADX(14) > 20. Weights in `tiers`
    /// override the defaults one by one.
    pub fn standard(tiers: &BTreeMap<String, i32>) -> Result<Self> {
        validate_tiers(tiers)?;
        for name in tiers.keys() {
            if !DEFAULT_TIERS.iter().any(|(known, _)| known == name) {
                tracing::warn!("Ignoring tier for unknown strategy {}", name);
            }
        }

        let mut builder = Self::builder();
        for (name, default_weight) in DEFAULT_TIERS {
            let Some(strategy) = bundled(name) else {
                continue;
            };
            let weight = tiers.get(*name).copied().unwrap_or(*default_weight);
            builder = builder.strategy(strategy, weight);
        }

        builder
            .regime_filter(Tracked::boxed("adx_14", AdxFilter::default()))
            .build()
    }

    pub fn entries(&self) -> &[StrategyEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [StrategyEntry] {
        &mut self.entries
    }

    pub fn filter(&self) -> &dyn Strategy {
        self.filter.as_ref()
    }

    pub fn filter_mut(&mut self) -> &mut dyn Strategy {
        self.filter.as_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest warm-up requirement across the set, filter included
    pub fn min_candles_required(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.strategy.min_candles_required())
            .chain(std::iter::once(self.filter.min_candles_required()))
            .max()
            .unwrap_or(0)
    }

    /// Diagnostic readout of every strategy after the last scoring pass
    pub fn diagnostics(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| e.strategy.as_ref())
            .chain(std::iter::once(self.filter.as_ref()))
            .map(|s| (s.name().to_string(), s.diagnostic_state()))
            .collect()
    }
}

#[derive(Default)]
pub struct StrategySetBuilder {
    entries: Vec<StrategyEntry>,
    filter: Option<Box<dyn Strategy>>,
}

impl StrategySetBuilder {
    pub fn strategy(mut self, strategy: Box<dyn Strategy>, weight: i32) -> Self {
        self.entries.push(StrategyEntry { weight, strategy });
        self
    }

    pub fn regime_filter(mut self, filter: Box<dyn Strategy>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn build(self) -> Result<StrategySet> {
        let filter = self.filter.ok_or(Error::MissingRegimeFilter)?;

        let mut seen = HashSet::new();
        for name in self
            .entries
            .iter()
            .map(|e| e.strategy.name())
            .chain(std::iter::once(filter.name()))
        {
            if !seen.insert(name) {
                return Err(Error::DuplicateStrategy(name.to_string()));
            }
        }

        Ok(StrategySet {
            entries: self.entries,
            filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_set_has_all_tiers() {
        let set = StrategySet::standard(&default_tier_map()).unwrap();

        assert_eq!(set.len(), 19);
        assert_eq!(set.filter().name(), "adx_14");
        assert!(set.min_candles_required() <= 100);

        let total: i32 = set.entries().iter().map(|e| e.weight).sum();
        assert_eq!(total, 5 * 3 + 7 * 2 + 7);
    }

    fn weight_of(set: &StrategySet, name: &str) -> Option<i32> {
        set.entries()
            .iter()
            .find(|e| e.strategy.name() == name)
            .map(|e| e.weight)
    }

    #[test]
    fn test_single_tier_override_keeps_other_defaults() {
        let tiers = BTreeMap::from([("rsi_14".to_string(), 3)]);
        let set = StrategySet::standard(&tiers).unwrap();

        assert_eq!(weight_of(&set, "rsi_14"), Some(3));
        assert_eq!(weight_of(&set, "ema_cross_9_21"), Some(3));
        assert_eq!(weight_of(&set, "macd_12_26_9"), Some(3));
        assert_eq!(weight_of(&set, "stochastic_14_3"), Some(2));
        assert_eq!(weight_of(&set, "cci_20"), Some(1));

        let total: i32 = set.entries().iter().map(|e| e.weight).sum();
        assert_eq!(total, 37);
    }

    #[test]
    fn test_empty_tier_table_uses_defaults() {
        let set = StrategySet::standard(&BTreeMap::new()).unwrap();
        let total: i32 = set.entries().iter().map(|e| e.weight).sum();
        assert_eq!(total, 36);
    }

    #[test]
    fn test_out_of_range_weights_rejected() {
        for weight in [-40, 0, 4] {
            let tiers = BTreeMap::from([("rsi_14".to_string(), weight)]);
            match StrategySet::standard(&tiers) {
                Err(Error::InvalidWeight { name, weight: w }) => {
                    assert_eq!(name, "rsi_14");
                    assert_eq!(w, weight);
                }
                _ => panic!("weight {} should be rejected", weight),
            }
        }
    }

    #[test]
    fn test_builder_requires_filter() {
        let result = StrategySet::builder()
            .strategy(Tracked::boxed("w", WilliamsR { period: 14 }), 1)
            .build();

        assert!(matches!(result, Err(Error::MissingRegimeFilter)));
    }

    #[test]
    fn test_builder_rejects_duplicate_names() {
        let result = StrategySet::builder()
            .strategy(Tracked::boxed("w", WilliamsR { period: 14 }), 1)
            .strategy(Tracked::boxed("w", WilliamsR { period: 7 }), 2)
            .regime_filter(Tracked::boxed("adx", AdxFilter::default()))
            .build();

        match result {
            Err(Error::DuplicateStrategy(name)) => assert_eq!(name, "w"),
            _ => panic!("expected duplicate strategy error"),
        }
    }

    #[test]
    fn test_diagnostics_before_scoring() {
        let set = StrategySet::standard(&default_tier_map()).unwrap();
        let diagnostics = set.diagnostics();

        assert_eq!(diagnostics.len(), 20);
        assert_eq!(diagnostics["adx_14"], "warming up");
    }
}
