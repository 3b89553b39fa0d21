// Technical indicators module
// Implements RSI, MA, MACD, ADX, ATR, oscillators and volume studies

pub mod adx;
pub mod atr;
pub mod moving_average;
pub mod oscillators;
pub mod rsi;
pub mod volume;

pub use adx::calculate_adx;
pub use atr::{calculate_atr, calculate_atr_series, true_ranges};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_macd, calculate_sma, Macd};
pub use oscillators::{calculate_bollinger, calculate_cci, calculate_stochastic, calculate_williams_r, Bollinger};
pub use rsi::calculate_rsi;
pub use volume::{calculate_obv_series, calculate_vwap};
