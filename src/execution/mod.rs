// Position bookkeeping and the live trading loop
pub mod decision;
pub mod ledger;
pub mod live;
pub mod notifier;
pub mod pnl;

pub use decision::{apply_exit, decide_exit};
pub use ledger::{EntrySnapshot, Position, PositionLedger, TradeRecord};
pub use live::{LiveConfig, LiveState, LiveTrader, TickOutcome, TickReport};
pub use notifier::{StatusEvent, StatusNotifier};
pub use pnl::{roe_percent, FeeModel, DEFAULT_FEE_RATE};
