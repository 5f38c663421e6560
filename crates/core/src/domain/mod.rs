pub mod backtest;
pub mod candidate;
pub mod report;
