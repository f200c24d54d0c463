pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod indicators;
pub mod output;
pub mod record;
pub mod report;
pub mod sink;
