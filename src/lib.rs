pub mod api;
pub mod config;
pub mod context;
pub mod exchange;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod risk_gate;
pub mod signal_parser;
pub mod sizing;
pub mod telegram;

#[cfg(test)]
mod tests;
