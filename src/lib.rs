//! Daily resolution check-in. The `dalos` binary walks through a few yes/no questions, sends the
//! answers to a remote ledger and shows the streak it returns. The `dalos-agent` binary runs in
//! the background and brings the check-in window back when a reminder is clicked.
//!

pub mod agent;
pub mod cli;
pub mod config;
pub mod submission;
pub mod utils;
pub mod window_api;
pub mod wizard;
