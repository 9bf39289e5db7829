//! Command-line front ends for Chitty: `chitty-server` and `chitty-client`.

pub mod cli;
pub mod client;
pub mod logging;
