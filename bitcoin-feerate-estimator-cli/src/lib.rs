//! Bitcoin fee rate estimator CLI - node RPC client, configuration and HTTP exposure

pub mod bitcoin;
pub mod cli;
pub mod config;
pub mod server;
