//! Bitcoin Core RPC client module for polling block templates

mod network;
mod rpc_client;

pub use network::Network;
pub use rpc_client::{BitcoinRpcClient, BitcoinRpcConfig};
