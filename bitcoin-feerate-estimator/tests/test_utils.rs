#![allow(dead_code)]

use async_trait::async_trait;
use bitcoin_feerate_estimator::{
    BlockHeader, BlockTemplate, MempoolInfo, NodeRpc, RpcError, TemplateTransaction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// What the node answers during one polling cycle.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub hash: String,
    pub height: u64,
    pub time: u64,
    pub loaded: bool,
    /// Makes `getbestblockhash` fail
    pub tip_fails: bool,
    /// `None` makes `getblocktemplate` fail
    pub template: Option<Vec<TemplateTransaction>>,
}

impl Cycle {
    pub fn new(hash: &str, height: u64, time: u64, template: Vec<TemplateTransaction>) -> Self {
        Self {
            hash: hash.to_string(),
            height,
            time,
            loaded: true,
            tip_fails: false,
            template: Some(template),
        }
    }

    pub fn failing(mut self) -> Self {
        self.template = None;
        self
    }

    pub fn tip_failing(mut self) -> Self {
        self.tip_fails = true;
        self
    }

    pub fn not_loaded(mut self) -> Self {
        self.loaded = false;
        self
    }
}

/// Node replaying one scripted [`Cycle`] per `getbestblockhash` call.
///
/// Once the script is exhausted the last cycle repeats.
pub struct ScriptedNode {
    cycles: Vec<Cycle>,
    next: AtomicUsize,
    current: Mutex<usize>,
    header_calls: AtomicUsize,
}

impl ScriptedNode {
    pub fn new(cycles: Vec<Cycle>) -> Self {
        assert!(!cycles.is_empty());
        Self {
            cycles,
            next: AtomicUsize::new(0),
            current: Mutex::new(0),
            header_calls: AtomicUsize::new(0),
        }
    }

    pub fn header_calls(&self) -> usize {
        self.header_calls.load(Ordering::SeqCst)
    }

    fn cycle(&self) -> Cycle {
        self.cycles[*self.current.lock().unwrap()].clone()
    }
}

#[async_trait]
impl NodeRpc for ScriptedNode {
    async fn get_best_block_hash(&self) -> Result<String, RpcError> {
        let index = self.next.fetch_add(1, Ordering::SeqCst).min(self.cycles.len() - 1);
        *self.current.lock().unwrap() = index;
        let cycle = &self.cycles[index];
        if cycle.tip_fails {
            return Err(RpcError::Transport("connection reset".to_string()));
        }
        Ok(cycle.hash.clone())
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, RpcError> {
        // joined with getbestblockhash, so read the cycle after it advanced
        tokio::task::yield_now().await;
        Ok(MempoolInfo {
            loaded: self.cycle().loaded,
            size: 0,
            bytes: 0,
        })
    }

    async fn get_block_header(&self, hash: &str) -> Result<BlockHeader, RpcError> {
        self.header_calls.fetch_add(1, Ordering::SeqCst);
        let cycle = self.cycle();
        assert_eq!(cycle.hash, hash);
        Ok(BlockHeader {
            hash: cycle.hash,
            height: cycle.height,
            time: cycle.time,
        })
    }

    async fn get_block_template(&self, _rules: &[&str]) -> Result<BlockTemplate, RpcError> {
        self.cycle()
            .template
            .map(|transactions| BlockTemplate { transactions })
            .ok_or_else(|| RpcError::HttpStatus(500))
    }
}

/// Creates a transaction paying `fee_rate` sat/vB for `weight` weight units.
pub fn tx(fee_rate: u64, weight: u64) -> TemplateTransaction {
    TemplateTransaction::new(weight, fee_rate * weight / 4)
}

/// A template of standalone transactions.
pub fn template(entries: &[(u64, u64)]) -> Vec<TemplateTransaction> {
    entries
        .iter()
        .map(|&(fee_rate, weight)| tx(fee_rate, weight))
        .collect()
}
