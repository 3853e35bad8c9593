#![no_main]

use bitcoin_feerate_estimator::{BlockHeader, BlockTemplate, MempoolInfo};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

// Fuzz decoding of the node responses the estimator consumes
fuzz_target!(|data: &[u8]| {
    let Ok(json) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let result = json.get("result").cloned().unwrap_or(json);

    let _ = serde_json::from_value::<MempoolInfo>(result.clone());
    let _ = serde_json::from_value::<BlockHeader>(result.clone());
    if let Ok(template) = serde_json::from_value::<BlockTemplate>(result) {
        for tx in &template.transactions {
            let _ = tx.fee_rate_bucket();
        }
    }
});
