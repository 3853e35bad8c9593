#![no_main]

use bitcoin_feerate_estimator::distribution::{anchor_bucket, bundles_distribution, txs_distribution};
use bitcoin_feerate_estimator::TemplateTransaction;
use libfuzzer_sys::fuzz_target;

// Each 12-byte chunk is one transaction: weight, fee, and one dependency index
fuzz_target!(|data: &[u8]| {
    let transactions: Vec<TemplateTransaction> = data
        .chunks_exact(12)
        .take(10_000)
        .map(|chunk| {
            let weight = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let fee = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            let depends = u32::from_le_bytes([chunk[8], chunk[9], chunk[10], chunk[11]]);

            // Keep values within what a node would put in a template
            let weight = u64::from(weight % 4_000_000);
            let fee = u64::from(fee % 100_000_000);
            let depends = match depends % 4 {
                0 => Vec::new(),
                _ => vec![(depends / 4) as usize % 10_050],
            };
            TemplateTransaction::with_depends(weight, fee, depends)
        })
        .collect();

    let total: u64 = transactions.iter().map(|tx| tx.weight).sum();
    let txs = txs_distribution(&transactions);
    let bundles = bundles_distribution(&transactions);

    assert!(txs.values().sum::<f64>() <= total as f64);
    assert_eq!(txs.values().sum::<f64>(), bundles.values().sum::<f64>());
    assert!(txs.keys().chain(bundles.keys()).all(|&bucket| bucket >= 1));

    if let Some(anchor) = anchor_bucket(&bundles) {
        assert!(bundles.keys().all(|&bucket| bucket >= anchor));
    }
});
