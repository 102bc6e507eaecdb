use std::collections::HashMap;

use tracing::{debug, info};

use crate::data::ticker::{bucket_sort_key, parse_ticker, range_label, TickerParts};
use crate::data::types::Contract;
use crate::hedge::types::{Bucket, OutcomeGroup};

/// Groups quote snapshots into mutually exclusive outcome spaces.
#[derive(Debug, Clone, Default)]
pub struct MarketGrouper;

impl MarketGrouper {
    pub fn new() -> Self {
        Self
    }

    /// Partition contracts by (measurement kind, location code, date code).
    ///
    /// Contracts whose identifier does not parse are skipped. Buckets inside a
    /// group run from the "below" sentinel to the "above" sentinel; groups are
    /// ordered by date then location.
    pub fn group(&self, contracts: &[Contract]) -> Vec<OutcomeGroup> {
        let mut by_key: HashMap<String, (TickerParts, Vec<(f64, Bucket)>)> = HashMap::new();
        let mut skipped = 0usize;

        for contract in contracts {
            let parts = match parse_ticker(&contract.id) {
                Some(parts) => parts,
                None => {
                    debug!("Skipping unparseable contract id {}", contract.id);
                    skipped += 1;
                    continue;
                }
            };

            let label = range_label(&contract.description, parts.strike, parts.value);
            let key = bucket_sort_key(&label);
            let bucket = Bucket {
                range_label: label,
                contract: contract.clone(),
            };

            by_key
                .entry(parts.group_id())
                .or_insert_with(|| (parts, Vec::new()))
                .1
                .push((key, bucket));
        }

        let mut groups: Vec<OutcomeGroup> = by_key
            .into_iter()
            .map(|(group_id, (parts, mut keyed))| {
                keyed.sort_by(|(a, _), (b, _)| a.total_cmp(b));
                OutcomeGroup {
                    group_id,
                    location: parts.location(),
                    date_code: parts.date_code,
                    date: parts.date,
                    kind: parts.kind,
                    buckets: keyed.into_iter().map(|(_, bucket)| bucket).collect(),
                }
            })
            .collect();

        groups.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.location.cmp(&b.location))
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.group_id.cmp(&b.group_id))
        });

        info!(
            "Grouped {} contracts into {} outcome groups ({} skipped)",
            contracts.len() - skipped,
            groups.len(),
            skipped
        );

        groups
    }
}
