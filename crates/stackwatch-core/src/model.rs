// ── Domain model ──
//
// Wire types are shared with stackwatch-api unchanged; this module adds
// the derived aggregates the store computes from them.

use std::collections::BTreeMap;

use serde::Serialize;
use strum::IntoEnumIterator;

pub use stackwatch_api::{
    ConnectionState, ContainerInfo, ReconnectConfig, RefreshSnapshot, RefreshState, StackRecord,
    StackStatus,
};

/// Count of stacks per status.
///
/// Every known status is present, zero when absent from the map, so the
/// counts always sum to the number of stacks tallied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatusTally(BTreeMap<StackStatus, usize>);

impl StatusTally {
    /// Tally the given records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a StackRecord>) -> Self {
        let mut counts: BTreeMap<StackStatus, usize> =
            StackStatus::iter().map(|status| (status, 0)).collect();
        for record in records {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        Self(counts)
    }

    /// Count for one status.
    pub fn get(&self, status: StackStatus) -> usize {
        self.0.get(&status).copied().unwrap_or(0)
    }

    /// Sum over all statuses.
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// `(status, count)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (StackStatus, usize)> + '_ {
        self.0.iter().map(|(status, count)| (*status, *count))
    }
}
