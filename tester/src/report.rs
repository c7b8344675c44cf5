//! End-of-run reconciliation of routed against worked lines

use std::collections::{BTreeMap, BTreeSet};

use coordinator::CoordinatorResult;
use shared::CoordinationStore;

/// Routed and worked tallies, keyed by line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub routed: BTreeMap<String, i64>,
    pub worked: BTreeMap<String, i64>,
}

async fn tallies<S: CoordinationStore + ?Sized>(store: &S, hash: &str) -> CoordinatorResult<BTreeMap<String, i64>> {
    let fields = store.hkeys(hash).await?;
    let values = store.hmget(hash, &fields).await?;
    Ok(fields
        .into_iter()
        .zip(values)
        .map(|(field, value)| {
            let count = value.and_then(|raw| raw.parse().ok()).unwrap_or(0);
            (field, count)
        })
        .collect())
}

impl Reconciliation {
    pub async fn collect<S: CoordinationStore + ?Sized>(store: &S, routed: &str, worked: &str) -> CoordinatorResult<Self> {
        Ok(Self {
            routed: tallies(store, routed).await?,
            worked: tallies(store, worked).await?,
        })
    }

    /// Drop both tallies ahead of a run
    pub async fn clear<S: CoordinationStore + ?Sized>(store: &S, routed: &str, worked: &str) -> CoordinatorResult<()> {
        for hash in [routed, worked] {
            for field in store.hkeys(hash).await? {
                store.hdel(hash, &field).await?;
            }
        }
        Ok(())
    }

    /// Lines worked without ever being routed
    pub fn never_routed(&self) -> Vec<&str> {
        self.worked
            .keys()
            .filter(|line| !self.routed.contains_key(*line))
            .map(String::as_str)
            .collect()
    }

    /// Lines routed but never worked
    pub fn never_worked(&self) -> Vec<&str> {
        self.routed
            .keys()
            .filter(|line| !self.worked.contains_key(*line))
            .map(String::as_str)
            .collect()
    }

    /// `(line, routed, worked)` for every line whose counts differ
    pub fn mismatches(&self) -> Vec<(&str, i64, i64)> {
        let lines: BTreeSet<&String> = self.routed.keys().chain(self.worked.keys()).collect();
        lines
            .into_iter()
            .filter_map(|line| {
                let routed = self.routed.get(line).copied().unwrap_or(0);
                let worked = self.worked.get(line).copied().unwrap_or(0);
                (routed != worked).then_some((line.as_str(), routed, worked))
            })
            .collect()
    }

    /// Report lines in print order
    pub fn lines(&self) -> Vec<String> {
        let mut out = vec![
            format!("NEVER ROUTED: {:?}", self.never_routed()),
            format!("NEVER WORKED: {:?}", self.never_worked()),
        ];
        out.extend(
            self.mismatches()
                .into_iter()
                .map(|(line, routed, worked)| format!("{line}\t{routed}\t{worked}\t{}", routed - worked)),
        );
        out
    }
}
