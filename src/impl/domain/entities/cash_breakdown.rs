use std::collections::BTreeMap;

use fractic_server_error::ServerError;

use crate::errors::InvalidCashBreakdown;

/// End-of-day cash count: number of notes/coins per denomination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CashBreakdown {
    counts: BTreeMap<u32, u32>,
}

impl CashBreakdown {
    /// Builds a breakdown, rejecting denominations that are not configured.
    /// Configured denominations missing from `counts` are recorded as zero.
    pub fn new(
        denominations: &[u32],
        counts: impl IntoIterator<Item = (u32, u32)>,
    ) -> Result<Self, ServerError> {
        let mut map: BTreeMap<u32, u32> = denominations.iter().map(|d| (*d, 0)).collect();
        for (denomination, count) in counts {
            match map.get_mut(&denomination) {
                Some(slot) => *slot += count,
                None => {
                    return Err(InvalidCashBreakdown::new(&format!(
                        "unknown denomination {}",
                        denomination
                    )))
                }
            }
        }
        Ok(Self { counts: map })
    }

    /// Builds a breakdown without checking denominations (used for stored
    /// values, which may predate a configuration change).
    pub(crate) fn from_map(counts: BTreeMap<u32, u32>) -> Self {
        Self { counts }
    }

    pub fn count(&self, denomination: u32) -> u32 {
        self.counts.get(&denomination).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<u32, u32> {
        &self.counts
    }

    pub fn total(&self) -> f64 {
        self.counts
            .iter()
            .map(|(denomination, count)| *denomination as u64 * *count as u64)
            .sum::<u64>() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DENOMINATIONS: [u32; 8] = [1000, 500, 200, 100, 50, 10, 5, 1];

    #[test]
    fn total_sums_every_denomination() {
        let breakdown =
            CashBreakdown::new(&DENOMINATIONS, [(1000, 3), (100, 4), (5, 1), (1, 2)]).unwrap();
        assert_eq!(breakdown.total(), 3407.0);
        assert_eq!(breakdown.count(500), 0);
    }

    #[test]
    fn unknown_denomination_is_rejected() {
        assert!(CashBreakdown::new(&DENOMINATIONS, [(2000, 1)]).is_err());
    }
}
