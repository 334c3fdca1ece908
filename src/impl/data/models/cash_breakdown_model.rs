use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};

use crate::entities::CashBreakdown;

/// Stored form of a cash count: a JSON object keyed by denomination, ex.
/// `{"1000": 3, "500": 0, "100": 4}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct CashBreakdownModel(BTreeMap<String, u32>);

impl CashBreakdownModel {
    pub(crate) fn to_json(breakdown: &CashBreakdown) -> Result<String, serde_json::Error> {
        let model = CashBreakdownModel(
            breakdown
                .counts()
                .iter()
                .map(|(denomination, count)| (denomination.to_string(), *count))
                .collect(),
        );
        serde_json::to_string(&model)
    }

    /// Keys that are not integers are skipped.
    pub(crate) fn from_json(s: &str) -> Result<CashBreakdown, serde_json::Error> {
        let model: CashBreakdownModel = serde_json::from_str(s)?;
        Ok(CashBreakdown::from_map(
            model
                .0
                .into_iter()
                .filter_map(|(k, v)| k.trim().parse::<u32>().ok().map(|d| (d, v)))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_stored_counts() {
        let breakdown = CashBreakdownModel::from_json(r#"{"1000": 2, "5": 3}"#).unwrap();
        assert_eq!(breakdown.total(), 2015.0);
        let json = CashBreakdownModel::to_json(&breakdown).unwrap();
        assert_eq!(CashBreakdownModel::from_json(&json).unwrap(), breakdown);
    }
}
