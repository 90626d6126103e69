// Usage analytics types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share of calls attributed to one app or function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionDatapoint {
    pub name: String,
    pub value: f64,
}

/// Calls per series on one date; series names are app or function names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesDatapoint {
    pub date: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl TimeSeriesDatapoint {
    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeseries_flattened_series() {
        let point: TimeSeriesDatapoint =
            serde_json::from_str(r#"{"date":"2025-03-01","GMAIL":3,"SLACK":4.5}"#).unwrap();
        assert_eq!(point.date, "2025-03-01");
        assert_eq!(point.values.get("GMAIL"), Some(&3.0));
        assert_eq!(point.total(), 7.5);
    }
}
