//! City filter over the historical sales

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::SalesRecord;

/// Selected cities. An empty selection is legal and selects nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FilterSelection {
    cities: BTreeSet<String>,
}

impl FilterSelection {
    /// Select every city present in `records`
    pub fn all(records: &[SalesRecord]) -> Self {
        Self {
            cities: records.iter().map(|r| r.city.clone()).collect(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn of<I, S>(cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cities: cities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, city: &str) -> bool {
        self.cities.contains(city)
    }

    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.cities.iter().map(String::as_str)
    }

    /// Selected cities that match no record; these select nothing
    pub fn unknown_cities(&self, records: &[SalesRecord]) -> Vec<String> {
        self.cities
            .iter()
            .filter(|c| !records.iter().any(|r| &r.city == *c))
            .cloned()
            .collect()
    }

    pub fn apply<'a>(&self, records: &'a [SalesRecord]) -> FilterResult<'a> {
        let (kept, removed): (Vec<&SalesRecord>, Vec<&SalesRecord>) =
            records.iter().partition(|r| self.contains(&r.city));
        FilterResult {
            kept,
            removed: removed.len(),
        }
    }
}

/// Records kept by a filter, plus how many were dropped
#[derive(Debug, Clone)]
pub struct FilterResult<'a> {
    pub kept: Vec<&'a SalesRecord>,
    pub removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Month;

    fn record(city: &str, revenue: f64) -> SalesRecord {
        SalesRecord {
            city: city.to_string(),
            month: Month::Apr,
            price_per_unit: 25.0,
            units_sold: 100,
            revenue,
            profit: revenue / 2.0,
        }
    }

    fn sample() -> Vec<SalesRecord> {
        vec![
            record("Delhi", 1000.0),
            record("Mumbai", 2000.0),
            record("Delhi", 500.0),
            record("Pune", 300.0),
        ]
    }

    #[test]
    fn all_keeps_everything() {
        let records = sample();
        let result = FilterSelection::all(&records).apply(&records);
        assert_eq!(result.kept.len(), 4);
        assert_eq!(result.removed, 0);
    }

    #[test]
    fn subset_keeps_only_selected_cities() {
        let records = sample();
        let result = FilterSelection::of(["Delhi"]).apply(&records);
        assert_eq!(result.kept.len(), 2);
        assert!(result.kept.iter().all(|r| r.city == "Delhi"));
        assert_eq!(result.removed, 2);
    }

    #[test]
    fn empty_selection_keeps_nothing() {
        let records = sample();
        let selection = FilterSelection::none();
        assert_eq!(selection.cities().count(), 0);
        let result = selection.apply(&records);
        assert!(result.kept.is_empty());
        assert_eq!(result.removed, 4);
    }

    #[test]
    fn unknown_cities_are_reported_and_match_nothing() {
        let records = sample();
        let selection = FilterSelection::of(["Pune", "Chennai"]);
        assert_eq!(selection.unknown_cities(&records), vec!["Chennai".to_string()]);
        assert_eq!(selection.apply(&records).kept.len(), 1);
    }
}
