//! KPI aggregation and the monthly revenue/profit trend

use serde::Serialize;

use crate::models::{Month, SalesRecord};

/// Headline numbers for the filtered sales
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_revenue: f64,
    pub total_profit: f64,
    /// None when there are no records
    pub mean_price: Option<f64>,
    pub total_units: u64,
    pub records: usize,
    pub cities: usize,
}

pub fn compute_kpis(records: &[&SalesRecord]) -> Kpis {
    let total_revenue = records.iter().map(|r| r.revenue).sum();
    let total_profit = records.iter().map(|r| r.profit).sum();
    let total_units = records.iter().map(|r| r.units_sold).sum();
    let mean_price = mean(records.iter().map(|r| r.price_per_unit));

    let mut cities: Vec<&str> = records.iter().map(|r| r.city.as_str()).collect();
    cities.sort_unstable();
    cities.dedup();

    Kpis {
        total_revenue,
        total_profit,
        mean_price,
        total_units,
        records: records.len(),
        cities: cities.len(),
    }
}

/// Arithmetic mean, or None for an empty sequence
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthTotals {
    pub revenue: f64,
    pub profit: f64,
}

/// One point of the trend line
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: Month,
    /// None when no filtered record falls in this month
    pub totals: Option<MonthTotals>,
}

/// Per-month revenue and profit, Jan to Dec. Months with no data stay
/// missing rather than being reported as zero.
pub fn monthly_trend(records: &[&SalesRecord]) -> Vec<TrendPoint> {
    let mut slots: [Option<MonthTotals>; 12] = [None; 12];
    for r in records {
        let slot = slots[r.month.index()].get_or_insert(MonthTotals {
            revenue: 0.0,
            profit: 0.0,
        });
        slot.revenue += r.revenue;
        slot.profit += r.profit;
    }

    Month::ALL
        .iter()
        .map(|&month| TrendPoint {
            month,
            totals: slots[month.index()],
        })
        .collect()
}
