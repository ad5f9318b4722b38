//! Data models for sales, competitor, scenario and cost data

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Calendar month. Ordering follows the calendar, Jan first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    /// Three-letter label as used in the workbook ("Jan".."Dec")
    pub fn label(self) -> &'static str {
        match self {
            Month::Jan => "Jan",
            Month::Feb => "Feb",
            Month::Mar => "Mar",
            Month::Apr => "Apr",
            Month::May => "May",
            Month::Jun => "Jun",
            Month::Jul => "Jul",
            Month::Aug => "Aug",
            Month::Sep => "Sep",
            Month::Oct => "Oct",
            Month::Nov => "Nov",
            Month::Dec => "Dec",
        }
    }

    /// Zero-based position in the calendar
    pub fn index(self) -> usize {
        self as usize
    }

    /// Month from its 1-based calendar number
    pub fn from_number(n: u32) -> Option<Month> {
        match n {
            1..=12 => Some(Month::ALL[(n - 1) as usize]),
            _ => None,
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for Month {
    type Err = String;

    /// Accepts "Jan", "january", "SEPT" style labels or "1".."12"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u32>() {
            return Month::from_number(n).ok_or_else(|| format!("month number out of range: {}", n));
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.len() >= 3 {
            for month in Month::ALL {
                if full_name(month).starts_with(&lower) {
                    return Ok(month);
                }
            }
        }
        Err(format!("unrecognised month label: '{}'", trimmed))
    }
}

fn full_name(month: Month) -> &'static str {
    match month {
        Month::Jan => "january",
        Month::Feb => "february",
        Month::Mar => "march",
        Month::Apr => "april",
        Month::May => "may",
        Month::Jun => "june",
        Month::Jul => "july",
        Month::Aug => "august",
        Month::Sep => "september",
        Month::Oct => "october",
        Month::Nov => "november",
        Month::Dec => "december",
    }
}

/// One row of the historical sales sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub city: String,
    pub month: Month,
    pub price_per_unit: f64,
    pub units_sold: u64,
    pub revenue: f64, // Expected price * units, not enforced
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorRecord {
    pub month: Month,
    pub competitor_avg_price: f64,
}

/// A precomputed price option from the scenario table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioRecord {
    pub price_option: f64,
    pub revenue: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostComponent {
    pub component: String,
    pub cost_percentage: f64, // Shares are expected to total 100
}

/// Cost shares within this many points of 100 count as complete
pub const COST_SHARE_TOLERANCE: f64 = 0.5;

pub fn shares_sum_to_hundred(total: f64) -> bool {
    (total - 100.0).abs() <= COST_SHARE_TOLERANCE
}

/// All four datasets, loaded once per source and never mutated
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub sales: Vec<SalesRecord>,
    pub competitors: Vec<CompetitorRecord>,
    pub scenarios: Vec<ScenarioRecord>,
    pub costs: Vec<CostComponent>,
}

impl Datasets {
    /// Distinct cities in first-seen order
    pub fn cities(&self) -> Vec<String> {
        let mut cities: Vec<String> = Vec::new();
        for record in &self.sales {
            if !cities.iter().any(|c| c == &record.city) {
                cities.push(record.city.clone());
            }
        }
        cities
    }
}
