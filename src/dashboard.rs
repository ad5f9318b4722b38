//! Dashboard view model
//!
//! [`build_view`] is a pure function from the loaded datasets and the
//! current filter and slider values to everything the dashboard shows.
//! It is recomputed on every interaction; nothing is carried between calls.
//! A section that cannot be computed reports `NoData` without affecting
//! the other sections.

use serde::Serialize;
use tracing::debug;

use crate::elasticity::{self, ElasticityEstimate};
use crate::filter::FilterSelection;
use crate::metrics::{self, Kpis, TrendPoint};
use crate::models::{self, CompetitorRecord, Datasets, Month, ScenarioRecord};
use crate::simulator::{self, DemandModel, SimulatorInput, SimulatorOutput};

pub const INSIGHT: &str = "Segment-based pricing outperforms uniform pricing. \
Premium outlets tolerate higher prices while high-volume outlets require lower pricing to retain demand.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    NoData(String),
}

impl<T> Section<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(v) => Some(v),
            Section::NoData(_) => None,
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Section<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Section::Ready(v),
            Err(e) => Section::NoData(e.to_string()),
        }
    }
}

/// One dot of the price-vs-demand scatter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub city: String,
    pub month: Month,
    pub price: f64,
    pub units_sold: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioChart {
    /// Ordered by price option
    pub points: Vec<ScenarioRecord>,
    pub best_revenue: Option<ScenarioRecord>,
    pub best_profit: Option<ScenarioRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSlice {
    pub component: String,
    pub percentage: f64,
    /// Share of the pie after normalising to the actual total
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub slices: Vec<CostSlice>,
    pub total_percentage: f64,
}

impl CostBreakdown {
    pub fn sums_to_hundred(&self) -> bool {
        models::shares_sum_to_hundred(self.total_percentage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorBenchmark {
    pub series: Vec<CompetitorRecord>,
    /// Reference line: our mean price over the filtered sales
    pub own_avg_price: Option<f64>,
    pub competitor_avg_price: Option<f64>,
}

impl CompetitorBenchmark {
    /// Own average price minus the competitors' average
    pub fn price_gap(&self) -> Option<f64> {
        Some(self.own_avg_price? - self.competitor_avg_price?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub selected_cities: Vec<String>,
    pub unknown_cities: Vec<String>,
    pub kpis: Kpis,
    pub trend: Vec<TrendPoint>,
    pub price_demand: Vec<PricePoint>,
    pub elasticity: Section<ElasticityEstimate>,
    pub simulator: SimulatorOutput,
    pub scenarios: Section<ScenarioChart>,
    pub costs: Section<CostBreakdown>,
    pub competitors: Section<CompetitorBenchmark>,
    pub insight: &'static str,
}

pub fn build_view(
    data: &Datasets,
    selection: &FilterSelection,
    input: &SimulatorInput,
    model: &DemandModel,
) -> DashboardView {
    let filtered = selection.apply(&data.sales);
    debug!(
        kept = filtered.kept.len(),
        removed = filtered.removed,
        "city filter applied"
    );
    let kpis = metrics::compute_kpis(&filtered.kept);

    DashboardView {
        selected_cities: selection.cities().map(str::to_string).collect(),
        unknown_cities: selection.unknown_cities(&data.sales),
        trend: metrics::monthly_trend(&filtered.kept),
        price_demand: filtered
            .kept
            .iter()
            .map(|r| PricePoint {
                city: r.city.clone(),
                month: r.month,
                price: r.price_per_unit,
                units_sold: r.units_sold,
            })
            .collect(),
        elasticity: elasticity::estimate_from_sales(filtered.kept.iter().copied()).into(),
        simulator: simulator::simulate(model, input),
        scenarios: scenario_chart(&data.scenarios),
        costs: cost_breakdown(data),
        competitors: competitor_benchmark(&data.competitors, kpis.mean_price),
        kpis,
        insight: INSIGHT,
    }
}

fn scenario_chart(scenarios: &[ScenarioRecord]) -> Section<ScenarioChart> {
    if scenarios.is_empty() {
        return Section::NoData("scenario table is empty".to_string());
    }
    let mut points = scenarios.to_vec();
    points.sort_by(|a, b| a.price_option.total_cmp(&b.price_option));

    let best_by = |key: fn(&ScenarioRecord) -> f64| {
        points
            .iter()
            .max_by(|a, b| key(a).total_cmp(&key(b)))
            .cloned()
    };
    let best_revenue = best_by(|s: &ScenarioRecord| s.revenue);
    let best_profit = best_by(|s: &ScenarioRecord| s.profit);

    Section::Ready(ScenarioChart {
        points,
        best_revenue,
        best_profit,
    })
}

fn cost_breakdown(data: &Datasets) -> Section<CostBreakdown> {
    let total: f64 = data.costs.iter().map(|c| c.cost_percentage).sum();
    if data.costs.is_empty() || total <= 0.0 {
        return Section::NoData("no cost shares to chart".to_string());
    }
    if data.costs.iter().any(|c| c.cost_percentage < 0.0) {
        return Section::NoData("cost shares cannot be negative".to_string());
    }

    Section::Ready(CostBreakdown {
        slices: data
            .costs
            .iter()
            .map(|c| CostSlice {
                component: c.component.clone(),
                percentage: c.cost_percentage,
                share: c.cost_percentage / total * 100.0,
            })
            .collect(),
        total_percentage: total,
    })
}

fn competitor_benchmark(
    competitors: &[CompetitorRecord],
    own_avg_price: Option<f64>,
) -> Section<CompetitorBenchmark> {
    if competitors.is_empty() {
        return Section::NoData("competitor price table is empty".to_string());
    }
    Section::Ready(CompetitorBenchmark {
        series: competitors.to_vec(),
        own_avg_price,
        competitor_avg_price: metrics::mean(competitors.iter().map(|c| c.competitor_avg_price)),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{CostComponent, SalesRecord};
    use approx::assert_relative_eq;

    fn sale(city: &str, month: Month, price: f64, units: u64) -> SalesRecord {
        SalesRecord {
            city: city.to_string(),
            month,
            price_per_unit: price,
            units_sold: units,
            revenue: price * units as f64,
            profit: (price - 12.0) * units as f64,
        }
    }

    pub(crate) fn sample_data() -> Datasets {
        Datasets {
            sales: vec![
                sale("Delhi", Month::Jan, 20.0, 9000),
                sale("Delhi", Month::Feb, 25.0, 7500),
                sale("Delhi", Month::Mar, 30.0, 6000),
                sale("Mumbai", Month::Jan, 28.0, 5000),
                sale("Pune", Month::Jun, 22.0, 8000),
            ],
            competitors: vec![
                CompetitorRecord {
                    month: Month::Jan,
                    competitor_avg_price: 24.0,
                },
                CompetitorRecord {
                    month: Month::Feb,
                    competitor_avg_price: 26.0,
                },
            ],
            scenarios: vec![
                ScenarioRecord {
                    price_option: 30.0,
                    revenue: 180_000.0,
                    profit: 100_000.0,
                },
                ScenarioRecord {
                    price_option: 25.0,
                    revenue: 187_500.0,
                    profit: 97_500.0,
                },
            ],
            costs: vec![
                CostComponent {
                    component: "Fruit".to_string(),
                    cost_percentage: 60.0,
                },
                CostComponent {
                    component: "Packaging".to_string(),
                    cost_percentage: 40.0,
                },
            ],
        }
    }

    fn view_for(selection: &FilterSelection) -> DashboardView {
        build_view(
            &sample_data(),
            selection,
            &SimulatorInput::default(),
            &DemandModel::default(),
        )
    }

    #[test]
    fn full_selection_covers_every_section() {
        let data = sample_data();
        let view = view_for(&FilterSelection::all(&data.sales));

        assert_eq!(view.selected_cities, vec!["Delhi", "Mumbai", "Pune"]);
        assert_eq!(view.kpis.records, 5);
        assert_eq!(view.price_demand.len(), 5);
        assert!(view.elasticity.ready().is_some());
        assert_relative_eq!(view.simulator.expected_revenue, 187_500.0);

        let scenarios = view.scenarios.ready().unwrap();
        assert_eq!(scenarios.points[0].price_option, 25.0);
        assert_eq!(scenarios.best_revenue.as_ref().unwrap().price_option, 25.0);
        assert_eq!(scenarios.best_profit.as_ref().unwrap().price_option, 30.0);

        let costs = view.costs.ready().unwrap();
        assert!(costs.sums_to_hundred());
        assert_relative_eq!(costs.slices[0].share, 60.0);

        let bench = view.competitors.ready().unwrap();
        assert_relative_eq!(bench.competitor_avg_price.unwrap(), 25.0);
        assert_relative_eq!(bench.own_avg_price.unwrap(), 25.0);
        assert_relative_eq!(bench.price_gap().unwrap(), 0.0);
        assert_eq!(view.insight, INSIGHT);
    }

    #[test]
    fn subset_revenue_matches_selected_rows_and_never_exceeds_total() {
        let data = sample_data();
        let all = view_for(&FilterSelection::all(&data.sales));
        let delhi = view_for(&FilterSelection::of(["Delhi"]));

        let expected: f64 = data
            .sales
            .iter()
            .filter(|r| r.city == "Delhi")
            .map(|r| r.revenue)
            .sum();
        assert_relative_eq!(delhi.kpis.total_revenue, expected);
        assert!(delhi.kpis.total_revenue <= all.kpis.total_revenue);

        // Delhi alone is perfectly linear with slope -300
        let est = delhi.elasticity.ready().unwrap();
        assert_relative_eq!(est.elasticity, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_selection_degrades_only_the_sales_sections() {
        let view = view_for(&FilterSelection::none());

        assert_eq!(view.kpis.total_revenue, 0.0);
        assert_eq!(view.kpis.total_profit, 0.0);
        assert_eq!(view.kpis.total_units, 0);
        assert_eq!(view.kpis.mean_price, None);
        assert!(view.trend.iter().all(|p| p.totals.is_none()));
        assert!(matches!(view.elasticity, Section::NoData(_)));

        // Sections fed by other sheets still render
        assert!(view.scenarios.ready().is_some());
        assert!(view.costs.ready().is_some());
        let bench = view.competitors.ready().unwrap();
        assert_eq!(bench.own_avg_price, None);
        assert_eq!(bench.price_gap(), None);
    }

    #[test]
    fn single_price_point_reports_no_elasticity() {
        let view = view_for(&FilterSelection::of(["Mumbai"]));
        assert_eq!(view.kpis.records, 1);
        assert!(matches!(view.elasticity, Section::NoData(ref reason) if reason.contains("insufficient data")));
    }

    #[test]
    fn unknown_cities_are_surfaced() {
        let view = view_for(&FilterSelection::of(["Pune", "Goa"]));
        assert_eq!(view.unknown_cities, vec!["Goa"]);
        assert_eq!(view.kpis.records, 1);
    }

    #[test]
    fn empty_external_tables_report_no_data() {
        let data = Datasets {
            sales: sample_data().sales,
            ..Default::default()
        };
        let view = build_view(
            &data,
            &FilterSelection::all(&data.sales),
            &SimulatorInput::default(),
            &DemandModel::default(),
        );
        assert!(matches!(view.scenarios, Section::NoData(_)));
        assert!(matches!(view.costs, Section::NoData(_)));
        assert!(matches!(view.competitors, Section::NoData(_)));
        assert!(view.elasticity.ready().is_some());
    }

    #[test]
    fn unbalanced_cost_shares_are_normalised() {
        let mut data = sample_data();
        data.costs[1].cost_percentage = 20.0;
        let view = build_view(
            &data,
            &FilterSelection::none(),
            &SimulatorInput::default(),
            &DemandModel::default(),
        );
        let costs = view.costs.ready().unwrap();
        assert!(!costs.sums_to_hundred());
        assert_relative_eq!(costs.total_percentage, 80.0);
        assert_relative_eq!(costs.slices[0].share, 75.0);
    }

    #[test]
    fn near_hundred_cost_shares_count_as_complete() {
        let mut data = sample_data();
        data.costs[1].cost_percentage = 39.8;
        let view = build_view(
            &data,
            &FilterSelection::none(),
            &SimulatorInput::default(),
            &DemandModel::default(),
        );
        assert!(view.costs.ready().unwrap().sums_to_hundred());
        assert!(!models::shares_sum_to_hundred(99.4));
    }

    #[test]
    fn flat_price_city_reports_no_elasticity() {
        let data = Datasets {
            sales: [Month::Jan, Month::Feb, Month::Mar, Month::Apr, Month::May, Month::Jun, Month::Jul]
                .into_iter()
                .zip([7000, 7100, 7200, 7300, 7400, 7500, 7650])
                .map(|(month, units)| sale("Jaipur", month, 24.99, units))
                .collect(),
            ..sample_data()
        };
        let view = build_view(
            &data,
            &FilterSelection::all(&data.sales),
            &SimulatorInput::default(),
            &DemandModel::default(),
        );
        assert_eq!(view.kpis.records, 7);
        assert!(matches!(view.elasticity, Section::NoData(ref reason) if reason.contains("insufficient data")));
        assert!(view.scenarios.ready().is_some());
    }
}
