//! Terminal presentation of the dashboard view

use std::fmt::Write;

use crate::dashboard::{DashboardView, Section};
use crate::elasticity::ELASTIC_THRESHOLD;

const BAR_WIDTH: usize = 40;
const NO_DATA: &str = "no data";

/// A block of the dashboard that can be shown on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Kpis,
    Trend,
    PriceDemand,
    Elasticity,
    Simulator,
    Scenarios,
    Costs,
    Competitors,
    Insight,
}

impl Panel {
    pub const ALL: [Panel; 9] = [
        Panel::Kpis,
        Panel::Trend,
        Panel::PriceDemand,
        Panel::Elasticity,
        Panel::Simulator,
        Panel::Scenarios,
        Panel::Costs,
        Panel::Competitors,
        Panel::Insight,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Panel::Kpis => "Executive Summary",
            Panel::Trend => "Revenue & Profit Trend",
            Panel::PriceDemand => "Pricing vs Demand",
            Panel::Elasticity => "Price Elasticity Estimation",
            Panel::Simulator => "Revenue Optimisation Simulator",
            Panel::Scenarios => "Pricing Scenario Analysis",
            Panel::Costs => "Cost Structure Breakdown",
            Panel::Competitors => "Competitive Pricing Benchmark",
            Panel::Insight => "Insight",
        }
    }

    /// Machine-readable counterpart of the panel
    pub fn json(self, view: &DashboardView) -> serde_json::Result<serde_json::Value> {
        match self {
            Panel::Kpis => serde_json::to_value(&view.kpis),
            Panel::Trend => serde_json::to_value(&view.trend),
            Panel::PriceDemand => serde_json::to_value(&view.price_demand),
            Panel::Elasticity => serde_json::to_value(&view.elasticity),
            Panel::Simulator => serde_json::to_value(&view.simulator),
            Panel::Scenarios => serde_json::to_value(&view.scenarios),
            Panel::Costs => serde_json::to_value(&view.costs),
            Panel::Competitors => serde_json::to_value(&view.competitors),
            Panel::Insight => serde_json::to_value(view.insight),
        }
    }
}

impl std::str::FromStr for Panel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kpis" | "summary" => Ok(Panel::Kpis),
            "trend" => Ok(Panel::Trend),
            "scatter" | "demand" => Ok(Panel::PriceDemand),
            "elasticity" => Ok(Panel::Elasticity),
            "simulator" | "simulate" => Ok(Panel::Simulator),
            "scenarios" => Ok(Panel::Scenarios),
            "costs" => Ok(Panel::Costs),
            "competitors" => Ok(Panel::Competitors),
            "insight" => Ok(Panel::Insight),
            other => Err(format!("unknown panel '{}'", other)),
        }
    }
}

/// Format with thousands separators and no decimals, e.g. `-1,234,568`
pub fn group_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value);
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(d) if d.chars().any(|c| c != '0') => ("-", d),
        Some(d) => ("", d),
        None => ("", rounded.as_str()),
    };

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("{}{}", sign, out)
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let len = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "#".repeat(len.clamp(1, BAR_WIDTH))
}

fn heading(out: &mut String, panel: Panel) {
    let _ = writeln!(out, "=== {} ===", panel.title());
}

fn no_data<T>(out: &mut String, section: &Section<T>) -> bool {
    if let Section::NoData(reason) = section {
        let _ = writeln!(out, "  {} ({})", NO_DATA, reason);
        true
    } else {
        false
    }
}

fn write_kpis(out: &mut String, view: &DashboardView) {
    let k = &view.kpis;
    let avg = k
        .mean_price
        .map(|p| format!("{:.2}", p))
        .unwrap_or_else(|| NO_DATA.to_string());
    let _ = writeln!(out, "  {:<20} {:>16}", "Total Revenue (₹)", group_thousands(k.total_revenue));
    let _ = writeln!(out, "  {:<20} {:>16}", "Total Profit (₹)", group_thousands(k.total_profit));
    let _ = writeln!(out, "  {:<20} {:>16}", "Avg Price (₹)", avg);
    let _ = writeln!(out, "  {:<20} {:>16}", "Total Units Sold", group_thousands(k.total_units as f64));
    let _ = writeln!(out, "  ({} records across {} cities)", k.records, k.cities);
}

fn write_trend(out: &mut String, view: &DashboardView) {
    let max = view
        .trend
        .iter()
        .filter_map(|p| p.totals)
        .map(|t| t.revenue.max(t.profit))
        .fold(0.0, f64::max);

    let _ = writeln!(out, "  {:<5} {:>14} {:>14}", "Month", "Revenue", "Profit");
    for point in &view.trend {
        match point.totals {
            Some(t) => {
                let _ = writeln!(
                    out,
                    "  {:<5} {:>14} {:>14}  {}",
                    point.month,
                    group_thousands(t.revenue),
                    group_thousands(t.profit),
                    bar(t.revenue, max)
                );
            }
            None => {
                let _ = writeln!(out, "  {:<5} {:>14} {:>14}", point.month, "-", "-");
            }
        }
    }
}

fn write_price_demand(out: &mut String, view: &DashboardView) {
    if view.price_demand.is_empty() {
        let _ = writeln!(out, "  {}", NO_DATA);
        return;
    }
    let mut points: Vec<_> = view.price_demand.iter().collect();
    points.sort_by(|a, b| a.price.total_cmp(&b.price));
    let max = points.iter().map(|p| p.units_sold).max().unwrap_or(0) as f64;

    let _ = writeln!(out, "  {:>8} {:>10}  {:<12} {}", "Price", "Units", "City", "Month");
    for p in points {
        let _ = writeln!(
            out,
            "  {:>8.2} {:>10}  {:<12} {:<4} {}",
            p.price,
            group_thousands(p.units_sold as f64),
            p.city,
            p.month,
            bar(p.units_sold as f64, max)
        );
    }
}

fn write_elasticity(out: &mut String, view: &DashboardView) {
    if no_data(out, &view.elasticity) {
        return;
    }
    if let Some(est) = view.elasticity.ready() {
        let reading = if est.is_elastic() {
            "price-sensitive demand"
        } else {
            "inelastic demand"
        };
        let _ = writeln!(out, "  Estimated Price Elasticity: {:.2} ({})", est.elasticity, reading);
        let _ = writeln!(
            out,
            "  fit: units = {:.1} {:+.1} x price over {} observations",
            est.intercept, est.slope, est.observations
        );
    }
    let _ = writeln!(
        out,
        "  Elasticity < {} indicates price-sensitive demand",
        ELASTIC_THRESHOLD
    );
}

fn write_simulator(out: &mut String, view: &DashboardView) {
    let s = &view.simulator;
    let _ = writeln!(out, "  Price {:.2}, cost per unit {:.2}", s.price, s.cost_per_unit);
    let _ = writeln!(out, "  {:<22} {:>14}", "Expected Demand", group_thousands(s.expected_demand));
    let _ = writeln!(out, "  {:<22} {:>14}", "Expected Revenue (₹)", group_thousands(s.expected_revenue));
    let _ = writeln!(out, "  {:<22} {:>14}", "Expected Profit (₹)", group_thousands(s.expected_profit));
}

fn write_scenarios(out: &mut String, view: &DashboardView) {
    if no_data(out, &view.scenarios) {
        return;
    }
    let Some(chart) = view.scenarios.ready() else {
        return;
    };
    let _ = writeln!(out, "  {:>8} {:>14} {:>14}", "Price", "Revenue", "Profit");
    for s in &chart.points {
        let _ = writeln!(
            out,
            "  {:>8.2} {:>14} {:>14}",
            s.price_option,
            group_thousands(s.revenue),
            group_thousands(s.profit)
        );
    }
    if let Some(best) = &chart.best_revenue {
        let _ = writeln!(out, "  highest revenue at price {:.2}", best.price_option);
    }
    if let Some(best) = &chart.best_profit {
        let _ = writeln!(out, "  highest profit at price {:.2}", best.price_option);
    }
}

fn write_costs(out: &mut String, view: &DashboardView) {
    if no_data(out, &view.costs) {
        return;
    }
    let Some(costs) = view.costs.ready() else {
        return;
    };
    for slice in &costs.slices {
        let _ = writeln!(
            out,
            "  {:<20} {:>4.0}%  {}",
            slice.component,
            slice.share,
            bar(slice.share, 100.0)
        );
    }
    if !costs.sums_to_hundred() {
        let _ = writeln!(
            out,
            "  note: listed shares total {:.1}%, shown normalised",
            costs.total_percentage
        );
    }
}

fn write_competitors(out: &mut String, view: &DashboardView) {
    if no_data(out, &view.competitors) {
        return;
    }
    let Some(bench) = view.competitors.ready() else {
        return;
    };
    let own = bench
        .own_avg_price
        .map(|p| format!("{:.2}", p))
        .unwrap_or_else(|| NO_DATA.to_string());

    let _ = writeln!(out, "  {:<5} {:>12}", "Month", "Competitor");
    for c in &bench.series {
        let _ = writeln!(out, "  {:<5} {:>12.2}", c.month, c.competitor_avg_price);
    }
    let _ = writeln!(out, "  Our avg price: {}", own);
    if let Some(gap) = bench.price_gap() {
        let _ = writeln!(out, "  Gap to competitor average: {:+.2}", gap);
    }
}

pub fn render_panel(view: &DashboardView, panel: Panel) -> String {
    let mut out = String::new();
    heading(&mut out, panel);
    match panel {
        Panel::Kpis => write_kpis(&mut out, view),
        Panel::Trend => write_trend(&mut out, view),
        Panel::PriceDemand => write_price_demand(&mut out, view),
        Panel::Elasticity => write_elasticity(&mut out, view),
        Panel::Simulator => write_simulator(&mut out, view),
        Panel::Scenarios => write_scenarios(&mut out, view),
        Panel::Costs => write_costs(&mut out, view),
        Panel::Competitors => write_competitors(&mut out, view),
        Panel::Insight => {
            let _ = writeln!(out, "  {}", view.insight);
        }
    }
    out
}

/// Render several panels separated by blank lines
pub fn render(view: &DashboardView, panels: &[Panel]) -> String {
    let mut out = String::new();
    if !view.unknown_cities.is_empty() {
        let _ = writeln!(out, "(no sales for: {})\n", view.unknown_cities.join(", "));
    }
    let body: Vec<String> = panels.iter().map(|p| render_panel(view, *p)).collect();
    out.push_str(&body.join("\n"));
    out
}
