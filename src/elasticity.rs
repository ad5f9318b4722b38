//! Price elasticity of demand from a least-squares fit of units sold on price

use serde::Serialize;

use crate::error::InsufficientData;
use crate::models::SalesRecord;

/// Elasticity below this value means demand is price-sensitive
pub const ELASTIC_THRESHOLD: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElasticityEstimate {
    pub slope: f64,
    pub intercept: f64,
    pub mean_price: f64,
    pub mean_demand: f64,
    pub elasticity: f64,
    pub observations: usize,
}

impl ElasticityEstimate {
    /// Display convention only; nothing branches on it
    pub fn is_elastic(&self) -> bool {
        self.elasticity < ELASTIC_THRESHOLD
    }
}

/// Fit demand = intercept + slope * price and scale the slope by
/// mean(price) / mean(demand).
pub fn estimate(prices: &[f64], demand: &[f64]) -> Result<ElasticityEstimate, InsufficientData> {
    if prices.len() != demand.len() {
        return Err(InsufficientData::LengthMismatch {
            prices: prices.len(),
            demand: demand.len(),
        });
    }
    let n = prices.len();
    if n < 2 {
        return Err(InsufficientData::TooFewObservations(n));
    }
    if prices.iter().chain(demand).any(|v| !v.is_finite()) {
        return Err(InsufficientData::NonFinite);
    }
    // Checked on the raw prices: an inexact mean leaves a tiny nonzero sxx
    if prices.iter().all(|&p| p == prices[0]) {
        return Err(InsufficientData::ZeroPriceVariance);
    }

    let mean_price = prices.iter().sum::<f64>() / n as f64;
    let mean_demand = demand.iter().sum::<f64>() / n as f64;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (p, d) in prices.iter().zip(demand) {
        let dx = p - mean_price;
        sxx += dx * dx;
        sxy += dx * (d - mean_demand);
    }

    if mean_demand == 0.0 {
        return Err(InsufficientData::ZeroMeanDemand);
    }

    let slope = sxy / sxx;
    Ok(ElasticityEstimate {
        slope,
        intercept: mean_demand - slope * mean_price,
        mean_price,
        mean_demand,
        elasticity: slope * (mean_price / mean_demand),
        observations: n,
    })
}

/// Estimate over sales records, using units sold as demand
pub fn estimate_from_sales<'a, I>(records: I) -> Result<ElasticityEstimate, InsufficientData>
where
    I: IntoIterator<Item = &'a SalesRecord>,
{
    let (prices, demand): (Vec<f64>, Vec<f64>) = records
        .into_iter()
        .map(|r| (r.price_per_unit, r.units_sold as f64))
        .unzip();
    estimate(&prices, &demand)
}
