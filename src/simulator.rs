//! Revenue optimisation simulator
//!
//! A linear demand model evaluated at a chosen price and unit cost.

use serde::{Deserialize, Serialize};

use crate::error::SimulatorError;

pub const PRICE_MIN: f64 = 20.0;
pub const PRICE_MAX: f64 = 35.0;
pub const PRICE_DEFAULT: f64 = 25.0;
pub const COST_MIN: f64 = 8.0;
pub const COST_MAX: f64 = 18.0;
pub const COST_DEFAULT: f64 = 12.0;

/// demand = intercept - slope * price, floored at zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandModel {
    pub intercept: f64,
    pub slope: f64,
}

impl Default for DemandModel {
    fn default() -> Self {
        Self {
            intercept: 15000.0,
            slope: 300.0,
        }
    }
}

impl DemandModel {
    /// Expected units at `price`. Never negative, whatever the price.
    pub fn demand_at(&self, price: f64) -> f64 {
        (self.intercept - price * self.slope).max(0.0)
    }

    /// Evaluate the model without bounds checks
    pub fn evaluate(&self, price: f64, cost_per_unit: f64) -> SimulatorOutput {
        let expected_demand = self.demand_at(price);
        SimulatorOutput {
            price,
            cost_per_unit,
            expected_demand,
            expected_revenue: price * expected_demand,
            expected_profit: (price - cost_per_unit) * expected_demand,
        }
    }
}

/// Slider values. Price and cost are independent; cost may exceed price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulatorInput {
    price: f64,
    cost_per_unit: f64,
}

impl Default for SimulatorInput {
    fn default() -> Self {
        Self {
            price: PRICE_DEFAULT,
            cost_per_unit: COST_DEFAULT,
        }
    }
}

impl SimulatorInput {
    pub fn new(price: f64, cost_per_unit: f64) -> Result<Self, SimulatorError> {
        check_range("price", price, PRICE_MIN, PRICE_MAX)?;
        check_range("cost per unit", cost_per_unit, COST_MIN, COST_MAX)?;
        Ok(Self {
            price,
            cost_per_unit,
        })
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn cost_per_unit(&self) -> f64 {
        self.cost_per_unit
    }

    pub fn with_price(self, price: f64) -> Result<Self, SimulatorError> {
        Self::new(price, self.cost_per_unit)
    }

    pub fn with_cost(self, cost_per_unit: f64) -> Result<Self, SimulatorError> {
        Self::new(self.price, cost_per_unit)
    }
}

fn check_range(input: &'static str, value: f64, min: f64, max: f64) -> Result<(), SimulatorError> {
    // NaN fails both comparisons, so test for containment rather than exclusion
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SimulatorError::OutOfRange {
            input,
            value,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulatorOutput {
    pub price: f64,
    pub cost_per_unit: f64,
    pub expected_demand: f64,
    pub expected_revenue: f64,
    pub expected_profit: f64,
}

/// Run the simulator for validated slider values
pub fn simulate(model: &DemandModel, input: &SimulatorInput) -> SimulatorOutput {
    model.evaluate(input.price(), input.cost_per_unit())
}
