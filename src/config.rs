//! Dashboard configuration: which sheet holds which dataset, and the
//! demand model behind the simulator.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::simulator::DemandModel;

/// Logical dataset role, independent of the physical sheet name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SheetRole {
    Historical,
    Competitor,
    Scenario,
    Cost,
}

impl SheetRole {
    pub const ALL: [SheetRole; 4] = [
        SheetRole::Historical,
        SheetRole::Competitor,
        SheetRole::Scenario,
        SheetRole::Cost,
    ];
}

impl fmt::Display for SheetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SheetRole::Historical => "historical sales",
            SheetRole::Competitor => "competitor prices",
            SheetRole::Scenario => "pricing scenario",
            SheetRole::Cost => "cost structure",
        };
        f.write_str(name)
    }
}

/// Mapping from dataset role to the sheet name in the workbook
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetMapping {
    pub historical: String,
    pub competitor: String,
    pub scenario: String,
    pub cost: String,
}

impl Default for SheetMapping {
    fn default() -> Self {
        Self {
            historical: "Historical_Sales".to_string(),
            // Unconfirmed: the source workbook's competitor sheet name is not known
            competitor: "Competitor_Pricing".to_string(),
            scenario: "Scenario_Simulation".to_string(),
            cost: "Cost_Structure".to_string(),
        }
    }
}

impl SheetMapping {
    pub fn sheet_for(&self, role: SheetRole) -> &str {
        match role {
            SheetRole::Historical => &self.historical,
            SheetRole::Competitor => &self.competitor,
            SheetRole::Scenario => &self.scenario,
            SheetRole::Cost => &self.cost,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub sheets: SheetMapping,
    pub demand_model: DemandModel,
}

impl DashboardConfig {
    /// Load from a TOML file. Keys missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: DashboardConfig = toml::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
