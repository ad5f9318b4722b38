//! Typed loading of the four datasets, with a process-wide cache
//!
//! Sheets are located through the configured [`SheetMapping`]; columns are
//! matched by header text, so column order and extra columns don't matter.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, info, warn};

use crate::config::{SheetMapping, SheetRole};
use crate::error::LoadError;
use crate::models::{self, CompetitorRecord, CostComponent, Datasets, Month, SalesRecord, ScenarioRecord};
use crate::workbook::{self, Cell, Row, Sheet, TabularSource};

/// Header row plus the data rows beneath it
pub struct Table<'a> {
    sheet: &'a str,
    headers: Vec<String>,
    rows: &'a [Row],
}

impl<'a> Table<'a> {
    /// The first non-blank row is the header
    pub fn from_sheet(sheet: &'a Sheet) -> Result<Self, LoadError> {
        let header_pos = sheet
            .rows
            .iter()
            .position(|r| r.cells.iter().any(|c| !c.is_blank()))
            .ok_or_else(|| LoadError::EmptySheet {
                sheet: sheet.name.clone(),
            })?;
        let headers = sheet.rows[header_pos]
            .cells
            .iter()
            .map(|c| c.as_text().unwrap_or_default())
            .collect();
        Ok(Self {
            sheet: &sheet.name,
            headers,
            rows: &sheet.rows[header_pos + 1..],
        })
    }

    pub fn column(&self, name: &str) -> Result<usize, LoadError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LoadError::MissingColumn {
                sheet: self.sheet.to_string(),
                column: name.to_string(),
                found: self.headers.iter().filter(|h| !h.is_empty()).cloned().collect(),
            })
    }

    /// Data rows, skipping rows with no content
    pub fn rows(&self) -> impl Iterator<Item = &'a Row> {
        let rows: &'a [Row] = self.rows;
        rows.iter()
            .filter(|r| r.cells.iter().any(|c| !c.is_blank()))
    }

    fn cell<'r>(&self, row: &'r Row, col: usize) -> &'r Cell {
        row.cells.get(col).unwrap_or(&Cell::Empty)
    }

    fn invalid(&self, row: &Row, col: usize, reason: String) -> LoadError {
        LoadError::InvalidCell {
            sheet: self.sheet.to_string(),
            row: row.number,
            column: self.headers[col].clone(),
            reason,
        }
    }

    pub fn text(&self, row: &Row, col: usize) -> Result<String, LoadError> {
        match self.cell(row, col).as_text() {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(self.invalid(row, col, "expected text, found an empty cell".to_string())),
        }
    }

    pub fn number(&self, row: &Row, col: usize) -> Result<f64, LoadError> {
        let cell = self.cell(row, col);
        match cell.as_number() {
            Some(n) if n.is_finite() => Ok(n),
            _ => Err(self.invalid(row, col, format!("expected a number, found {}", describe(cell)))),
        }
    }

    pub fn positive(&self, row: &Row, col: usize) -> Result<f64, LoadError> {
        let n = self.number(row, col)?;
        if n > 0.0 {
            Ok(n)
        } else {
            Err(self.invalid(row, col, format!("expected a positive value, found {}", n)))
        }
    }

    pub fn count(&self, row: &Row, col: usize) -> Result<u64, LoadError> {
        let n = self.number(row, col)?;
        if n >= 0.0 && n.fract() == 0.0 {
            Ok(n as u64)
        } else {
            Err(self.invalid(row, col, format!("expected a whole non-negative count, found {}", n)))
        }
    }

    pub fn month(&self, row: &Row, col: usize) -> Result<Month, LoadError> {
        let label = self.text(row, col)?;
        label.parse().map_err(|reason| self.invalid(row, col, reason))
    }
}

fn describe(cell: &Cell) -> String {
    match cell {
        Cell::Empty => "an empty cell".to_string(),
        Cell::Text(s) => format!("'{}'", s),
        Cell::Bool(b) => format!("boolean {}", b),
        Cell::Error(e) => format!("error value {}", e),
        Cell::Number(n) => n.to_string(),
    }
}

pub fn parse_sales(sheet: &Sheet) -> Result<Vec<SalesRecord>, LoadError> {
    let table = Table::from_sheet(sheet)?;
    let city = table.column("City")?;
    let month = table.column("Month")?;
    let price = table.column("Price_per_Unit")?;
    let units = table.column("Units_Sold")?;
    let revenue = table.column("Revenue")?;
    let profit = table.column("Profit")?;

    table
        .rows()
        .map(|row| -> Result<SalesRecord, LoadError> {
            Ok(SalesRecord {
                city: table.text(row, city)?,
                month: table.month(row, month)?,
                price_per_unit: table.positive(row, price)?,
                units_sold: table.count(row, units)?,
                revenue: table.number(row, revenue)?,
                profit: table.number(row, profit)?,
            })
        })
        .collect()
}

pub fn parse_competitors(sheet: &Sheet) -> Result<Vec<CompetitorRecord>, LoadError> {
    let table = Table::from_sheet(sheet)?;
    let month = table.column("Month")?;
    let price = table.column("Competitor_Avg_Price")?;

    table
        .rows()
        .map(|row| -> Result<CompetitorRecord, LoadError> {
            Ok(CompetitorRecord {
                month: table.month(row, month)?,
                competitor_avg_price: table.positive(row, price)?,
            })
        })
        .collect()
}

pub fn parse_scenarios(sheet: &Sheet) -> Result<Vec<ScenarioRecord>, LoadError> {
    let table = Table::from_sheet(sheet)?;
    let option = table.column("Price_Option")?;
    let revenue = table.column("Revenue")?;
    let profit = table.column("Profit")?;

    table
        .rows()
        .map(|row| -> Result<ScenarioRecord, LoadError> {
            Ok(ScenarioRecord {
                price_option: table.number(row, option)?,
                revenue: table.number(row, revenue)?,
                profit: table.number(row, profit)?,
            })
        })
        .collect()
}

pub fn parse_costs(sheet: &Sheet) -> Result<Vec<CostComponent>, LoadError> {
    let table = Table::from_sheet(sheet)?;
    let component = table.column("Component")?;
    let share = table.column("Cost_Percentage")?;

    table
        .rows()
        .map(|row| -> Result<CostComponent, LoadError> {
            Ok(CostComponent {
                component: table.text(row, component)?,
                cost_percentage: table.number(row, share)?,
            })
        })
        .collect()
}

fn read_role(
    source: &mut dyn TabularSource,
    sheets: &SheetMapping,
    role: SheetRole,
) -> Result<Sheet, LoadError> {
    let name = sheets.sheet_for(role);
    if !source.sheet_names().iter().any(|s| s == name) {
        return Err(LoadError::MissingSheet {
            role,
            sheet: name.to_string(),
            available: source.sheet_names().to_vec(),
        });
    }
    source.read_sheet(name)
}

/// Load all four datasets from `path`. Any failure aborts the load.
pub fn load(path: &Path, sheets: &SheetMapping) -> Result<Datasets, LoadError> {
    let mut source = workbook::open(path)?;
    debug!(
        workbook = %path.display(),
        sheets = ?source.sheet_names(),
        "workbook opened"
    );

    let sales = parse_sales(&read_role(source.as_mut(), sheets, SheetRole::Historical)?)?;
    let competitors =
        parse_competitors(&read_role(source.as_mut(), sheets, SheetRole::Competitor)?)?;
    let scenarios = parse_scenarios(&read_role(source.as_mut(), sheets, SheetRole::Scenario)?)?;
    let costs = parse_costs(&read_role(source.as_mut(), sheets, SheetRole::Cost)?)?;

    let share_total: f64 = costs.iter().map(|c| c.cost_percentage).sum();
    if !costs.is_empty() && !models::shares_sum_to_hundred(share_total) {
        warn!(share_total, "cost shares do not add up to 100%");
    }

    info!(
        workbook = %path.display(),
        sales = sales.len(),
        competitors = competitors.len(),
        scenarios = scenarios.len(),
        costs = costs.len(),
        "datasets loaded"
    );

    Ok(Datasets {
        sales,
        competitors,
        scenarios,
        costs,
    })
}

/// Sheet names present in the source, for diagnostics
pub fn list_sheets(path: &Path) -> Result<Vec<String>, LoadError> {
    Ok(workbook::open(path)?.sheet_names().to_vec())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    sheets: SheetMapping,
}

type Cache = Mutex<HashMap<CacheKey, Arc<Datasets>>>;

static CACHE: OnceLock<Cache> = OnceLock::new();

/// Load once per (source, sheet mapping) and share the result for the rest
/// of the process. Cached datasets are never modified.
pub fn load_cached(path: &Path, sheets: &SheetMapping) -> Result<Arc<Datasets>, LoadError> {
    let key = CacheKey {
        path: path.canonicalize().unwrap_or_else(|_| path.to_path_buf()),
        sheets: sheets.clone(),
    };
    let cache = CACHE.get_or_init(Default::default);

    if let Some(hit) = cache
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        debug!(workbook = %path.display(), "dataset cache hit");
        return Ok(Arc::clone(hit));
    }

    // Loading happens outside the lock; a racing loader's result is discarded
    let loaded = Arc::new(load(path, sheets)?);
    let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(guard.entry(key).or_insert(loaded)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::tests::write_xlsx;

    fn sales_rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["City", "Month", "Price_per_Unit", "Units_Sold", "Revenue", "Profit"],
            vec!["Delhi", "Jan", "25", "1000", "25000", "12000"],
            vec!["Delhi", "Feb", "30", "800", "24000", "13000"],
            vec![],
            vec!["Mumbai", "Jan", "20", "1200", "24000", "9000"],
        ]
    }

    fn write_sample(path: &Path, competitor_sheet: &str) {
        write_xlsx(
            path,
            &[
                ("Historical_Sales", sales_rows()),
                (
                    competitor_sheet,
                    vec![
                        vec!["Month", "Competitor_Avg_Price"],
                        vec!["Jan", "26.5"],
                        vec!["Feb", "27"],
                    ],
                ),
                (
                    "Scenario_Simulation",
                    vec![
                        vec!["Price_Option", "Revenue", "Profit"],
                        vec!["22", "200000", "80000"],
                        vec!["28", "210000", "95000"],
                    ],
                ),
                (
                    "Cost_Structure",
                    vec![
                        vec!["Component", "Cost_Percentage"],
                        vec!["Fruit Pulp", "45"],
                        vec!["Packaging", "25"],
                        vec!["Logistics", "30"],
                    ],
                ),
            ],
        );
    }

    #[test]
    fn loads_all_four_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_sample(&path, "Competitor_Pricing");

        let data = load(&path, &SheetMapping::default()).unwrap();
        assert_eq!(data.sales.len(), 3);
        assert_eq!(data.sales[1].month, Month::Feb);
        assert_eq!(data.sales[2].city, "Mumbai");
        assert_eq!(data.sales[2].units_sold, 1200);
        assert_eq!(data.competitors.len(), 2);
        assert_eq!(data.competitors[0].competitor_avg_price, 26.5);
        assert_eq!(data.scenarios.len(), 2);
        assert_eq!(data.costs.len(), 3);
        assert_eq!(data.cities(), vec!["Delhi".to_string(), "Mumbai".to_string()]);
    }

    #[test]
    fn misnamed_sheet_reports_what_is_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_sample(&path, "Competitor_Benchmark");

        let err = load(&path, &SheetMapping::default()).unwrap_err();
        match err {
            LoadError::MissingSheet {
                role,
                sheet,
                available,
            } => {
                assert_eq!(role, SheetRole::Competitor);
                assert_eq!(sheet, "Competitor_Pricing");
                assert!(available.contains(&"Competitor_Benchmark".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }

        let remapped = SheetMapping {
            competitor: "Competitor_Benchmark".to_string(),
            ..SheetMapping::default()
        };
        assert_eq!(load(&path, &remapped).unwrap().competitors.len(), 2);
    }

    #[test]
    fn missing_column_is_fatal() {
        let sheet = Sheet {
            name: "Cost_Structure".to_string(),
            rows: vec![Row {
                number: 1,
                cells: vec![Cell::Text("Component".into()), Cell::Text("Share".into())],
            }],
        };
        let err = parse_costs(&sheet).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingColumn { ref column, ref found, .. }
                if column == "Cost_Percentage" && found.len() == 2
        ));
    }

    #[test]
    fn bad_cells_name_their_row_and_column() {
        let sheet = Sheet {
            name: "Historical_Sales".to_string(),
            rows: vec![
                Row {
                    number: 1,
                    cells: ["City", "Month", "Price_per_Unit", "Units_Sold", "Revenue", "Profit"]
                        .iter()
                        .map(|h| Cell::Text(h.to_string()))
                        .collect(),
                },
                Row {
                    number: 2,
                    cells: vec![
                        Cell::Text("Pune".into()),
                        Cell::Text("Jan".into()),
                        Cell::Number(25.0),
                        Cell::Number(10.5),
                        Cell::Number(262.5),
                        Cell::Number(100.0),
                    ],
                },
            ],
        };
        let err = parse_sales(&sheet).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidCell { row: 2, ref column, .. } if column == "Units_Sold"
        ));
    }

    #[test]
    fn numeric_months_are_accepted() {
        let sheet = Sheet {
            name: "Competitors".to_string(),
            rows: vec![
                Row {
                    number: 1,
                    cells: vec![Cell::Text("Month".into()), Cell::Text("Competitor_Avg_Price".into())],
                },
                Row {
                    number: 2,
                    cells: vec![Cell::Number(3.0), Cell::Number(24.0)],
                },
            ],
        };
        assert_eq!(parse_competitors(&sheet).unwrap()[0].month, Month::Mar);
    }

    #[test]
    fn empty_sheet_has_no_header() {
        let sheet = Sheet {
            name: "Scenario_Simulation".to_string(),
            rows: vec![],
        };
        assert!(matches!(parse_scenarios(&sheet), Err(LoadError::EmptySheet { .. })));
    }

    #[test]
    fn loads_from_csv_directory() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| std::fs::write(dir.path().join(name), body).unwrap();
        write(
            "Historical_Sales.csv",
            "City,Month,Price_per_Unit,Units_Sold,Revenue,Profit\nPune,Mar,22,500,11000,4000\n",
        );
        write("Competitor_Pricing.csv", "Month,Competitor_Avg_Price\nMar,23\n");
        write("Scenario_Simulation.csv", "Price_Option,Revenue,Profit\n22,11000,4000\n");
        write("Cost_Structure.csv", "Component,Cost_Percentage\nAll,100\n");

        let data = load(dir.path(), &SheetMapping::default()).unwrap();
        assert_eq!(data.sales[0].city, "Pune");
        assert_eq!(data.costs[0].cost_percentage, 100.0);
    }

    #[test]
    fn cached_load_returns_the_same_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_sample(&path, "Competitor_Pricing");

        let first = load_cached(&path, &SheetMapping::default()).unwrap();
        let second = load_cached(&path, &SheetMapping::default()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_cached(&dir.path().join("absent.xlsx"), &SheetMapping::default()).unwrap_err();
        assert!(matches!(err, LoadError::SourceNotFound(_)));
    }
}
