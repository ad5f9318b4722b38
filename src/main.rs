//! Pricing Dashboard
//!
//! Pricing, demand and revenue intelligence from a sales workbook.

mod config;
mod dashboard;
mod elasticity;
mod error;
mod filter;
mod loader;
mod metrics;
mod models;
mod render;
mod session;
mod simulator;
mod workbook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::{DashboardConfig, SheetRole};
use crate::dashboard::{build_view, DashboardView};
use crate::filter::FilterSelection;
use crate::models::Datasets;
use crate::render::Panel;
use crate::simulator::{SimulatorInput, COST_DEFAULT, PRICE_DEFAULT};

#[derive(Parser)]
#[command(name = "pricing-dashboard")]
#[command(about = "Pricing, demand and revenue intelligence dashboard")]
struct Cli {
    /// Workbook (.xlsx) or a directory holding one CSV file per sheet
    #[arg(
        short,
        long,
        global = true,
        default_value = "FruitFrost_Pricing_Dashboard_Master.xlsx"
    )]
    workbook: PathBuf,

    /// TOML file with sheet names and demand model settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sheet holding competitor prices (overrides the config file)
    #[arg(long, global = true)]
    competitor_sheet: Option<String>,

    /// Log level for diagnostics on stderr
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
struct CityFilter {
    /// City to include (repeatable). Defaults to every city.
    #[arg(short, long = "city")]
    cities: Vec<String>,

    /// Deselect every city
    #[arg(long, conflicts_with = "cities")]
    no_cities: bool,
}

#[derive(Args)]
struct Sliders {
    /// Price per unit (20-35)
    #[arg(long, default_value_t = PRICE_DEFAULT)]
    price: f64,

    /// Cost per unit (8-18)
    #[arg(long, default_value_t = COST_DEFAULT)]
    cost: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the full dashboard
    Dashboard {
        #[command(flatten)]
        filter: CityFilter,

        #[command(flatten)]
        sliders: Sliders,
    },

    /// Revenue, profit, average price and units sold
    Kpis {
        #[command(flatten)]
        filter: CityFilter,
    },

    /// Monthly revenue and profit, Jan to Dec
    Trend {
        #[command(flatten)]
        filter: CityFilter,
    },

    /// Price elasticity of demand for the selected cities
    Elasticity {
        #[command(flatten)]
        filter: CityFilter,
    },

    /// Evaluate the demand model at a price and unit cost
    Simulate {
        #[command(flatten)]
        sliders: Sliders,
    },

    /// Precomputed pricing scenarios
    Scenarios,

    /// Cost structure breakdown
    Costs,

    /// Competitor prices against our average price
    Competitors {
        #[command(flatten)]
        filter: CityFilter,
    },

    /// List the cities in the sales data
    Cities,

    /// List the sheets in the workbook and the role each one plays
    Sheets,

    /// Explore the dashboard interactively from stdin
    Interactive,

    /// Print a default configuration file
    InitConfig,
}

fn selection_for(filter: &CityFilter, data: &Datasets) -> FilterSelection {
    let selection = if filter.no_cities {
        FilterSelection::none()
    } else if filter.cities.is_empty() {
        FilterSelection::all(&data.sales)
    } else {
        FilterSelection::of(filter.cities.iter().cloned())
    };

    let unknown = selection.unknown_cities(&data.sales);
    if !unknown.is_empty() {
        warn!(?unknown, "selected cities have no sales records");
    }
    selection
}

fn print_view(view: &DashboardView, panels: &[Panel], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", render::render(view, panels)),
        OutputFormat::Json => {
            let json = match panels {
                [panel] => panel.json(view)?,
                _ => serde_json::to_value(view)?,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install the log subscriber")?;

    let mut config = match &cli.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(sheet) = &cli.competitor_sheet {
        config.sheets.competitor = sheet.clone();
    }
    let model = config.demand_model;

    let load = || {
        loader::load_cached(&cli.workbook, &config.sheets)
            .with_context(|| format!("Failed to load {}", cli.workbook.display()))
    };
    let sections = |filter: &CityFilter, input: SimulatorInput, panels: &[Panel]| -> Result<()> {
        let data = load()?;
        let view = build_view(&data, &selection_for(filter, &data), &input, &model);
        print_view(&view, panels, cli.format)
    };
    let all_cities = CityFilter {
        cities: Vec::new(),
        no_cities: false,
    };

    match &cli.command {
        Commands::Dashboard { filter, sliders } => {
            let input = SimulatorInput::new(sliders.price, sliders.cost)?;
            sections(filter, input, &Panel::ALL)?;
        }

        Commands::Kpis { filter } => sections(filter, SimulatorInput::default(), &[Panel::Kpis])?,

        Commands::Trend { filter } => sections(filter, SimulatorInput::default(), &[Panel::Trend])?,

        Commands::Elasticity { filter } => {
            sections(filter, SimulatorInput::default(), &[Panel::Elasticity])?
        }

        Commands::Simulate { sliders } => {
            // The simulator needs no workbook
            let input = SimulatorInput::new(sliders.price, sliders.cost)?;
            let empty = Datasets::default();
            let view = build_view(&empty, &FilterSelection::none(), &input, &model);
            print_view(&view, &[Panel::Simulator], cli.format)?;
        }

        Commands::Scenarios => sections(&all_cities, SimulatorInput::default(), &[Panel::Scenarios])?,

        Commands::Costs => sections(&all_cities, SimulatorInput::default(), &[Panel::Costs])?,

        Commands::Competitors { filter } => {
            sections(filter, SimulatorInput::default(), &[Panel::Competitors])?
        }

        Commands::Cities => {
            let data = load()?;
            let cities = data.cities();
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cities)?),
                OutputFormat::Text if cities.is_empty() => println!("No sales records in workbook."),
                OutputFormat::Text => {
                    println!("Cities:");
                    for city in cities {
                        println!("  {}", city);
                    }
                }
            }
        }

        Commands::Sheets => {
            let sheets = loader::list_sheets(&cli.workbook)
                .with_context(|| format!("Failed to open {}", cli.workbook.display()))?;
            println!("Sheets in {}:", cli.workbook.display());
            for sheet in &sheets {
                let roles: Vec<String> = SheetRole::ALL
                    .iter()
                    .filter(|role| config.sheets.sheet_for(**role) == sheet)
                    .map(|role| role.to_string())
                    .collect();
                if roles.is_empty() {
                    println!("  {}", sheet);
                } else {
                    println!("  {:<30} <- {}", sheet, roles.join(", "));
                }
            }
            for role in SheetRole::ALL {
                let wanted = config.sheets.sheet_for(role);
                if !sheets.iter().any(|s| s == wanted) {
                    println!("  missing: '{}' ({} data)", wanted, role);
                }
            }
        }

        Commands::Interactive => {
            // Fail fast on a bad workbook before entering the loop
            let _: Arc<Datasets> = load()?;
            info!(workbook = %cli.workbook.display(), "starting interactive session");
            let stdin = std::io::stdin();
            session::run(stdin.lock(), std::io::stdout(), model, || {
                loader::load_cached(&cli.workbook, &config.sheets)
            })?;
        }

        Commands::InitConfig => {
            print!("{}", DashboardConfig::default().to_toml()?);
        }
    }

    Ok(())
}
