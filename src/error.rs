//! Error types for loading and analysing the workbook.
//!
//! Load failures are fatal for a run; statistical and simulator failures
//! only affect the section that produced them.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::SheetRole;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("workbook '{0}' was not found")]
    SourceNotFound(PathBuf),

    #[error("unsupported workbook source '{0}': expected an .xlsx file or a directory of .csv sheets")]
    UnsupportedSource(PathBuf),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a readable xlsx archive: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("workbook part '{part}' is missing")]
    MissingPart { part: String },

    #[error("malformed XML in '{part}': {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("malformed CSV in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("sheet '{sheet}' for {role} data is not in the workbook (available: {})", .available.join(", "))]
    MissingSheet {
        role: SheetRole,
        sheet: String,
        available: Vec<String>,
    },

    #[error("sheet '{sheet}' has no header row")]
    EmptySheet { sheet: String },

    #[error("sheet '{sheet}' has no '{column}' column (found: {})", .found.join(", "))]
    MissingColumn {
        sheet: String,
        column: String,
        found: Vec<String>,
    },

    #[error("sheet '{sheet}' row {row}, column '{column}': {reason}")]
    InvalidCell {
        sheet: String,
        row: usize,
        column: String,
        reason: String,
    },
}

/// Why an elasticity estimate could not be produced
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InsufficientData {
    #[error("insufficient data: {0} observation(s), at least 2 required")]
    TooFewObservations(usize),

    #[error("insufficient data: {prices} prices but {demand} demand values")]
    LengthMismatch { prices: usize, demand: usize },

    #[error("insufficient data: all prices are identical")]
    ZeroPriceVariance,

    #[error("insufficient data: mean demand is zero")]
    ZeroMeanDemand,

    #[error("insufficient data: observations contain non-finite values")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulatorError {
    #[error("{input} {value} is outside the supported range [{min}, {max}]")]
    OutOfRange {
        input: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}
