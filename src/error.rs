use thiserror::Error;

#[derive(Error, Debug)]
pub enum PacError {
    #[error("Missing column '{column}' required for {field}")]
    MissingColumn { field: String, column: String },

    #[error("Invalid amount in row {row}, column '{column}': '{value}' is not numeric")]
    DataFormat {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Report writer error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PacError>;
