use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

// Postgres SQLSTATE codes for a missing table, column or schema.
const SCHEMA_CODES: [&str; 3] = ["42P01", "42703", "3F000"];

impl From<sqlx::Error> for DashboardError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let is_schema = db_err
                    .code()
                    .map(|code| SCHEMA_CODES.contains(&code.as_ref()))
                    .unwrap_or(false);
                if is_schema {
                    Self::SchemaError(db_err.message().to_string())
                } else {
                    Self::DataSourceUnavailable(db_err.message().to_string())
                }
            }
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::TypeNotFound { .. } => Self::SchemaError(err.to_string()),
            _ => Self::DataSourceUnavailable(err.to_string()),
        }
    }
}
