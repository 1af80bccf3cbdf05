use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use thiserror::Error;
use tracing::warn;

use brickwise_core::errors::StoreError;

pub mod crm;
pub mod market;

pub use crm::SqlCrmRepository;
pub use market::SqlMarketRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(error) => StoreError::Query(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|error| RepositoryError::Decode(format!("{name}: {error}")))
}

pub(crate) fn parse_date(name: &str, value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|error| RepositoryError::Decode(format!("{name} `{value}`: {error}")))
}

pub(crate) fn parse_timestamp(name: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{name} `{value}`: {error}")))
}

pub(crate) fn parse_decimal(name: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value.trim())
        .map_err(|error| RepositoryError::Decode(format!("{name} `{value}`: {error}")))
}

/// Enum columns are stored by their `as_str` name.
pub(crate) fn parse_name<T>(name: &str, value: &str) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|error| RepositoryError::Decode(format!("{name}: {error}")))
}

/// Enum column written by a collaborator. Unknown names fall back so the row
/// stays usable.
pub(crate) fn parse_name_or<T>(name: &str, value: &str, fallback: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().unwrap_or_else(|error| {
        warn!(
            event_name = "db.column.unknown_value",
            column = name,
            ?fallback,
            %error,
            "unrecognised value, using fallback"
        );
        fallback
    })
}

/// Decodes collaborator-owned rows one at a time. A row that cannot be decoded
/// is logged and dropped instead of failing the batch.
pub(crate) fn decode_rows<T>(
    table: &'static str,
    rows: &[SqliteRow],
    decode: fn(&SqliteRow) -> Result<T, RepositoryError>,
) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match decode(row) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(event_name = "db.row.skipped", table, %error, "skipping undecodable row");
                None
            }
        })
        .collect()
}

pub(crate) fn count(name: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{name} `{value}` is not a valid count")))
}
