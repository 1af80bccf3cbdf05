use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::ListingId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingSource {
    Official,
    Portal,
    Internal,
}

impl ListingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Portal => "portal",
            Self::Internal => "internal",
        }
    }
}

impl FromStr for ListingSource {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "official" | "dld" => Ok(Self::Official),
            "portal" => Ok(Self::Portal),
            "internal" | "" => Ok(Self::Internal),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown listing source `{other}`")))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessStatus {
    Ready,
    NeedsVerification,
    Draft,
}

impl ReadinessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::NeedsVerification => "NEEDS_VERIFICATION",
            Self::Draft => "DRAFT",
        }
    }
}

impl FromStr for ReadinessStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "READY" | "READY_FOR_MEMO" => Ok(Self::Ready),
            "NEEDS_VERIFICATION" => Ok(Self::NeedsVerification),
            "DRAFT" => Ok(Self::Draft),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown readiness status `{other}`")))
            }
        }
    }
}

/// Read-only property candidate owned by the listings collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub area: String,
    pub property_type: String,
    pub price: Decimal,
    /// Built-up area in square feet.
    pub size: Option<f64>,
    pub bedrooms: Option<u8>,
    pub status: String,
    pub trust_score: Option<f64>,
    /// Expected return in percent.
    pub roi: Option<f64>,
    pub readiness_status: ReadinessStatus,
    pub source: ListingSource,
}

impl Listing {
    /// Listings that can no longer be acquired never become candidates.
    pub fn is_available(&self) -> bool {
        let status = self.status.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        !matches!(status.as_str(), "sold" | "withdrawn" | "off_market" | "rented")
    }
}
