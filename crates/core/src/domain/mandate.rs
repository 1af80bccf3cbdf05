//! Investor mandate and its lenient JSON boundary.
//!
//! Mandates are stored as loosely shaped documents (camelCase or snake_case keys,
//! numbers as strings, single values instead of arrays). Everything is folded
//! into [`Mandate`] here; a field that cannot be understood is dropped, which
//! downstream means "constraint absent".

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mandate {
    pub property_types: Vec<String>,
    pub preferred_areas: Vec<String>,
    pub min_investment: Option<Decimal>,
    pub max_investment: Option<Decimal>,
    pub preferred_bedrooms: Vec<u8>,
    pub min_size: Option<f64>,
    pub max_size: Option<f64>,
    pub yield_target: Option<String>,
}

impl Mandate {
    pub fn from_document(document: &Value) -> Option<Self> {
        let object = document.as_object()?;
        let field = |camel: &str, snake: &str| object.get(camel).or_else(|| object.get(snake));

        Some(Self {
            property_types: field("propertyTypes", "property_types")
                .map(string_list)
                .unwrap_or_default(),
            preferred_areas: field("preferredAreas", "preferred_areas")
                .map(string_list)
                .unwrap_or_default(),
            min_investment: field("minInvestment", "min_investment").and_then(money_value),
            max_investment: field("maxInvestment", "max_investment").and_then(money_value),
            preferred_bedrooms: field("preferredBedrooms", "preferred_bedrooms")
                .map(bedroom_list)
                .unwrap_or_default(),
            min_size: field("minSize", "min_size").and_then(number_value),
            max_size: field("maxSize", "max_size").and_then(number_value),
            yield_target: field("yieldTarget", "yield_target").and_then(|value| match value {
                Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            }),
        })
    }

    /// Leading number of the yield target, read up to the first `%` or `-`
    /// (`"6-8%"` is 6, `"7.5%"` is 7.5).
    pub fn yield_target_pct(&self) -> Option<f64> {
        let raw = self.yield_target.as_deref()?.trim();
        let head = raw.split(['%', '-']).next()?.trim();
        head.parse::<f64>().ok().filter(|value| value.is_finite() && *value >= 0.0)
    }

    pub fn has_budget(&self) -> bool {
        self.min_investment.is_some() || self.max_investment.is_some()
    }
}

fn string_list(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => {
            items.iter().filter_map(|item| item.as_str().map(ToString::to_string)).collect()
        }
        Value::String(text) => text.split(',').map(ToString::to_string).collect(),
        _ => Vec::new(),
    };

    raw.into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn bedroom_list(value: &Value) -> Vec<u8> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    let mut bedrooms: Vec<u8> = items.into_iter().filter_map(bedroom_value).collect();
    bedrooms.sort_unstable();
    bedrooms.dedup();
    bedrooms
}

fn bedroom_value(value: &Value) -> Option<u8> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(text) => {
            let normalized = text.trim().to_ascii_lowercase();
            if normalized == "studio" {
                return Some(0);
            }
            normalized.trim_end_matches('+').trim_end_matches("br").trim().parse::<u8>().ok()
        }
        _ => None,
    }
}

fn number_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }?;
    (number.is_finite() && number >= 0.0).then_some(number)
}

/// Budget amounts accept plain numbers, `"1,200,000"`, `"AED 1.2M"` and `"850k"`.
/// Amounts that overflow after scaling are treated as absent.
fn money_value(value: &Value) -> Option<Decimal> {
    let amount = match value {
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Some(Decimal::from(integer)),
            None => number.as_f64().and_then(Decimal::from_f64_retain),
        },
        Value::String(text) => parse_money_text(text),
        _ => None,
    }?;
    (amount >= Decimal::ZERO).then_some(amount)
}

fn parse_money_text(text: &str) -> Option<Decimal> {
    let cleaned = text.trim().to_ascii_lowercase().replace("aed", "").replace([',', ' '], "");
    let (digits, multiplier) = if let Some(stripped) = cleaned.strip_suffix('m') {
        (stripped, Decimal::from(1_000_000))
    } else if let Some(stripped) = cleaned.strip_suffix('k') {
        (stripped, Decimal::from(1_000))
    } else {
        (cleaned.as_str(), Decimal::ONE)
    };

    Decimal::from_str(digits).ok().and_then(|amount| amount.checked_mul(multiplier))
}
