//! Core domain types for the BMI tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - User identifiers
//! - BMI categories and engine readings
//! - Measurement records as persisted in the store
//! - Trend points handed to charting front-ends

use crate::{Error, Result};
use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;

/// Timestamp format used in the store and in CSV exports
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Users
// ============================================================================

/// A user identifier: non-empty, surrounding whitespace removed
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Validate and normalize a raw username
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_input("Please enter a username."));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Categories
// ============================================================================

/// BMI category, ordered from lowest to highest BMI
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl Category {
    /// Label as stored on disk and shown to the user
    pub fn label(self) -> &'static str {
        match self {
            Category::Underweight => "Underweight",
            Category::Normal => "Normal",
            Category::Overweight => "Overweight",
            Category::Obese => "Obese",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of the BMI engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BmiReading {
    /// BMI rounded to one decimal place
    pub bmi: f64,
    pub category: Category,
}

// ============================================================================
// Records
// ============================================================================

/// One persisted measurement.
///
/// `bmi` and `category` are always derived from `weight_kg` and `height_cm`
/// through the engine, which is why the fields are only readable through
/// accessors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct MeasurementRecord {
    #[serde(rename = "date", serialize_with = "serialize_date")]
    timestamp: NaiveDateTime,
    #[serde(rename = "weight")]
    weight_kg: f64,
    #[serde(rename = "height")]
    height_cm: f64,
    bmi: f64,
    category: Category,
}

impl MeasurementRecord {
    /// Build a record, computing BMI and category from the inputs.
    ///
    /// Sub-second precision is dropped from `timestamp` since the store keeps
    /// whole seconds.
    pub fn new(timestamp: NaiveDateTime, weight_kg: f64, height_cm: f64) -> Result<Self> {
        let reading = crate::engine::compute(weight_kg, height_cm)?;
        Ok(Self {
            timestamp: timestamp.trunc_subsecs(0),
            weight_kg,
            height_cm,
            bmi: reading.bmi,
            category: reading.category,
        })
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    pub fn height_cm(&self) -> f64 {
        self.height_cm
    }

    pub fn bmi(&self) -> f64 {
        self.bmi
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Timestamp formatted the way the store writes it
    pub fn date_string(&self) -> String {
        self.timestamp.format(DATE_FORMAT).to_string()
    }

    pub fn trend_point(&self) -> TrendPoint {
        TrendPoint {
            timestamp: self.timestamp,
            bmi: self.bmi,
        }
    }
}

fn serialize_date<S>(timestamp: &NaiveDateTime, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&timestamp.format(DATE_FORMAT))
}

/// Record as found on disk, before the derived fields are checked
#[derive(Debug, Deserialize)]
struct RawRecord {
    date: String,
    weight: f64,
    height: f64,
    #[serde(default)]
    bmi: Option<f64>,
    #[serde(default)]
    category: Option<String>,
}

impl TryFrom<RawRecord> for MeasurementRecord {
    type Error = Error;

    fn try_from(raw: RawRecord) -> Result<Self> {
        let timestamp = NaiveDateTime::parse_from_str(&raw.date, DATE_FORMAT)
            .map_err(|e| Error::invalid_input(format!("Invalid date {:?}: {}", raw.date, e)))?;

        let record = MeasurementRecord::new(timestamp, raw.weight, raw.height)?;

        let stale_bmi = raw.bmi.is_some_and(|bmi| bmi != record.bmi);
        let stale_category = raw
            .category
            .as_deref()
            .is_some_and(|label| label != record.category.label());
        if stale_bmi || stale_category {
            tracing::warn!(
                "Stored BMI {:?} ({:?}) for {} disagrees with its inputs, using {} ({})",
                raw.bmi,
                raw.category,
                raw.date,
                record.bmi,
                record.category
            );
        }

        Ok(record)
    }
}

/// One point of a BMI trend chart
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: NaiveDateTime,
    pub bmi: f64,
}
