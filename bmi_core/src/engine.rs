//! BMI engine: computation and classification.
//!
//! `bmi = weight_kg / height_m^2`, rounded to one decimal place with
//! round-half-away-from-zero. Classification uses the rounded value:
//!
//! | BMI              | Category    |
//! |------------------|-------------|
//! | < 18.5           | Underweight |
//! | 18.5 ..< 24.9    | Normal      |
//! | 24.9 ..< 29.9    | Overweight  |
//! | >= 29.9          | Obese       |

use crate::{BmiReading, Category, Error, Result};

/// Lower bound of the Normal category
pub const NORMAL_THRESHOLD: f64 = 18.5;
/// Lower bound of the Overweight category
pub const OVERWEIGHT_THRESHOLD: f64 = 24.9;
/// Lower bound of the Obese category
pub const OBESE_THRESHOLD: f64 = 29.9;

const INVALID_NUMBERS: &str = "Please enter valid numbers.";

/// Compute BMI and category from weight (kg) and height (cm)
pub fn compute(weight_kg: f64, height_cm: f64) -> Result<BmiReading> {
    check_positive("weight", weight_kg)?;
    check_positive("height", height_cm)?;

    let height_m = height_cm / 100.0;
    let bmi = round_one_decimal(weight_kg / height_m.powi(2));
    if !bmi.is_finite() {
        return Err(Error::invalid_input(format!(
            "{} (BMI out of range for weight {} kg, height {} cm)",
            INVALID_NUMBERS, weight_kg, height_cm
        )));
    }

    let category = classify(bmi);
    tracing::debug!(
        "Computed BMI {} ({}) from {} kg / {} cm",
        bmi,
        category,
        weight_kg,
        height_cm
    );

    Ok(BmiReading { bmi, category })
}

/// Map a (rounded) BMI value onto its category
pub fn classify(bmi: f64) -> Category {
    if bmi < NORMAL_THRESHOLD {
        Category::Underweight
    } else if bmi < OVERWEIGHT_THRESHOLD {
        Category::Normal
    } else if bmi < OBESE_THRESHOLD {
        Category::Overweight
    } else {
        Category::Obese
    }
}

/// Round half away from zero to one decimal place
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Parse a number typed by the user.
///
/// Only checks that the text is a number; `compute` enforces the range.
pub fn parse_quantity(field: &str, raw: &str) -> Result<f64> {
    raw.trim().parse::<f64>().map_err(|_| {
        tracing::debug!("Rejected {} input {:?}", field, raw);
        Error::invalid_input(INVALID_NUMBERS)
    })
}

fn check_positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::invalid_input(format!(
            "{} ({} must be a positive number, got {})",
            INVALID_NUMBERS, field, value
        )));
    }
    Ok(())
}
