// Technical and environmental complexity factors from UCP worksheet ratings.
//
// TCF = 0.6 + 0.01 * sum(weight * rating) over 13 technical factors
// ECF = 1.4 - 0.03 * sum(weight * rating) over 8 environmental factors
//
// Ratings run from 0 (irrelevant) to 5 (essential).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Calibration;

pub const MAX_RATING: f64 = 5.0;

/// One row of a factor worksheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Factor {
    pub code: &'static str,
    pub name: &'static str,
    pub weight: f64,
}

pub const TECHNICAL_FACTORS: [Factor; 13] = [
    Factor { code: "T1", name: "Distributed System", weight: 2.0 },
    Factor { code: "T2", name: "Performance", weight: 1.0 },
    Factor { code: "T3", name: "End-user Efficiency", weight: 1.0 },
    Factor { code: "T4", name: "Complex Internal Processing", weight: 1.0 },
    Factor { code: "T5", name: "Reusability", weight: 1.0 },
    Factor { code: "T6", name: "Installability", weight: 0.5 },
    Factor { code: "T7", name: "Usability", weight: 0.5 },
    Factor { code: "T8", name: "Portability", weight: 2.0 },
    Factor { code: "T9", name: "Changeability", weight: 1.0 },
    Factor { code: "T10", name: "Concurrency", weight: 1.0 },
    Factor { code: "T11", name: "Special Security Features", weight: 1.0 },
    Factor { code: "T12", name: "Third Party Access", weight: 1.0 },
    Factor { code: "T13", name: "User Training Facilities", weight: 1.0 },
];

pub const ENVIRONMENTAL_FACTORS: [Factor; 8] = [
    Factor { code: "E1", name: "Familiarity with System Development Process", weight: 1.5 },
    Factor { code: "E2", name: "Application Experience", weight: 0.5 },
    Factor { code: "E3", name: "Object Oriented Experience", weight: 1.0 },
    Factor { code: "E4", name: "Lead Analyst Capability", weight: 0.5 },
    Factor { code: "E5", name: "Motivation", weight: 1.0 },
    Factor { code: "E6", name: "Stable Requirements", weight: 2.0 },
    Factor { code: "E7", name: "Part-time Workers", weight: -1.0 },
    Factor { code: "E8", name: "Difficult Programming Language", weight: -1.0 },
];

#[derive(Debug, Error, PartialEq)]
pub enum FactorError {
    #[error("expected {expected} {kind} ratings, got {got}")]
    WrongCount {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("rating for {code} must be between 0 and 5, got {rating}")]
    RatingOutOfRange { code: &'static str, rating: f64 },
}

/// Worksheet ratings in factor order (T1..T13, E1..E8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorRatings {
    pub technical: Vec<f64>,
    pub environmental: Vec<f64>,
}

impl FactorRatings {
    /// Derive both complexity factors.
    pub fn calibration(&self) -> Result<Calibration, FactorError> {
        Ok(Calibration {
            tcf: technical_complexity_factor(&self.technical)?,
            ecf: environmental_complexity_factor(&self.environmental)?,
        })
    }
}

/// Weighted sum of ratings against a worksheet.
fn weighted_total(
    kind: &'static str,
    factors: &[Factor],
    ratings: &[f64],
) -> Result<f64, FactorError> {
    if ratings.len() != factors.len() {
        return Err(FactorError::WrongCount {
            kind,
            expected: factors.len(),
            got: ratings.len(),
        });
    }

    let mut total = 0.0;
    for (factor, &rating) in factors.iter().zip(ratings) {
        if !(0.0..=MAX_RATING).contains(&rating) {
            return Err(FactorError::RatingOutOfRange {
                code: factor.code,
                rating,
            });
        }
        total += factor.weight * rating;
    }
    Ok(total)
}

pub fn technical_complexity_factor(ratings: &[f64]) -> Result<f64, FactorError> {
    let t_factor = weighted_total("technical", &TECHNICAL_FACTORS, ratings)?;
    Ok(0.6 + 0.01 * t_factor)
}

pub fn environmental_complexity_factor(ratings: &[f64]) -> Result<f64, FactorError> {
    let e_factor = weighted_total("environmental", &ENVIRONMENTAL_FACTORS, ratings)?;
    Ok(1.4 - 0.03 * e_factor)
}
