// Actor and use-case inventory records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Use-Case-Point complexity class, shared by actors and use cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Complexity {
    Simple,
    Average,
    Complex,
}

impl Complexity {
    /// Parse a classification label. Accepts the English labels used in the
    /// tables plus the Indonesian equivalents, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "simple" | "sederhana" => Some(Complexity::Simple),
            "average" | "medium" | "sedang" | "rata-rata" => Some(Complexity::Average),
            "complex" | "kompleks" => Some(Complexity::Complex),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Complexity::Simple => "Simple",
            Complexity::Average => "Average",
            Complexity::Complex => "Complex",
        }
    }

    /// Standard actor weight: 1 / 2 / 3.
    pub fn actor_weight(self) -> f64 {
        match self {
            Complexity::Simple => 1.0,
            Complexity::Average => 2.0,
            Complexity::Complex => 3.0,
        }
    }

    /// Standard use-case weight: 5 / 10 / 15.
    pub fn use_case_weight(self) -> f64 {
        match self {
            Complexity::Simple => 5.0,
            Complexity::Average => 10.0,
            Complexity::Complex => 15.0,
        }
    }

    /// Standard use-case class by transaction count: up to 3 is simple,
    /// 4 to 7 average, 8 or more complex.
    pub fn from_transactions(transactions: u32) -> Self {
        match transactions {
            0..=3 => Complexity::Simple,
            4..=7 => Complexity::Average,
            _ => Complexity::Complex,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the actor (UAW) table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub name: String,
    pub classification: Complexity,
    pub weight: f64,
}

impl ActorRecord {
    /// Actor with the standard weight for its class.
    pub fn new(name: impl Into<String>, classification: Complexity) -> Self {
        Self {
            name: name.into(),
            classification,
            weight: classification.actor_weight(),
        }
    }
}

/// One row of the use-case (UUCW) table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseRecord {
    pub name: String,
    pub classification: Complexity,
    pub transaction_count: u32,
    pub weight: f64,
}

impl UseCaseRecord {
    /// Use case with the standard weight for its class.
    pub fn new(name: impl Into<String>, classification: Complexity, transaction_count: u32) -> Self {
        Self {
            name: name.into(),
            classification,
            transaction_count,
            weight: classification.use_case_weight(),
        }
    }

    /// Use case classified by its transaction count.
    pub fn from_transactions(name: impl Into<String>, transaction_count: u32) -> Self {
        Self::new(
            name,
            Complexity::from_transactions(transaction_count),
            transaction_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_english_and_indonesian_labels() {
        assert_eq!(Complexity::parse("Complex"), Some(Complexity::Complex));
        assert_eq!(Complexity::parse("  average "), Some(Complexity::Average));
        assert_eq!(Complexity::parse("SEDERHANA"), Some(Complexity::Simple));
        assert_eq!(Complexity::parse("kompleks"), Some(Complexity::Complex));
        assert_eq!(Complexity::parse("huge"), None);
        assert_eq!(Complexity::parse(""), None);
    }

    #[test]
    fn standard_weights() {
        assert_eq!(ActorRecord::new("Admin", Complexity::Simple).weight, 1.0);
        assert_eq!(ActorRecord::new("API", Complexity::Average).weight, 2.0);
        assert_eq!(ActorRecord::new("Public", Complexity::Complex).weight, 3.0);
        assert_eq!(UseCaseRecord::new("Login", Complexity::Simple, 2).weight, 5.0);
        assert_eq!(UseCaseRecord::new("Report", Complexity::Average, 5).weight, 10.0);
        assert_eq!(UseCaseRecord::new("Billing", Complexity::Complex, 9).weight, 15.0);
    }

    #[test]
    fn transaction_count_boundaries() {
        assert_eq!(Complexity::from_transactions(0), Complexity::Simple);
        assert_eq!(Complexity::from_transactions(3), Complexity::Simple);
        assert_eq!(Complexity::from_transactions(4), Complexity::Average);
        assert_eq!(Complexity::from_transactions(7), Complexity::Average);
        assert_eq!(Complexity::from_transactions(8), Complexity::Complex);

        let uc = UseCaseRecord::from_transactions("Approve permit", 6);
        assert_eq!(uc.classification, Complexity::Average);
        assert_eq!(uc.weight, 10.0);
        assert_eq!(uc.transaction_count, 6);
    }
}
