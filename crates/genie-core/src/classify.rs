// Deterministic document routing ahead of any generator call.

use serde::Serialize;

use crate::workspace::DocType;

const PHRASES: [&str; 2] = ["term of reference", "kajian kebutuhan"];
const TOKENS: [&str; 1] = ["kak"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    Internal,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    #[serde(rename = "type")]
    pub doc_type: DocType,
    /// 0..=100.
    pub confidence: u8,
    pub origin: Origin,
    pub processing_priority: Priority,
    pub routing_rule: String,
}

/// Route raw input by keyword. Every input is treated as a terms-of-reference
/// brief; a keyword hit raises confidence and priority.
pub fn classify(content: &str) -> Classification {
    let lower = content.to_lowercase();
    let phrase_hit = PHRASES.iter().any(|p| lower.contains(p));
    let token_hit = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| TOKENS.contains(&word));

    if phrase_hit || token_hit {
        Classification {
            doc_type: DocType::Tor,
            confidence: 100,
            origin: Origin::Internal,
            processing_priority: Priority::High,
            routing_rule: "Deterministic: keyword KAK/TOR".to_string(),
        }
    } else {
        Classification {
            doc_type: DocType::Tor,
            confidence: 50,
            origin: Origin::Client,
            processing_priority: Priority::Normal,
            routing_rule: "Fallback".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_phrases_route_with_full_confidence() {
        for input in [
            "This Term of Reference covers the permit portal",
            "Dokumen KAJIAN KEBUTUHAN sistem informasi",
            "Lampiran: KAK pengadaan aplikasi",
            "kak.",
        ] {
            let c = classify(input);
            assert_eq!(c.confidence, 100, "{input}");
            assert_eq!(c.origin, Origin::Internal);
            assert_eq!(c.processing_priority, Priority::High);
            assert_eq!(c.doc_type, DocType::Tor);
        }
    }

    #[test]
    fn kak_must_be_a_whole_word() {
        let c = classify("Kakak saya membuat aplikasi kasir");
        assert_eq!(c.confidence, 50);
    }

    #[test]
    fn fallback_is_low_confidence_tor() {
        let c = classify("Build an inventory app for a bakery");
        assert_eq!(c.doc_type, DocType::Tor);
        assert_eq!(c.confidence, 50);
        assert_eq!(c.origin, Origin::Client);
        assert_eq!(c.processing_priority, Priority::Normal);
        assert_eq!(c.routing_rule, "Fallback");
    }
}
