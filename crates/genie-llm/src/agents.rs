// Document agents: each one is a prompt, a generator call and a tolerant
// parse of the JSON that comes back.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use genie_core::config::LlmConfig;
use genie_core::estimation::{ActorRecord, Complexity, UseCaseRecord};
use genie_core::workspace::{DocType, WorkspaceDocument};

use crate::client::{ContentGenerator, GenerationRequest};
use crate::error::LlmError;
use crate::prompt;

const BRIEF_TEMPERATURE: f32 = 0.2;
const ARCHITECTURE_TEMPERATURE: f32 = 0.1;
const REFINE_TEMPERATURE: f32 = 0.3;

// ---------------------------------------------------------------------------
// Agent outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectBrief {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub legal_basis: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedActor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub classification: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureUseCase {
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub classification: String,
    #[serde(default)]
    pub actor: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub transactions: u32,
}

/// Functional architecture: who uses the system and what they do with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub detailed_actors: Vec<DetailedActor>,
    #[serde(default)]
    pub use_cases: Vec<ArchitectureUseCase>,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub integrations: Vec<String>,
    #[serde(default = "standard_security")]
    pub security_level: String,
    #[serde(default = "confidential")]
    pub data_classification: String,
}

fn standard_security() -> String {
    "Standard".to_string()
}

fn confidential() -> String {
    "Confidential".to_string()
}

impl Architecture {
    /// Actor inventory. Detailed actors carry their own class; bare actor
    /// names are human users and count as Complex.
    pub fn actor_records(&self) -> Vec<ActorRecord> {
        if !self.detailed_actors.is_empty() {
            return self
                .detailed_actors
                .iter()
                .map(|a| {
                    let class = Complexity::parse(&a.classification).unwrap_or_else(|| {
                        warn!(actor = %a.name, label = %a.classification, "unknown actor class, using Simple");
                        Complexity::Simple
                    });
                    ActorRecord::new(a.name.clone(), class)
                })
                .collect();
        }
        self.actors
            .iter()
            .map(|name| ActorRecord::new(name.clone(), Complexity::Complex))
            .collect()
    }

    /// Use-case inventory. An unreadable class label falls back to the
    /// class implied by the transaction count.
    pub fn use_case_records(&self) -> Vec<UseCaseRecord> {
        self.use_cases
            .iter()
            .map(|uc| match Complexity::parse(&uc.classification) {
                Some(class) => UseCaseRecord::new(uc.name.clone(), class, uc.transactions),
                None => UseCaseRecord::from_transactions(uc.name.clone(), uc.transactions),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    ReadyForSignature,
    NeedsRevision,
    CriticalGaps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub section: String,
    pub severity: Severity,
    pub issue: String,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveReview {
    /// 0..=100.
    pub readiness_score: f64,
    pub status: ReviewStatus,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

#[derive(Debug, Deserialize)]
struct RefinedUseCase {
    name: String,
    #[serde(rename = "type", default)]
    classification: String,
    #[serde(default, deserialize_with = "lenient_count")]
    transactions: u32,
}

/// Accept a count as a JSON number or numeric string; anything else is 0.
fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let n = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(n.filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round().min(u32::MAX as f64) as u32)
        .unwrap_or(0))
}

/// Strip a Markdown code fence the model may wrap around JSON.
pub fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_json<T: serde::de::DeserializeOwned>(agent: &str, text: &str) -> Result<T, LlmError> {
    serde_json::from_str(strip_json_fence(text))
        .map_err(|e| LlmError::Parse(format!("{agent}: {e}")))
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Prompted calls against any `ContentGenerator`.
pub struct Agents<'a, G: ?Sized> {
    generator: &'a G,
    workspace_temperature: f32,
    review_temperature: f32,
}

impl<'a, G: ContentGenerator + ?Sized> Agents<'a, G> {
    pub fn new(generator: &'a G, config: &LlmConfig) -> Self {
        Self {
            generator,
            workspace_temperature: config.workspace_temperature,
            review_temperature: config.review_temperature,
        }
    }

    /// Generate the document set for a brief, keyed by document id.
    ///
    /// Output that is not a JSON object of documents yields an empty map;
    /// the caller falls back to its own defaults.
    pub async fn generate_workspaces(
        &self,
        input: &str,
        doc_type: DocType,
    ) -> Result<BTreeMap<String, WorkspaceDocument>, LlmError> {
        let request = GenerationRequest::json(
            prompt::build_workspace_prompt(input, doc_type),
            self.workspace_temperature,
        )
        .with_system(prompt::workspace_system_prompt());
        let text = self.generator.generate(&request).await?;

        match serde_json::from_str::<BTreeMap<String, WorkspaceDocument>>(strip_json_fence(&text)) {
            Ok(docs) => {
                info!(documents = docs.len(), "workspaces generated");
                Ok(docs)
            }
            Err(e) => {
                warn!(error = %e, "failed to parse workspace JSON; continuing without generated documents");
                Ok(BTreeMap::new())
            }
        }
    }

    pub async fn extract_brief(&self, input: &str, doc_type: DocType) -> Result<ProjectBrief, LlmError> {
        let request =
            GenerationRequest::json(prompt::build_brief_prompt(input, doc_type), BRIEF_TEMPERATURE);
        let text = self.generator.generate(&request).await?;
        parse_json("brief", &text)
    }

    pub async fn extract_architecture(&self, project_name: &str) -> Result<Architecture, LlmError> {
        let request = GenerationRequest::json(
            prompt::build_architecture_prompt(project_name),
            ARCHITECTURE_TEMPERATURE,
        );
        let text = self.generator.generate(&request).await?;
        let arch: Architecture = parse_json("architecture", &text)?;
        info!(
            actors = arch.actors.len().max(arch.detailed_actors.len()),
            use_cases = arch.use_cases.len(),
            "architecture extracted"
        );
        Ok(arch)
    }

    pub async fn executive_review(&self, context: &str) -> Result<ExecutiveReview, LlmError> {
        let request =
            GenerationRequest::json(prompt::build_review_prompt(context), self.review_temperature);
        let text = self.generator.generate(&request).await?;
        let mut review: ExecutiveReview = parse_json("executive review", &text)?;
        review.readiness_score = if review.readiness_score.is_finite() {
            review.readiness_score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Ok(review)
    }

    /// Revise one use case. The weight always follows the returned class.
    pub async fn refine_use_case(
        &self,
        record: &UseCaseRecord,
        instruction: &str,
    ) -> Result<UseCaseRecord, LlmError> {
        let request = GenerationRequest::json(
            prompt::build_refine_prompt(record, instruction),
            REFINE_TEMPERATURE,
        );
        let text = self.generator.generate(&request).await?;
        let refined: RefinedUseCase = parse_json("refine", &text)?;

        let name = if refined.name.trim().is_empty() {
            record.name.clone()
        } else {
            refined.name
        };
        Ok(match Complexity::parse(&refined.classification) {
            Some(class) => UseCaseRecord::new(name, class, refined.transactions),
            None => UseCaseRecord::from_transactions(name, refined.transactions),
        })
    }
}
