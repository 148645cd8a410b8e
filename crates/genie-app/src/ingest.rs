// Brief ingestion: raw text in, estimated workspace documents out.
//
//   truncate -> classify -> brief -> architecture -> workspaces
//            -> ensure an estimating document -> recompute -> persist

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use genie_core::classify::{classify, Classification};
use genie_core::config::Config;
use genie_core::store::Store;
use genie_core::workspace::{research_document, WorkspaceDocument};
use genie_llm::agents::{Agents, Architecture, ProjectBrief};
use genie_llm::ContentGenerator;

use crate::session::{Session, SessionError};

/// What one ingestion run produced.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub classification: Classification,
    pub brief: ProjectBrief,
    pub architecture: Architecture,
    /// Ids of every document placed in the session, in id order.
    pub documents: Vec<String>,
    /// True when the generator supplied no estimating document and the
    /// default research workspace was used instead.
    pub fallback_research: bool,
    /// True when the input exceeded the configured limit.
    pub truncated: bool,
}

/// Cut `input` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(input: &str, max_chars: usize) -> (&str, bool) {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => (&input[..idx], true),
        None => (input, false),
    }
}

/// Name used for the architecture prompt when the brief has none.
fn project_name(brief: &ProjectBrief, input: &str) -> String {
    if !brief.project_name.trim().is_empty() {
        return brief.project_name.trim().to_string();
    }
    input
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Untitled project")
        .chars()
        .take(120)
        .collect()
}

/// Run the full pipeline against `generator`, placing the results in
/// `session` and, when given, persisting a version of each document.
pub async fn ingest<G: ContentGenerator + ?Sized>(
    generator: &G,
    config: &Config,
    session: &mut Session,
    store: Option<&Store>,
    input: &str,
) -> Result<IngestReport> {
    // Every run places an estimating document, which a lock forbids.
    if let Some(lock) = session.lock_state() {
        return Err(SessionError::Locked {
            by: lock.locked_by.clone(),
        }
        .into());
    }

    let (text, truncated) = truncate_chars(input, config.ingest.max_input_chars);
    if truncated {
        warn!(
            limit = config.ingest.max_input_chars,
            "input truncated before generation"
        );
    }

    let classification = classify(text);
    info!(
        doc_type = %classification.doc_type,
        confidence = classification.confidence,
        rule = %classification.routing_rule,
        "input classified"
    );

    let agents = Agents::new(generator, &config.llm);

    let brief = agents
        .extract_brief(text, classification.doc_type)
        .await
        .context("brief extraction failed")?;
    let name = project_name(&brief, text);

    let architecture = agents
        .extract_architecture(&name)
        .await
        .context("architecture extraction failed")?;

    let generated = agents
        .generate_workspaces(text, classification.doc_type)
        .await
        .context("workspace generation failed")?;

    let mut documents: Vec<WorkspaceDocument> = generated
        .into_iter()
        .map(|(key, mut doc)| {
            if doc.id.trim().is_empty() {
                doc.id = key;
            }
            doc
        })
        .collect();

    let fallback_research = !documents.iter().any(WorkspaceDocument::is_estimating);
    if fallback_research {
        info!("no estimating document generated; using default research workspace");
        documents.push(research_document(
            &brief.executive_summary,
            &architecture.actor_records(),
            &architecture.use_case_records(),
        ));
    }

    let mut ids = Vec::with_capacity(documents.len());
    for doc in documents {
        ids.push(doc.id.clone());
        session.insert_document(doc)?;
    }
    ids.sort();
    ids.dedup();

    if let Some(store) = store {
        for id in &ids {
            if let Some(doc) = session.document(id) {
                store
                    .save_document(doc, "ingest")
                    .with_context(|| format!("failed to persist document {id}"))?;
            }
        }
    }

    info!(documents = ids.len(), fallback_research, "ingestion complete");

    Ok(IngestReport {
        classification,
        brief,
        architecture,
        documents: ids,
        fallback_research,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("abc", 5), ("abc", false));
        assert_eq!(truncate_chars("abcdef", 3), ("abc", true));
        // Multi-byte characters count once.
        assert_eq!(truncate_chars("ééé", 2), ("éé", true));
        assert_eq!(truncate_chars("abc", 3), ("abc", false));
    }

    #[test]
    fn project_name_falls_back_to_first_line() {
        let brief = ProjectBrief::default();
        assert_eq!(
            project_name(&brief, "\n  KAK Sistem Perizinan  \nisi"),
            "KAK Sistem Perizinan"
        );
        assert_eq!(project_name(&brief, "   "), "Untitled project");

        let named = ProjectBrief {
            project_name: "Portal Izin".into(),
            ..ProjectBrief::default()
        };
        assert_eq!(project_name(&named, "other"), "Portal Izin");
    }
}
