// Assistant actions on documents already in the session: executive review,
// use-case refinement and the context handed to chat.

use anyhow::{Context, Result};
use tracing::info;

use genie_core::config::Config;
use genie_core::estimation::UseCaseRecord;
use genie_core::money::format_idr;
use genie_llm::agents::{Agents, ExecutiveReview};
use genie_llm::ContentGenerator;

use crate::session::Session;

/// Outline of one document followed by its computed totals, if any.
pub fn document_context(session: &Session, doc_id: &str) -> Option<String> {
    let doc = session.document(doc_id)?;
    let mut out = doc.outline();
    if let Some(est) = session.estimate(doc_id) {
        let m = &est.metrics;
        out.push_str(&format!(
            "\nComputed estimate: UCP {:.2}, {:.2} man-months, total {}\n",
            m.ucp,
            m.man_months,
            format_idr(est.summary.grand_total)
        ));
    }
    if let Some(lock) = session.lock_state() {
        out.push_str(&format!(
            "Estimate locked by {} at {}\n",
            lock.locked_by, lock.locked_at
        ));
    }
    Some(out)
}

/// Context for chat: every document in id order.
pub fn project_context(session: &Session) -> String {
    let ids: Vec<String> = session.documents().map(|d| d.id.clone()).collect();
    ids.iter()
        .filter_map(|id| document_context(session, id))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Readiness review of one document.
pub async fn review_document<G: ContentGenerator + ?Sized>(
    generator: &G,
    config: &Config,
    session: &Session,
    doc_id: &str,
) -> Result<ExecutiveReview> {
    let context = document_context(session, doc_id)
        .with_context(|| format!("document {doc_id} not found"))?;
    let review = Agents::new(generator, &config.llm)
        .executive_review(&context)
        .await
        .context("executive review failed")?;
    info!(
        doc = doc_id,
        score = review.readiness_score,
        findings = review.findings.len(),
        "document reviewed"
    );
    Ok(review)
}

/// Ask the generator to revise the use case on table row `row`, then write
/// the result back so the estimate follows.
pub async fn refine_use_case<G: ContentGenerator + ?Sized>(
    generator: &G,
    config: &Config,
    session: &mut Session,
    doc_id: &str,
    row: usize,
    instruction: &str,
) -> Result<UseCaseRecord> {
    let current = session
        .use_case(doc_id, row)
        .with_context(|| format!("document {doc_id} has no use case at row {row}"))?;
    let refined = Agents::new(generator, &config.llm)
        .refine_use_case(&current, instruction)
        .await
        .context("use-case refinement failed")?;
    session.replace_use_case(doc_id, row, &refined)?;
    info!(
        doc = doc_id,
        row,
        from = %current.name,
        to = %refined.name,
        weight = refined.weight,
        "use case refined"
    );
    Ok(refined)
}
