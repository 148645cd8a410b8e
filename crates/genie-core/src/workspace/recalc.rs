// Recompute a document's cost tables from its inventory tables.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::EstimationConfig;
use crate::estimation::engine::BREAKDOWN_HEADERS;
use crate::estimation::{estimate, ActorRecord, Estimate, UseCaseRecord};
use crate::workspace::inventory::{collect_inventory, Inventory};
use crate::workspace::{
    now_rfc3339, DocStatus, DocTable, DocType, TableKind, WorkspaceBlock, WorkspaceDocument,
    WorkspaceSection,
};

pub const RESEARCH_DOC_ID: &str = "doc-research";

/// Outcome of one recomputation pass over a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recalculation {
    pub inventory: Inventory,
    pub estimate: Estimate,
    /// Number of RAB tables whose rows were replaced.
    pub rab_tables: usize,
}

/// Replace the rows of every RAB table with the rendered breakdown.
///
/// Existing headers are kept when they are six columns wide.
pub fn apply_estimate(doc: &mut WorkspaceDocument, estimate: &Estimate) -> usize {
    let rows = estimate.table_rows();
    let mut updated = 0;
    for table in doc.tables_mut().filter(|t| t.kind == TableKind::Rab) {
        if table.headers.len() != BREAKDOWN_HEADERS.len() {
            table.headers = BREAKDOWN_HEADERS.iter().map(|h| h.to_string()).collect();
        }
        table.rows = rows.clone();
        updated += 1;
    }
    updated
}

/// Collect the inventory, run the estimator and write the RAB tables back.
///
/// Running it twice on the same document yields the same document.
pub fn recalculate(doc: &mut WorkspaceDocument, config: &EstimationConfig) -> Recalculation {
    let inventory = collect_inventory(doc);
    let estimate = estimate(&inventory.actors, &inventory.use_cases, config);
    let rab_tables = apply_estimate(doc, &estimate);

    if rab_tables == 0 {
        debug!(doc = %doc.id, "document has no RAB table; estimate not written back");
    }
    info!(
        doc = %doc.id,
        actors = inventory.actors.len(),
        use_cases = inventory.use_cases.len(),
        warnings = inventory.warnings.len(),
        man_months = estimate.metrics.man_months,
        grand_total = %estimate.summary.grand_total,
        "document recalculated"
    );

    Recalculation {
        inventory,
        estimate,
        rab_tables,
    }
}

/// `3.0` -> `3`, `2.5` -> `2.5`.
fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{weight:.0}")
    } else {
        weight.to_string()
    }
}

fn section(id: &str, title: &str, order: u32, blocks: Vec<WorkspaceBlock>) -> WorkspaceSection {
    WorkspaceSection {
        id: id.to_string(),
        title: title.to_string(),
        order,
        blocks,
        last_modified: now_rfc3339(),
    }
}

/// Default estimation workspace: executive summary, actor table, use-case
/// table and an empty RAB table awaiting `recalculate`.
pub fn research_document(
    summary: &str,
    actors: &[ActorRecord],
    use_cases: &[UseCaseRecord],
) -> WorkspaceDocument {
    let summary = if summary.trim().is_empty() {
        "Deskripsi proyek..."
    } else {
        summary
    };

    let actor_rows = actors
        .iter()
        .enumerate()
        .map(|(i, a)| {
            vec![
                (i + 1).to_string(),
                a.name.clone(),
                a.classification.label().to_string(),
                format_weight(a.weight),
            ]
        })
        .collect();

    let use_case_rows = use_cases
        .iter()
        .enumerate()
        .map(|(i, u)| {
            vec![
                (i + 1).to_string(),
                u.name.clone(),
                u.classification.label().to_string(),
                u.transaction_count.to_string(),
                format_weight(u.weight),
            ]
        })
        .collect();

    let uaw = DocTable {
        id: "uaw_table".into(),
        title: "Unadjusted Actor Weight (UAW)".into(),
        headers: ["No", "Aktor", "Klasifikasi", "Weight"].map(String::from).to_vec(),
        rows: actor_rows,
        kind: TableKind::UcpActor,
    };
    let uucw = DocTable {
        id: "uucw_table".into(),
        title: "Unadjusted Use Case Weight (UUCW)".into(),
        headers: ["No", "Use Case", "Tipe", "Trans.", "Weight"]
            .map(String::from)
            .to_vec(),
        rows: use_case_rows,
        kind: TableKind::UcpUsecase,
    };
    let rab = DocTable {
        id: "rab_table".into(),
        title: "Cost Estimation (Man-Month Distribution)".into(),
        headers: BREAKDOWN_HEADERS.map(String::from).to_vec(),
        rows: Vec::new(),
        kind: TableKind::Rab,
    };

    WorkspaceDocument {
        id: RESEARCH_DOC_ID.into(),
        kind: DocType::Research,
        title: "Kajian Kebutuhan & Estimasi Biaya".into(),
        status: DocStatus::Draft,
        version: "1.0".into(),
        sections: vec![
            section(
                "sec-exec",
                "1. Executive Summary",
                0,
                vec![WorkspaceBlock::text("b1", summary)],
            ),
            section(
                "sec-uaw",
                "2. Perhitungan UAW (Actors)",
                1,
                vec![WorkspaceBlock::table("b_uaw", uaw)],
            ),
            section(
                "sec-uucw",
                "3. Perhitungan UUCW (Use Cases)",
                2,
                vec![WorkspaceBlock::table("b_uucw", uucw)],
            ),
            section(
                "sec-rab",
                "4. Estimasi Biaya (RAB)",
                3,
                vec![WorkspaceBlock::table("b_rab", rab)],
            ),
        ],
    }
}
