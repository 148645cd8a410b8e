// Export of a document's estimate to CSV sheets plus a JSON snapshot.
//
// Figures come from the estimate the session already holds, the same value
// behind the on-screen tables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use genie_core::estimation::engine::BREAKDOWN_HEADERS;
use genie_core::estimation::Estimate;
use genie_core::workspace::Inventory;

use crate::session::Session;

pub const USE_CASE_POINTS_FILE: &str = "use_case_points.csv";
pub const MAN_MONTH_FILE: &str = "man_month.csv";
pub const COST_ESTIMATION_FILE: &str = "cost_estimation.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub use_case_points: PathBuf,
    pub man_month: PathBuf,
    pub cost_estimation: PathBuf,
    pub snapshot: PathBuf,
}

/// Write every export file for `doc_id` under `dir`, creating it if needed.
pub fn export_document(session: &Session, doc_id: &str, dir: &Path) -> Result<ExportPaths> {
    let doc = session
        .document(doc_id)
        .with_context(|| format!("document {doc_id} not found"))?;
    let result = session
        .recalculation(doc_id)
        .with_context(|| format!("document {doc_id} carries no estimate"))?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let paths = ExportPaths {
        use_case_points: dir.join(USE_CASE_POINTS_FILE),
        man_month: dir.join(MAN_MONTH_FILE),
        cost_estimation: dir.join(COST_ESTIMATION_FILE),
        snapshot: dir.join(format!("{doc_id}.json")),
    };

    write_use_case_points(&paths.use_case_points, &result.inventory, &result.estimate)?;
    write_man_month(&paths.man_month, &result.estimate)?;
    write_cost_estimation(&paths.cost_estimation, &result.estimate)?;

    let json = serde_json::to_string_pretty(doc).context("failed to serialize document")?;
    std::fs::write(&paths.snapshot, json)
        .with_context(|| format!("failed to write {}", paths.snapshot.display()))?;

    info!(doc = doc_id, dir = %dir.display(), "estimate exported");
    Ok(paths)
}

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))
}

/// Actor and use-case inventories followed by the UCP derivation.
fn write_use_case_points(path: &Path, inventory: &Inventory, estimate: &Estimate) -> Result<()> {
    let mut w = writer(path)?;
    let m = &estimate.metrics;

    w.write_record(["Actor", "Classification", "Weight"])?;
    for actor in &inventory.actors {
        w.write_record([
            actor.name.clone(),
            actor.classification.label().to_string(),
            actor.weight.to_string(),
        ])?;
    }
    w.write_record(["UAW", "", &m.uaw.to_string()])?;
    w.write_record([""; 0])?;

    w.write_record(["Use Case", "Classification", "Transactions", "Weight"])?;
    for uc in &inventory.use_cases {
        w.write_record([
            uc.name.clone(),
            uc.classification.label().to_string(),
            uc.transaction_count.to_string(),
            uc.weight.to_string(),
        ])?;
    }
    w.write_record(["UUCW", "", "", &m.uucw.to_string()])?;
    w.write_record([""; 0])?;

    w.write_record(["Metric", "Value"])?;
    for (label, value) in [
        ("UUCP", m.uucp),
        ("TCF", estimate.calibration.tcf),
        ("ECF", estimate.calibration.ecf),
        ("UCP", m.ucp),
    ] {
        w.write_record([label, &format!("{value:.4}")])?;
    }

    w.flush().with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Effort conversion from use-case points to man-months.
fn write_man_month(path: &Path, estimate: &Estimate) -> Result<()> {
    let mut w = writer(path)?;
    let m = &estimate.metrics;
    w.write_record(["Metric", "Value"])?;
    for (label, value) in [
        ("UCP", m.ucp),
        ("PHM (person-hours)", m.phm),
        ("Work days", m.work_days),
        ("Man-months", m.man_months),
    ] {
        w.write_record([label, &format!("{value:.4}")])?;
    }
    w.flush().with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Activity breakdown in display order, including the summary rows.
fn write_cost_estimation(path: &Path, estimate: &Estimate) -> Result<()> {
    let mut w = writer(path)?;
    w.write_record(BREAKDOWN_HEADERS)?;
    for row in estimate.table_rows() {
        w.write_record(&row)?;
    }
    w.flush().with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use genie_core::config::EstimationConfig;
    use genie_core::estimation::{ActorRecord, Complexity, UseCaseRecord};
    use genie_core::workspace::research_document;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("genie-export-{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn session() -> Session {
        let mut s = Session::new(EstimationConfig::default());
        s.insert_document(research_document(
            "Portal",
            &[ActorRecord::new("Admin", Complexity::Simple)],
            &[UseCaseRecord::new("Login", Complexity::Simple, 2)],
        ))
        .unwrap();
        s
    }

    #[test]
    fn writes_all_files() {
        let dir = temp_dir("all");
        let s = session();
        let paths = export_document(&s, "doc-research", &dir).unwrap();

        for p in [&paths.use_case_points, &paths.man_month, &paths.cost_estimation, &paths.snapshot] {
            assert!(p.exists(), "{} missing", p.display());
        }
        assert_eq!(paths.snapshot.file_name().unwrap(), "doc-research.json");
    }

    #[test]
    fn cost_sheet_matches_session_estimate() {
        let dir = temp_dir("cost");
        let s = session();
        let paths = export_document(&s, "doc-research", &dir).unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&paths.cost_estimation)
            .unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, BREAKDOWN_HEADERS.map(String::from).to_vec());

        let rows: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        assert_eq!(rows, s.estimate("doc-research").unwrap().table_rows());
        assert_eq!(rows.last().unwrap()[0], "TOTAL BIAYA (RAB)");
    }

    #[test]
    fn use_case_points_sheet_lists_inventory() {
        let dir = temp_dir("ucp");
        let paths = export_document(&session(), "doc-research", &dir).unwrap();
        let text = std::fs::read_to_string(&paths.use_case_points).unwrap();
        assert!(text.contains("Admin,Simple,1"));
        assert!(text.contains("Login,Simple,2,5"));
        assert!(text.contains("TCF,0.8700"));
        assert!(text.contains("UUCP,6.0000"));
    }

    #[test]
    fn snapshot_round_trips() {
        let dir = temp_dir("snapshot");
        let s = session();
        let paths = export_document(&s, "doc-research", &dir).unwrap();
        let text = std::fs::read_to_string(&paths.snapshot).unwrap();
        let doc: genie_core::workspace::WorkspaceDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(&doc, s.document("doc-research").unwrap());
    }

    #[test]
    fn unknown_or_non_estimating_document_fails() {
        let dir = temp_dir("missing");
        assert!(export_document(&session(), "nope", &dir).is_err());
    }
}
