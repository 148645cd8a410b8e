// Integration tests for genie.
//
// These drive the public API of genie-app end to end: ingestion against a
// scripted generator, session edits and recomputation, the estimation lock,
// persistence through the SQLite store, and export.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use genie_app::assist;
use genie_app::persist;
use genie_app::{export_document, ingest, Session, SessionError};
use genie_core::config::{
    Config, CredentialsConfig, EstimationConfig, IngestConfig, LlmConfig,
};
use genie_core::estimation::{ActorRecord, Complexity, RowKind, UseCaseRecord};
use genie_core::store::Store;
use genie_core::workspace::{research_document, BlockContent, DocTable, TableKind};
use genie_llm::{ContentGenerator, GenerationRequest, LlmError};

// ===========================================================================
// Test helpers
// ===========================================================================

/// Answers each agent by recognising its prompt.
struct ScriptedGenerator {
    workspaces: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(workspaces: serde_json::Value) -> Self {
        Self::raw(workspaces.to_string())
    }

    fn raw(workspaces: impl Into<String>) -> Self {
        Self {
            workspaces: workspaces.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let prompt = request.prompt.clone();
        self.prompts.lock().unwrap().push(prompt.clone());

        let reply = if prompt.contains("Generate WorkspaceDocument JSON") {
            self.workspaces.clone()
        } else if prompt.contains("Extract the project brief") {
            json!({
                "project_name": "Sistem Perizinan Terpadu",
                "executive_summary": "Digitalisasi layanan perizinan.",
                "objectives": ["Mempercepat layanan"],
                "legal_basis": []
            })
            .to_string()
        } else if prompt.contains("actor and use-case inventory") {
            json!({
                "actors": ["Pemohon"],
                "detailed_actors": [
                    {"name": "Pemohon", "type": "Complex", "desc": "Warga"},
                    {"name": "Dukcapil", "type": "Simple", "desc": "API"}
                ],
                "use_cases": [
                    {"code": "UC-001", "name": "Ajukan izin", "classification": "Average",
                     "actor": "Pemohon", "transactions": 5},
                    {"code": "UC-002", "name": "Verifikasi NIK", "classification": "Simple",
                     "actor": "Dukcapil", "transactions": 2}
                ],
                "modules": ["Portal"],
                "integrations": ["Dukcapil"]
            })
            .to_string()
        } else if prompt.contains("Director of Information Technology") {
            json!({
                "readinessScore": 140,
                "status": "NEEDS_REVISION",
                "findings": [{"section": "RAB", "severity": "MAJOR", "issue": "Tidak ada rincian"}]
            })
            .to_string()
        } else if prompt.contains("Revise one use case") {
            json!({"name": "Ajukan izin online", "type": "Complex", "transactions": 9}).to_string()
        } else {
            return Err(LlmError::Parse(format!("unexpected prompt: {prompt}")));
        };
        Ok(reply)
    }
}

fn test_config() -> Config {
    Config {
        estimation: EstimationConfig::default(),
        llm: LlmConfig::default(),
        credentials: CredentialsConfig {
            gemini_api_key: None,
        },
        db_path: ":memory:".into(),
        export_dir: std::env::temp_dir().join("genie-integration-export"),
        ingest: IngestConfig::default(),
    }
}

fn memory_store() -> Store {
    Store::open(":memory:").expect("in-memory store should open")
}

/// A generated KAJIAN document with its own inventory tables.
fn kajian_workspace() -> serde_json::Value {
    json!({
        "doc-kajian": {
            "id": "doc-kajian",
            "type": "KAJIAN",
            "title": "Kajian Kebutuhan",
            "sections": [{
                "id": "sec-ucp",
                "title": "Use Case Points",
                "order": 0,
                "blocks": [
                    {"id": "actors", "type": "TABLE", "content": {
                        "id": "actors", "title": "Aktor",
                        "headers": ["No", "Aktor", "Klasifikasi", "Bobot"],
                        "rows": [["1", "Admin", "Complex", "3"]],
                        "type": "UCP_ACTOR"
                    }},
                    {"id": "usecases", "type": "TABLE", "content": {
                        "id": "usecases", "title": "Use Case",
                        "headers": ["No", "Use Case", "Tipe", "Transaksi", "Bobot"],
                        "rows": [["1", "Kelola izin", "Average", "5", "10"]],
                        "type": "UCP_USECASE"
                    }},
                    {"id": "rab", "type": "TABLE", "content": {
                        "id": "rab", "title": "RAB",
                        "headers": ["Aktivitas"], "rows": [],
                        "type": "RAB"
                    }}
                ]
            }]
        },
        "doc-brd": {
            "id": "doc-brd",
            "type": "BRD",
            "title": "Business Requirements",
            "sections": []
        }
    })
}

fn scenario_a_session() -> Session {
    let mut s = Session::new(EstimationConfig::default());
    s.insert_document(research_document(
        "Scenario A",
        &[ActorRecord::new("User", Complexity::Complex)],
        &[UseCaseRecord::new("Manage", Complexity::Average, 5)],
    ))
    .unwrap();
    s
}

fn rab_table(session: &Session, doc_id: &str) -> DocTable {
    session
        .document(doc_id)
        .and_then(|d| d.table_of_kind(TableKind::Rab))
        .cloned()
        .expect("document should carry a RAB table")
}

// ===========================================================================
// Engine scenarios through the session
// ===========================================================================

#[test]
fn scenario_a_metrics() {
    let s = scenario_a_session();
    let m = s.estimate("doc-research").unwrap().metrics;
    assert_eq!(m.uaw, 3.0);
    assert_eq!(m.uucw, 10.0);
    assert_eq!(m.uucp, 13.0);
    assert!((m.ucp - 8.7087).abs() < 1e-9);
    assert!((m.phm - 174.174).abs() < 1e-9);
    assert!((m.work_days - 21.77175).abs() < 1e-9);
    assert!((m.man_months - 0.9896).abs() < 1e-4);
}

#[test]
fn scenario_b_empty_project_costs_nothing() {
    let mut s = Session::new(EstimationConfig::default());
    s.insert_document(research_document("", &[], &[])).unwrap();
    let est = s.estimate("doc-research").unwrap();
    assert_eq!(est.metrics.ucp, 0.0);
    assert!(est.rows().iter().all(|r| r.cost.whole_rupiah() == 0));
    assert_eq!(est.summary.grand_total.whole_rupiah(), 0);
}

#[test]
fn scenario_c_ecf_scales_costs_not_shares() {
    let mut s = scenario_a_session();
    let before = s.estimate("doc-research").unwrap().clone();
    s.set_calibration(0.87, 0.90).unwrap();
    let after = s.estimate("doc-research").unwrap().clone();

    let ratio = 0.90 / 0.77;
    assert!((after.metrics.ucp / before.metrics.ucp - ratio).abs() < 1e-9);
    assert!((after.metrics.man_months / before.metrics.man_months - ratio).abs() < 1e-9);
    for (b, a) in before.lines.iter().zip(&after.lines) {
        assert_eq!(a.share, b.share);
        let expected = b.cost.as_major_f64() * ratio;
        assert!(
            (a.cost.as_major_f64() - expected).abs() <= 0.01 * ratio + 0.01,
            "{}: {} vs {}",
            a.activity,
            a.cost.as_major_f64(),
            expected
        );
    }
    // The document's RAB table follows the new estimate.
    assert_eq!(rab_table(&s, "doc-research").rows, after.table_rows());
}

#[test]
fn grand_total_is_subtotal_plus_tax() {
    let s = scenario_a_session();
    let est = s.estimate("doc-research").unwrap();
    let sum = est.summary;
    assert_eq!(sum.subtotal, sum.total_effort_cost + sum.warranty);
    assert_eq!(sum.grand_total, sum.subtotal + sum.tax);
    let kinds: Vec<RowKind> = est.rows().iter().map(|r| r.kind).collect();
    assert_eq!(kinds.iter().filter(|k| **k == RowKind::Activity).count(), 12);
    assert_eq!(est.rows().len(), 17);
}

// ===========================================================================
// Table edits
// ===========================================================================

#[test]
fn editing_the_use_case_table_recomputes() {
    let mut s = scenario_a_session();
    let doc = s.document("doc-research").unwrap();
    let mut table = doc.table_of_kind(TableKind::UcpUsecase).unwrap().clone();
    table.rows.push(vec![
        "2".into(),
        "Report".into(),
        "Complex".into(),
        "8".into(),
        "15".into(),
    ]);
    s.update_block(
        "doc-research",
        "sec-uucw",
        "b_uucw",
        BlockContent::Table(table),
    )
    .unwrap();

    assert_eq!(s.estimate("doc-research").unwrap().metrics.uucw, 25.0);
}

#[test]
fn malformed_cells_are_zeroed_and_reported() {
    let mut s = scenario_a_session();
    let doc = s.document("doc-research").unwrap();
    let mut table = doc.table_of_kind(TableKind::UcpActor).unwrap().clone();
    table.rows[0][3] = "tiga".into();
    s.update_block("doc-research", "sec-uaw", "b_uaw", BlockContent::Table(table))
        .unwrap();

    let result = s.recalculation("doc-research").unwrap();
    assert_eq!(result.estimate.metrics.uaw, 0.0);
    assert_eq!(result.inventory.warnings.len(), 1);
    assert_eq!(result.inventory.warnings[0].raw, "tiga");
}

// ===========================================================================
// Estimation lock
// ===========================================================================

#[test]
fn lock_freezes_estimation_inputs() {
    let mut s = scenario_a_session();
    let frozen = s.estimate("doc-research").unwrap().clone();
    s.lock("pm").unwrap();

    let table = s
        .document("doc-research")
        .unwrap()
        .table_of_kind(TableKind::UcpActor)
        .unwrap()
        .clone();
    let err = s
        .update_block("doc-research", "sec-uaw", "b_uaw", BlockContent::Table(table))
        .unwrap_err();
    assert!(matches!(err, SessionError::Locked { ref by } if by == "pm"));
    assert!(matches!(
        s.set_calibration(1.0, 1.0),
        Err(SessionError::Locked { .. })
    ));
    assert!(matches!(s.lock("someone else"), Err(SessionError::Locked { .. })));

    // Narrative text stays editable.
    s.update_block(
        "doc-research",
        "sec-exec",
        "b1",
        BlockContent::Text("Ringkasan baru".into()),
    )
    .unwrap();
    assert_eq!(s.estimate("doc-research").unwrap(), &frozen);

    s.unlock();
    s.set_calibration(1.0, 1.0).unwrap();
    assert_ne!(s.estimate("doc-research").unwrap(), &frozen);
}

// ===========================================================================
// Ingestion
// ===========================================================================

#[tokio::test]
async fn ingest_falls_back_to_research_document() {
    let generator = ScriptedGenerator::raw("not json at all");
    let config = test_config();
    let mut session = Session::new(config.estimation.clone());

    let report = ingest(
        &generator,
        &config,
        &mut session,
        None,
        "Kerangka Acuan Kerja (KAK) sistem perizinan",
    )
    .await
    .unwrap();

    assert!(report.fallback_research);
    assert_eq!(report.documents, vec!["doc-research".to_string()]);
    assert_eq!(report.classification.confidence, 100);
    assert_eq!(generator.calls(), 3);

    // Complex (3) + Simple (1); Average (10) + Simple (5).
    let m = session.estimate("doc-research").unwrap().metrics;
    assert_eq!(m.uaw, 4.0);
    assert_eq!(m.uucw, 15.0);

    let doc = session.document("doc-research").unwrap();
    let summary = doc.block("sec-exec", "b1").unwrap();
    assert_eq!(
        summary.content.as_text(),
        Some("Digitalisasi layanan perizinan.")
    );
}

#[tokio::test]
async fn ingest_uses_generated_estimating_document() {
    let generator = ScriptedGenerator::new(kajian_workspace());
    let config = test_config();
    let mut session = Session::new(config.estimation.clone());
    let store = memory_store();

    let report = ingest(
        &generator,
        &config,
        &mut session,
        Some(&store),
        "Proposal sistem perizinan",
    )
    .await
    .unwrap();

    assert!(!report.fallback_research);
    assert_eq!(report.documents, vec!["doc-brd".to_string(), "doc-kajian".to_string()]);
    assert_eq!(report.classification.confidence, 50);

    let est = session.estimate("doc-kajian").unwrap();
    assert_eq!(est.metrics.uucp, 13.0);
    assert!(session.estimate("doc-brd").is_none());

    // The model's empty RAB table was filled in.
    assert_eq!(rab_table(&session, "doc-kajian").rows, est.table_rows());

    // Both documents were persisted with the computed tables.
    let listed = store.list_documents().unwrap();
    assert_eq!(listed.len(), 2);
    let stored = store.load_document("doc-kajian").unwrap().unwrap();
    assert_eq!(&stored, session.document("doc-kajian").unwrap());
    assert_eq!(store.history("doc-kajian").unwrap()[0].note, "ingest");
}

#[tokio::test]
async fn ingest_truncates_long_input() {
    let generator = ScriptedGenerator::raw("{}");
    let mut config = test_config();
    config.ingest.max_input_chars = 10;
    let mut session = Session::new(config.estimation.clone());

    let report = ingest(&generator, &config, &mut session, None, &"a".repeat(100))
        .await
        .unwrap();
    assert!(report.truncated);
    let prompts = generator.prompts.lock().unwrap();
    assert!(prompts.iter().all(|p| !p.contains(&"a".repeat(11))));
}

#[tokio::test]
async fn ingest_with_disabled_client_fails_cleanly() {
    let client = genie_llm::LlmClient::Disabled;
    let config = test_config();
    let mut session = Session::new(config.estimation.clone());
    let err = ingest(&client, &config, &mut session, None, "brief")
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("not configured"));
    assert_eq!(session.documents().count(), 0);
}

#[tokio::test]
async fn ingest_is_refused_while_locked() {
    let generator = ScriptedGenerator::new(kajian_workspace());
    let config = test_config();
    let mut session = scenario_a_session();
    let frozen = session.estimate("doc-research").unwrap().clone();
    session.lock("pm").unwrap();

    let err = ingest(&generator, &config, &mut session, None, "Proposal baru")
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("locked by pm"));
    assert_eq!(generator.calls(), 0);
    assert_eq!(session.estimate("doc-research").unwrap(), &frozen);
    assert!(session.document("doc-kajian").is_none());
}

#[tokio::test]
async fn ingest_accepts_numeric_table_cells() {
    let mut workspace = kajian_workspace();
    let blocks = &mut workspace["doc-kajian"]["sections"][0]["blocks"];
    blocks[0]["content"]["rows"] = json!([[1, "Admin", "Complex", 3]]);
    blocks[1]["content"]["rows"] = json!([[1, "Kelola izin", "Average", 5, 10]]);
    let generator = ScriptedGenerator::new(workspace);
    let config = test_config();
    let mut session = Session::new(config.estimation.clone());

    let report = ingest(&generator, &config, &mut session, None, "Proposal sistem perizinan")
        .await
        .unwrap();

    assert!(!report.fallback_research);
    let est = session.estimate("doc-kajian").unwrap();
    assert_eq!(est.metrics.uaw, 3.0);
    assert_eq!(est.metrics.uucw, 10.0);
}

// ===========================================================================
// Review and refinement
// ===========================================================================

#[tokio::test]
async fn review_clamps_score() {
    let generator = ScriptedGenerator::raw("{}");
    let session = scenario_a_session();
    let review = assist::review_document(&generator, &test_config(), &session, "doc-research")
        .await
        .unwrap();
    assert_eq!(review.readiness_score, 100.0);
    assert_eq!(review.findings.len(), 1);

    let prompts = generator.prompts.lock().unwrap();
    assert!(prompts[0].contains("Computed estimate"));
}

#[tokio::test]
async fn refine_rewrites_row_and_recomputes() {
    let generator = ScriptedGenerator::raw("{}");
    let mut session = scenario_a_session();
    let refined = assist::refine_use_case(
        &generator,
        &test_config(),
        &mut session,
        "doc-research",
        0,
        "tambahkan pembayaran online",
    )
    .await
    .unwrap();

    assert_eq!(refined.name, "Ajukan izin online");
    assert_eq!(refined.weight, 15.0);
    assert_eq!(session.estimate("doc-research").unwrap().metrics.uucw, 15.0);

    session.lock("pm").unwrap();
    let locked = assist::refine_use_case(
        &generator,
        &test_config(),
        &mut session,
        "doc-research",
        0,
        "lagi",
    )
    .await;
    assert!(locked.is_err());
}

// ===========================================================================
// Persistence and export
// ===========================================================================

#[test]
fn restored_session_matches_original() {
    let store = memory_store();
    let mut original = scenario_a_session();
    persist::save_document(&store, &original, "doc-research", "initial").unwrap();
    original.lock("pm").unwrap();
    persist::save_lock(&store, &original).unwrap();

    let mut restored = Session::new(EstimationConfig::default());
    persist::restore_session(&store, &mut restored).unwrap();
    assert_eq!(
        restored.estimate("doc-research"),
        original.estimate("doc-research")
    );
    assert_eq!(restored.lock_state(), original.lock_state());
}

#[test]
fn restored_session_keeps_calibration() {
    let store = memory_store();
    let mut original = scenario_a_session();
    original.set_calibration(0.95, 0.60).unwrap();
    persist::save_calibration(&store, &original).unwrap();
    persist::save_document(&store, &original, "doc-research", "initial").unwrap();

    let mut restored = Session::new(EstimationConfig::default());
    persist::restore_session(&store, &mut restored).unwrap();
    let est = restored.estimate("doc-research").unwrap();
    assert_eq!(est.calibration.tcf, 0.95);
    assert_eq!(est.calibration.ecf, 0.60);
    assert_eq!(Some(est), original.estimate("doc-research"));
}

#[test]
fn export_matches_on_screen_figures() {
    let dir = std::env::temp_dir().join("genie-integration-export-figures");
    let _ = std::fs::remove_dir_all(&dir);
    let mut s = scenario_a_session();
    s.set_calibration(0.9, 0.9).unwrap();

    let paths = export_document(&s, "doc-research", &dir).unwrap();
    let mut reader = csv::Reader::from_path(&paths.cost_estimation).unwrap();
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    assert_eq!(rows, rab_table(&s, "doc-research").rows);

    let man_month = std::fs::read_to_string(&paths.man_month).unwrap();
    let m = s.estimate("doc-research").unwrap().metrics;
    assert!(man_month.contains(&format!("{:.4}", m.man_months)));
}
