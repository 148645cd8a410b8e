// Workspace documents: sectioned, block-structured project documents.
//
// The JSON shape is shared with the generator output, so every type here
// serializes camelCase with `type` tags, and optional fields tolerate being
// absent.

pub mod inventory;
pub mod recalc;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use inventory::{collect_inventory, use_case_at, CellWarning, Inventory};
pub use recalc::{apply_estimate, recalculate, research_document, Recalculation};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocType {
    Tor,
    Kajian,
    Research,
    Brd,
    Charter,
    Fsd,
    Legal,
    Spreadsheet,
    GovtTemplate,
    AcademicPaper,
    #[serde(other)]
    Unknown,
}

impl DocType {
    pub const ALL: [DocType; 11] = [
        DocType::Tor,
        DocType::Kajian,
        DocType::Research,
        DocType::Brd,
        DocType::Charter,
        DocType::Fsd,
        DocType::Legal,
        DocType::Spreadsheet,
        DocType::GovtTemplate,
        DocType::AcademicPaper,
        DocType::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocType::Tor => "TOR",
            DocType::Kajian => "KAJIAN",
            DocType::Research => "RESEARCH",
            DocType::Brd => "BRD",
            DocType::Charter => "CHARTER",
            DocType::Fsd => "FSD",
            DocType::Legal => "LEGAL",
            DocType::Spreadsheet => "SPREADSHEET",
            DocType::GovtTemplate => "GOVT_TEMPLATE",
            DocType::AcademicPaper => "ACADEMIC_PAPER",
            DocType::Unknown => "UNKNOWN",
        }
    }

    /// Case-insensitive lookup by wire name.
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_uppercase();
        Self::ALL.into_iter().find(|t| t.as_str() == wanted)
    }

    /// Documents that carry actor/use-case inventories and a cost table.
    pub fn is_estimating(self) -> bool {
        matches!(self, DocType::Research | DocType::Kajian)
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocStatus {
    #[default]
    Draft,
    Review,
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    #[default]
    Text,
    Table,
    Metric,
    Approval,
    Diagram,
    RiskMatrix,
}

/// What a table holds. Drives which tables feed the estimator and which
/// receive its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableKind {
    #[default]
    Generic,
    UcpActor,
    UcpUsecase,
    Rab,
    Schedule,
}

// ---------------------------------------------------------------------------
// Document tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocTable {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(deserialize_with = "lenient_row")]
    pub headers: Vec<String>,
    #[serde(deserialize_with = "lenient_rows")]
    pub rows: Vec<Vec<String>>,
    #[serde(rename = "type", default)]
    pub kind: TableKind,
}

/// Generators sometimes emit numeric or boolean cells; keep them as text.
fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lenient_row<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let cells = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(cells.into_iter().map(cell_text).collect())
}

fn lenient_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let rows = Vec::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect())
}

impl DocTable {
    /// Cell text, or `None` when the row is shorter than `column`.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }
}

/// Block payload: a table, a text body, or any other JSON value (metrics,
/// diagrams) kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockContent {
    Table(DocTable),
    Text(String),
    Other(serde_json::Value),
}

impl Default for BlockContent {
    fn default() -> Self {
        BlockContent::Text(String::new())
    }
}

impl BlockContent {
    pub fn as_table(&self) -> Option<&DocTable> {
        match self {
            BlockContent::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut DocTable> {
        match self {
            BlockContent::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BlockContent::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceBlock {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: BlockType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub content: BlockContent,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ai_suggestions: Vec<String>,
}

impl WorkspaceBlock {
    pub fn text(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: BlockType::Text,
            title: None,
            content: BlockContent::Text(body.into()),
            is_locked: false,
            ai_suggestions: Vec::new(),
        }
    }

    pub fn table(id: impl Into<String>, table: DocTable) -> Self {
        Self {
            id: id.into(),
            kind: BlockType::Table,
            title: None,
            content: BlockContent::Table(table),
            is_locked: false,
            ai_suggestions: Vec::new(),
        }
    }

    /// Kind of the table this block holds, if any.
    pub fn table_kind(&self) -> Option<TableKind> {
        self.content.as_table().map(|t| t.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSection {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub blocks: Vec<WorkspaceBlock>,
    /// RFC 3339 timestamp of the last edit.
    #[serde(default)]
    pub last_modified: String,
}

impl WorkspaceSection {
    pub fn touch(&mut self) {
        self.last_modified = now_rfc3339();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDocument {
    pub id: String,
    #[serde(rename = "type", default = "unknown_doc_type")]
    pub kind: DocType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: DocStatus,
    #[serde(default)]
    pub sections: Vec<WorkspaceSection>,
    #[serde(default = "initial_version")]
    pub version: String,
}

fn unknown_doc_type() -> DocType {
    DocType::Unknown
}

fn initial_version() -> String {
    "1.0".to_string()
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl WorkspaceDocument {
    pub fn is_estimating(&self) -> bool {
        self.kind.is_estimating()
    }

    /// Every table in document order.
    pub fn tables(&self) -> impl Iterator<Item = &DocTable> {
        self.sections
            .iter()
            .flat_map(|s| s.blocks.iter())
            .filter_map(|b| b.content.as_table())
    }

    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut DocTable> {
        self.sections
            .iter_mut()
            .flat_map(|s| s.blocks.iter_mut())
            .filter_map(|b| b.content.as_table_mut())
    }

    pub fn section_mut(&mut self, section_id: &str) -> Option<&mut WorkspaceSection> {
        self.sections.iter_mut().find(|s| s.id == section_id)
    }

    pub fn block(&self, section_id: &str, block_id: &str) -> Option<&WorkspaceBlock> {
        self.sections
            .iter()
            .find(|s| s.id == section_id)?
            .blocks
            .iter()
            .find(|b| b.id == block_id)
    }

    /// First table of the given kind.
    pub fn table_of_kind(&self, kind: TableKind) -> Option<&DocTable> {
        self.tables().find(|t| t.kind == kind)
    }

    /// Plain-text rendering used as generator context.
    pub fn outline(&self) -> String {
        let mut out = format!("# {} ({})\n", self.title, self.kind);
        let mut sections: Vec<&WorkspaceSection> = self.sections.iter().collect();
        sections.sort_by_key(|s| s.order);
        for section in sections {
            out.push_str(&format!("\n## {}\n", section.title));
            for block in &section.blocks {
                match &block.content {
                    BlockContent::Text(body) => {
                        out.push_str(body);
                        out.push('\n');
                    }
                    BlockContent::Table(table) => {
                        out.push_str(&format!("[{}]\n", table.title));
                        out.push_str(&table.headers.join(" | "));
                        out.push('\n');
                        for row in &table.rows {
                            out.push_str(&row.join(" | "));
                            out.push('\n');
                        }
                    }
                    BlockContent::Other(value) => {
                        out.push_str(&value.to_string());
                        out.push('\n');
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn doc_type_wire_names() {
        assert_eq!(serde_json::to_value(DocType::GovtTemplate).unwrap(), json!("GOVT_TEMPLATE"));
        assert_eq!(serde_json::to_value(DocType::Tor).unwrap(), json!("TOR"));
        let parsed: DocType = serde_json::from_value(json!("ACADEMIC_PAPER")).unwrap();
        assert_eq!(parsed, DocType::AcademicPaper);
        let odd: DocType = serde_json::from_value(json!("MEMO")).unwrap();
        assert_eq!(odd, DocType::Unknown);
        assert_eq!(DocType::parse("kajian"), Some(DocType::Kajian));
        assert_eq!(DocType::parse("memo"), None);
    }

    #[test]
    fn estimating_types() {
        assert!(DocType::Research.is_estimating());
        assert!(DocType::Kajian.is_estimating());
        assert!(!DocType::Tor.is_estimating());
        assert!(!DocType::Brd.is_estimating());
    }

    #[test]
    fn parses_generator_document() {
        let raw = json!({
            "id": "doc-tor",
            "type": "TOR",
            "title": "Kerangka Acuan Kerja",
            "status": "DRAFT",
            "version": "1.0",
            "sections": [{
                "id": "sec-1",
                "title": "Latar Belakang",
                "order": 0,
                "lastModified": "2024-01-01T00:00:00Z",
                "blocks": [
                    { "id": "b1", "type": "TEXT", "content": "Pendahuluan", "isLocked": true },
                    { "id": "b2", "type": "TABLE", "content": {
                        "id": "t1", "title": "Aktor",
                        "headers": ["No", "Aktor", "Klasifikasi", "Weight"],
                        "rows": [["1", "Admin", "Simple", "1"]],
                        "type": "UCP_ACTOR"
                    }},
                    { "id": "b3", "type": "METRIC", "content": { "label": "Score", "value": 80 } }
                ]
            }]
        });

        let doc: WorkspaceDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.kind, DocType::Tor);
        let blocks = &doc.sections[0].blocks;
        assert!(blocks[0].is_locked);
        assert_eq!(blocks[0].content.as_text(), Some("Pendahuluan"));
        assert_eq!(blocks[1].table_kind(), Some(TableKind::UcpActor));
        assert!(matches!(blocks[2].content, BlockContent::Other(_)));
        assert_eq!(doc.tables().count(), 1);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let doc: WorkspaceDocument = serde_json::from_value(json!({ "id": "d" })).unwrap();
        assert_eq!(doc.kind, DocType::Unknown);
        assert_eq!(doc.status, DocStatus::Draft);
        assert_eq!(doc.version, "1.0");
        assert!(doc.sections.is_empty());

        let table: DocTable =
            serde_json::from_value(json!({ "headers": ["A"], "rows": [] })).unwrap();
        assert_eq!(table.kind, TableKind::Generic);
    }

    #[test]
    fn numeric_cells_still_parse_as_table() {
        let block: WorkspaceBlock = serde_json::from_value(json!({
            "id": "b2", "type": "TABLE", "content": {
                "headers": ["No", "Aktor", "Klasifikasi", "Weight"],
                "rows": [[1, "Admin", "Complex", 3], [2, "Operator", null, 2.5], [3, "Bot", true, "1"]],
                "type": "UCP_ACTOR"
            }
        }))
        .unwrap();

        let table = block.content.as_table().expect("numeric cells should not demote the table");
        assert_eq!(table.kind, TableKind::UcpActor);
        assert_eq!(table.rows[0], vec!["1", "Admin", "Complex", "3"]);
        assert_eq!(table.cell(1, 2), Some(""));
        assert_eq!(table.cell(1, 3), Some("2.5"));
        assert_eq!(table.cell(2, 2), Some("true"));
    }

    #[test]
    fn serializes_camel_case_and_skips_empty_optionals() {
        let block = WorkspaceBlock::text("b1", "hello");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value, json!({ "id": "b1", "type": "TEXT", "content": "hello" }));

        let mut locked = block.clone();
        locked.is_locked = true;
        locked.ai_suggestions = vec!["tighten".into()];
        let value = serde_json::to_value(&locked).unwrap();
        assert_eq!(value["isLocked"], json!(true));
        assert_eq!(value["aiSuggestions"], json!(["tighten"]));
    }

    #[test]
    fn outline_lists_sections_in_order() {
        let doc = WorkspaceDocument {
            id: "d".into(),
            kind: DocType::Brd,
            title: "Requirements".into(),
            status: DocStatus::Draft,
            version: "1.0".into(),
            sections: vec![
                WorkspaceSection {
                    id: "s2".into(),
                    title: "Second".into(),
                    order: 1,
                    blocks: vec![WorkspaceBlock::text("b", "two")],
                    last_modified: String::new(),
                },
                WorkspaceSection {
                    id: "s1".into(),
                    title: "First".into(),
                    order: 0,
                    blocks: vec![WorkspaceBlock::text("a", "one")],
                    last_modified: String::new(),
                },
            ],
        };
        let outline = doc.outline();
        let first = outline.find("First").unwrap();
        let second = outline.find("Second").unwrap();
        assert!(first < second);
        assert!(outline.starts_with("# Requirements (BRD)"));
    }
}
