// Actor and use-case inventories read out of document tables.
//
// Column contract:
//   UCP_ACTOR    [No, Actor, Classification, Weight]
//   UCP_USECASE  [No, Use Case, Type, Transactions, Weight]
//
// Parsing is lenient. A numeric cell that is empty or malformed counts as
// zero and an unrecognized classification counts as Simple; both leave a
// `CellWarning` behind instead of failing the recomputation.

use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::estimation::{ActorRecord, Complexity, UseCaseRecord};
use crate::workspace::{DocTable, TableKind, WorkspaceDocument};

pub const ACTOR_NAME_COL: usize = 1;
pub const ACTOR_CLASS_COL: usize = 2;
pub const ACTOR_WEIGHT_COL: usize = 3;

pub const USE_CASE_NAME_COL: usize = 1;
pub const USE_CASE_CLASS_COL: usize = 2;
pub const USE_CASE_TX_COL: usize = 3;
pub const USE_CASE_WEIGHT_COL: usize = 4;

/// A cell that was coerced while reading an inventory table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellWarning {
    pub table_id: String,
    /// Zero-based row index.
    pub row: usize,
    /// Zero-based column index.
    pub column: usize,
    pub raw: String,
}

impl fmt::Display for CellWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table {} row {} column {}: unreadable value {:?}",
            self.table_id,
            self.row + 1,
            self.column + 1,
            self.raw
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inventory {
    pub actors: Vec<ActorRecord>,
    pub use_cases: Vec<UseCaseRecord>,
    pub warnings: Vec<CellWarning>,
}

/// Gather actors and use cases from every inventory table in `doc`.
pub fn collect_inventory(doc: &WorkspaceDocument) -> Inventory {
    let mut inventory = Inventory::default();
    for table in doc.tables() {
        match table.kind {
            TableKind::UcpActor => read_actor_table(table, &mut inventory),
            TableKind::UcpUsecase => read_use_case_table(table, &mut inventory),
            _ => {}
        }
    }
    inventory
}

// ---------------------------------------------------------------------------
// Table readers
// ---------------------------------------------------------------------------

struct CellReader<'a> {
    table: &'a DocTable,
    warnings: &'a mut Vec<CellWarning>,
}

impl CellReader<'_> {
    fn text(&self, row: usize, column: usize) -> &str {
        self.table.cell(row, column).unwrap_or("").trim()
    }

    fn flag(&mut self, row: usize, column: usize) {
        let warning = CellWarning {
            table_id: self.table.id.clone(),
            row,
            column,
            raw: self.text(row, column).to_string(),
        };
        warn!(
            table = %warning.table_id,
            row = warning.row,
            column = warning.column,
            raw = %warning.raw,
            "coerced unreadable cell"
        );
        self.warnings.push(warning);
    }

    fn number(&mut self, row: usize, column: usize) -> f64 {
        match parse_number(self.text(row, column)) {
            Some(v) => v,
            None => {
                self.flag(row, column);
                0.0
            }
        }
    }

    fn count(&mut self, row: usize, column: usize) -> u32 {
        match self.text(row, column).parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                self.flag(row, column);
                0
            }
        }
    }

    fn complexity(&mut self, row: usize, column: usize) -> Complexity {
        match Complexity::parse(self.text(row, column)) {
            Some(c) => c,
            None => {
                self.flag(row, column);
                Complexity::Simple
            }
        }
    }

    fn use_case(&mut self, row: usize) -> UseCaseRecord {
        UseCaseRecord {
            name: self.text(row, USE_CASE_NAME_COL).to_string(),
            classification: self.complexity(row, USE_CASE_CLASS_COL),
            transaction_count: self.count(row, USE_CASE_TX_COL),
            weight: self.number(row, USE_CASE_WEIGHT_COL),
        }
    }

    fn is_blank_row(&self, row: usize) -> bool {
        self.table.rows[row].iter().all(|c| c.trim().is_empty())
    }
}

fn read_actor_table(table: &DocTable, inventory: &mut Inventory) {
    let mut reader = CellReader {
        table,
        warnings: &mut inventory.warnings,
    };
    for row in 0..table.rows.len() {
        if reader.is_blank_row(row) {
            continue;
        }
        let name = reader.text(row, ACTOR_NAME_COL).to_string();
        let classification = reader.complexity(row, ACTOR_CLASS_COL);
        let weight = reader.number(row, ACTOR_WEIGHT_COL);
        inventory.actors.push(ActorRecord {
            name,
            classification,
            weight,
        });
    }
}

fn read_use_case_table(table: &DocTable, inventory: &mut Inventory) {
    let mut reader = CellReader {
        table,
        warnings: &mut inventory.warnings,
    };
    for row in 0..table.rows.len() {
        if reader.is_blank_row(row) {
            continue;
        }
        let record = reader.use_case(row);
        inventory.use_cases.push(record);
    }
}

/// The use case on table row `row`, read the same way as the inventory.
/// `None` for a missing or blank row.
pub fn use_case_at(table: &DocTable, row: usize) -> Option<UseCaseRecord> {
    if row >= table.rows.len() {
        return None;
    }
    let mut warnings = Vec::new();
    let mut reader = CellReader {
        table,
        warnings: &mut warnings,
    };
    if reader.is_blank_row(row) {
        return None;
    }
    Some(reader.use_case(row))
}

/// Finite decimal number; `,` is accepted as the decimal separator.
fn parse_number(raw: &str) -> Option<f64> {
    let normalized = raw.replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{DocStatus, DocType, WorkspaceBlock, WorkspaceSection};

    fn table(id: &str, kind: TableKind, rows: &[&[&str]]) -> DocTable {
        DocTable {
            id: id.to_string(),
            title: id.to_string(),
            headers: Vec::new(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
            kind,
        }
    }

    fn doc(tables: Vec<DocTable>) -> WorkspaceDocument {
        WorkspaceDocument {
            id: "doc".into(),
            kind: DocType::Research,
            title: "Research".into(),
            status: DocStatus::Draft,
            version: "1.0".into(),
            sections: vec![WorkspaceSection {
                id: "s".into(),
                title: "Tables".into(),
                order: 0,
                blocks: tables
                    .into_iter()
                    .enumerate()
                    .map(|(i, t)| WorkspaceBlock::table(format!("b{i}"), t))
                    .collect(),
                last_modified: String::new(),
            }],
        }
    }

    #[test]
    fn reads_well_formed_tables() {
        let d = doc(vec![
            table(
                "uaw",
                TableKind::UcpActor,
                &[&["1", "Admin", "Simple", "1"], &["2", "Gateway", "Average", "2"]],
            ),
            table(
                "uucw",
                TableKind::UcpUsecase,
                &[&["1", "Login", "Simple", "3", "5"], &["2", "Report", "Complex", "9", "15"]],
            ),
        ]);

        let inv = collect_inventory(&d);
        assert!(inv.warnings.is_empty());
        assert_eq!(inv.actors.len(), 2);
        assert_eq!(inv.actors[1].name, "Gateway");
        assert_eq!(inv.actors[1].classification, Complexity::Average);
        assert_eq!(inv.actors[1].weight, 2.0);
        assert_eq!(inv.use_cases[1].transaction_count, 9);
        assert_eq!(inv.use_cases[1].weight, 15.0);
    }

    #[test]
    fn weight_cell_is_authoritative() {
        // The classification says Complex but the table carries weight 2.
        let d = doc(vec![table("uaw", TableKind::UcpActor, &[&["1", "Public", "Complex", "2"]])]);
        let inv = collect_inventory(&d);
        assert_eq!(inv.actors[0].weight, 2.0);
        assert_eq!(inv.actors[0].classification, Complexity::Complex);
    }

    #[test]
    fn malformed_and_missing_cells_become_zero_with_warnings() {
        let d = doc(vec![
            table("uaw", TableKind::UcpActor, &[&["1", "Admin", "Simple", "abc"]]),
            table("uucw", TableKind::UcpUsecase, &[&["1", "Login", "Simple", "", "5"], &["2", "Short"]]),
        ]);

        let inv = collect_inventory(&d);
        assert_eq!(inv.actors[0].weight, 0.0);
        assert_eq!(inv.use_cases[0].transaction_count, 0);
        assert_eq!(inv.use_cases[0].weight, 5.0);
        assert_eq!(inv.use_cases[1].weight, 0.0);

        assert_eq!(
            inv.warnings[0],
            CellWarning {
                table_id: "uaw".into(),
                row: 0,
                column: ACTOR_WEIGHT_COL,
                raw: "abc".into(),
            }
        );
        // Row 1 of the use-case table is missing class, count and weight.
        let short_row: Vec<_> = inv.warnings.iter().filter(|w| w.row == 1).collect();
        assert_eq!(short_row.len(), 3);
        assert_eq!(inv.warnings.len(), 5);
    }

    #[test]
    fn unknown_classification_defaults_to_simple() {
        let d = doc(vec![table("uaw", TableKind::UcpActor, &[&["1", "Bot", "Gigantic", "3"]])]);
        let inv = collect_inventory(&d);
        assert_eq!(inv.actors[0].classification, Complexity::Simple);
        assert_eq!(inv.actors[0].weight, 3.0);
        assert_eq!(inv.warnings.len(), 1);
        assert_eq!(inv.warnings[0].column, ACTOR_CLASS_COL);
    }

    #[test]
    fn non_finite_and_comma_decimals() {
        assert_eq!(parse_number("2,5"), Some(2.5));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn blank_rows_and_other_tables_are_ignored() {
        let d = doc(vec![
            table("uaw", TableKind::UcpActor, &[&["", " ", "", ""], &["1", "Admin", "Simple", "1"]]),
            table("misc", TableKind::Generic, &[&["1", "Noise", "Complex", "99"]]),
        ]);
        let inv = collect_inventory(&d);
        assert_eq!(inv.actors.len(), 1);
        assert!(inv.warnings.is_empty());
    }

    #[test]
    fn multiple_inventory_tables_are_concatenated() {
        let d = doc(vec![
            table("a1", TableKind::UcpActor, &[&["1", "Admin", "Simple", "1"]]),
            table("a2", TableKind::UcpActor, &[&["1", "Auditor", "Average", "2"]]),
        ]);
        let inv = collect_inventory(&d);
        let uaw: f64 = inv.actors.iter().map(|a| a.weight).sum();
        assert_eq!(uaw, 3.0);
    }

    #[test]
    fn use_case_at_reads_single_rows() {
        let t = table(
            "u",
            TableKind::UcpUsecase,
            &[&["1", "Login", "Average", "5", "10"], &["", "", "", "", ""]],
        );
        let uc = use_case_at(&t, 0).unwrap();
        assert_eq!(uc.name, "Login");
        assert_eq!(uc.classification, Complexity::Average);
        assert_eq!(uc.transaction_count, 5);
        assert_eq!(uc.weight, 10.0);
        assert!(use_case_at(&t, 1).is_none());
        assert!(use_case_at(&t, 2).is_none());
    }
}
