// Estimation engine: inventories, complexity factors, cost breakdown.

pub mod engine;
pub mod factors;
pub mod records;

pub use engine::{estimate, BreakdownRow, CostLine, CostSummary, Estimate, RowKind, UcpMetrics};
pub use records::{ActorRecord, Complexity, UseCaseRecord};
