pub mod assist;
pub mod export;
pub mod ingest;
pub mod persist;
pub mod session;

pub use export::{export_document, ExportPaths};
pub use ingest::{ingest, IngestReport};
pub use session::{EstimationLock, Session, SessionError};
