pub mod classify;
pub mod config;
pub mod estimation;
pub mod money;
pub mod store;
pub mod workspace;
