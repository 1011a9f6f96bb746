// handlers/mod.rs
//
// Public system endpoints (/, /health) and the authenticated forest-watcher API.
pub mod forest_watcher;
pub mod system;
