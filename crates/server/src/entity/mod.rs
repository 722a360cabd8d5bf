//! SeaORM entities for the alerts schema.
//!
//! Politicians, Hansards and statements are owned by the parliament data
//! importer; this service only reads them.

pub mod hansard;
pub mod politician;
pub mod politician_alert;
pub mod statement;
pub mod subscription;
pub mod user;
