//! Domain layer: models, ports, and the error taxonomy.
//!
//! Nothing here touches sqlx or spawns tasks; persistence and scheduling
//! live behind the ports.

pub mod error;
pub mod models;
pub mod ports;

pub use error::OversightError;
