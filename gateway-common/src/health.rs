//! Health/readiness response.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Backend handle acquired, generation routes accept traffic.
    Ok,
    /// Startup still acquiring the backend handle.
    Loading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Identifier of the active backend (model id or endpoint id).
    pub model: String,
}
