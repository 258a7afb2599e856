use serde::{Deserialize, Serialize};

/// Download-tracking entry in the acquisition service (a Radarr movie)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcquisitionRecord {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub monitored: bool,
}
