use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CourierStatus {
    Available,
    Unavailable,
    Busy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    /// Addressing key for the courier's live channel; distinct from the
    /// courier record id.
    pub actor_id: Uuid,
    pub name: String,
    pub location: Option<GeoPoint>,
    pub status: CourierStatus,
    pub city: Option<String>,
    pub updated_at: DateTime<Utc>,
}
