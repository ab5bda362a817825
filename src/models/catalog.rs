use serde::{Deserialize, Serialize};

use super::hours::WorkingHours;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub price: f64,
    pub duration_minutes: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub timezone: String,
    pub hours: WorkingHours,
}
