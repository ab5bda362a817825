use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub services: Vec<String>,
    pub total_price: f64,
    pub duration_minutes: i32,
    pub created_at: NaiveDateTime,
}
