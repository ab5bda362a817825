use chrono::{NaiveDate, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::ToolError;
use crate::models::{Appointment, Service};
use crate::services::catalog::CatalogStore;
use crate::services::scheduling::CalendarStore;

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub date: String,
    pub time: String,
    pub services: Vec<String>,
}

/// Validates and commits one appointment. The availability re-check in here
/// is the single guard against double booking: whatever the model was told
/// earlier in the conversation, the ledger is consulted again at commit
/// time.
pub fn book_appointment(
    conn: &Connection,
    catalog: &CatalogStore,
    calendar: &CalendarStore,
    request: &BookingRequest,
    today: NaiveDate,
) -> Result<Appointment, ToolError> {
    for (field, value) in [
        ("customer_name", &request.customer_name),
        ("customer_phone", &request.customer_phone),
        ("customer_email", &request.customer_email),
    ] {
        if value.trim().is_empty() {
            return Err(ToolError::InvalidArguments(format!(
                "{field} must not be empty"
            )));
        }
    }
    if request.services.is_empty() {
        return Err(ToolError::InvalidArguments(
            "at least one service is required".to_string(),
        ));
    }

    let resolved = resolve_services(catalog, &request.services)?;
    let duration_minutes: i32 = resolved.iter().map(|s| s.duration_minutes).sum();
    let total_price: f64 = resolved.iter().map(|s| s.price).sum();

    let day = calendar.parse_date(&request.date, today)?;
    let open = calendar.check_availability(conn, &request.date, duration_minutes, today)?;
    if !open.contains(&request.time) {
        return Err(ToolError::SlotUnavailable {
            date: request.date.clone(),
            time: request.time.clone(),
        });
    }

    let sequence = queries::count_appointments_on(conn, day).map_err(ToolError::Internal)? + 1;
    let id = format!("APT-{}-{:03}", day.format("%Y%m%d"), sequence);

    let appointment = Appointment {
        id,
        customer_name: request.customer_name.trim().to_string(),
        customer_phone: request.customer_phone.trim().to_string(),
        customer_email: request.customer_email.trim().to_string(),
        date: day,
        start_time: request.time.clone(),
        services: resolved.iter().map(|s| s.name.clone()).collect(),
        total_price,
        duration_minutes,
        created_at: Utc::now().naive_utc(),
    };

    // slot marking and the appointment row land together or not at all
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| ToolError::Internal(e.into()))?;
    calendar.mark_span_booked(&tx, day, &request.time, duration_minutes)?;
    queries::insert_appointment(&tx, &appointment).map_err(ToolError::Internal)?;
    tx.commit().map_err(|e| ToolError::Internal(e.into()))?;

    Ok(appointment)
}

/// Resolves names against the catalog, collapsing duplicates so no service
/// is counted twice in the totals. Order of first occurrence is kept.
fn resolve_services<'a>(
    catalog: &'a CatalogStore,
    names: &[String],
) -> Result<Vec<&'a Service>, ToolError> {
    let mut resolved: Vec<&Service> = Vec::with_capacity(names.len());
    let mut seen: Vec<String> = Vec::with_capacity(names.len());

    for name in names {
        let service = catalog
            .find_service(name)
            .ok_or_else(|| ToolError::UnknownService(name.clone()))?;
        let key = service.name.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        resolved.push(service);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{BusinessInfo, WorkingHours};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn fixture_catalog() -> CatalogStore {
        let business = BusinessInfo {
            name: "Elite Barber Shop".to_string(),
            address: "123 Sunset Boulevard, West Hollywood, CA 90069".to_string(),
            phone: "+1 (323) 555-0123".to_string(),
            email: "bookings@elitebarber.example".to_string(),
            timezone: "America/Los_Angeles".to_string(),
            hours: WorkingHours::from_json(
                r#"{"windows":[
                    {"day":"mon","start":"09:00","end":"17:00"},
                    {"day":"tue","start":"09:00","end":"17:00"}
                ]}"#,
            )
            .unwrap(),
        };
        let services = vec![
            Service {
                name: "Haircut".to_string(),
                price: 150.0,
                duration_minutes: 30,
                description: None,
            },
            Service {
                name: "Beard Trim".to_string(),
                price: 75.0,
                duration_minutes: 15,
                description: None,
            },
        ];
        CatalogStore::from_parts(business, services).unwrap()
    }

    fn calendar(catalog: &CatalogStore) -> CalendarStore {
        CalendarStore::new(catalog.hours().clone())
    }

    fn today() -> NaiveDate {
        NaiveDate::parse_from_str("2025-01-13", "%Y-%m-%d").unwrap()
    }

    fn request(date: &str, time: &str, services: &[&str]) -> BookingRequest {
        BookingRequest {
            customer_name: "Jordan Lee".to_string(),
            customer_phone: "+13235551234".to_string(),
            customer_email: "jordan@example.com".to_string(),
            date: date.to_string(),
            time: time.to_string(),
            services: services.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_booking_both_services_sums_totals_and_blocks_slot() {
        let conn = setup_db();
        let catalog = fixture_catalog();
        let calendar = calendar(&catalog);

        let appointment = book_appointment(
            &conn,
            &catalog,
            &calendar,
            &request("2025-01-13", "14:00", &["Haircut", "Beard Trim"]),
            today(),
        )
        .unwrap();

        assert_eq!(appointment.id, "APT-20250113-001");
        assert_eq!(appointment.total_price, 225.0);
        assert_eq!(appointment.duration_minutes, 45);
        assert_eq!(
            appointment.services,
            vec!["Haircut".to_string(), "Beard Trim".to_string()]
        );

        // 14:00 is no longer offered for a 45-minute appointment
        let slots = calendar
            .check_availability(&conn, "2025-01-13", 45, today())
            .unwrap();
        assert!(!slots.contains(&"14:00".to_string()));
    }

    #[test]
    fn test_ids_are_sequential_per_day() {
        let conn = setup_db();
        let catalog = fixture_catalog();
        let calendar = calendar(&catalog);

        let first = book_appointment(
            &conn,
            &catalog,
            &calendar,
            &request("2025-01-13", "09:00", &["Haircut"]),
            today(),
        )
        .unwrap();
        let second = book_appointment(
            &conn,
            &catalog,
            &calendar,
            &request("2025-01-13", "10:00", &["Haircut"]),
            today(),
        )
        .unwrap();
        let other_day = book_appointment(
            &conn,
            &catalog,
            &calendar,
            &request("2025-01-14", "09:00", &["Haircut"]),
            today(),
        )
        .unwrap();

        assert_eq!(first.id, "APT-20250113-001");
        assert_eq!(second.id, "APT-20250113-002");
        assert_eq!(other_day.id, "APT-20250114-001");
    }

    #[test]
    fn test_double_booking_always_rejected() {
        let conn = setup_db();
        let catalog = fixture_catalog();
        let calendar = calendar(&catalog);

        book_appointment(
            &conn,
            &catalog,
            &calendar,
            &request("2025-01-13", "14:00", &["Haircut"]),
            today(),
        )
        .unwrap();

        for _ in 0..2 {
            let err = book_appointment(
                &conn,
                &catalog,
                &calendar,
                &request("2025-01-13", "14:00", &["Haircut"]),
                today(),
            )
            .unwrap_err();
            assert!(matches!(err, ToolError::SlotUnavailable { .. }));
        }
    }

    #[test]
    fn test_unknown_service_leaves_calendar_unchanged() {
        let conn = setup_db();
        let catalog = fixture_catalog();
        let calendar = calendar(&catalog);

        let before = calendar
            .check_availability(&conn, "2025-01-13", 30, today())
            .unwrap();

        let err = book_appointment(
            &conn,
            &catalog,
            &calendar,
            &request("2025-01-13", "14:00", &["Haircut", "Massage"]),
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::UnknownService(name) if name == "Massage"));

        let after = calendar
            .check_availability(&conn, "2025-01-13", 30, today())
            .unwrap();
        assert_eq!(before, after);
        assert_eq!(queries::count_appointments_on(&conn, today()).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_services_counted_once() {
        let conn = setup_db();
        let catalog = fixture_catalog();
        let calendar = calendar(&catalog);

        let appointment = book_appointment(
            &conn,
            &catalog,
            &calendar,
            &request("2025-01-13", "11:00", &["Haircut", "haircut", "Beard Trim"]),
            today(),
        )
        .unwrap();

        assert_eq!(appointment.total_price, 225.0);
        assert_eq!(appointment.duration_minutes, 45);
        assert_eq!(appointment.services.len(), 2);
    }

    #[test]
    fn test_misaligned_time_is_slot_unavailable() {
        let conn = setup_db();
        let catalog = fixture_catalog();
        let calendar = calendar(&catalog);

        let err = book_appointment(
            &conn,
            &catalog,
            &calendar,
            &request("2025-01-13", "14:15", &["Haircut"]),
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::SlotUnavailable { .. }));
    }

    #[test]
    fn test_past_date_is_invalid() {
        let conn = setup_db();
        let catalog = fixture_catalog();
        let calendar = calendar(&catalog);

        let err = book_appointment(
            &conn,
            &catalog,
            &calendar,
            &request("2025-01-06", "14:00", &["Haircut"]),
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidDate(_)));
    }

    #[test]
    fn test_empty_customer_fields_rejected() {
        let conn = setup_db();
        let catalog = fixture_catalog();
        let calendar = calendar(&catalog);

        let mut bad = request("2025-01-13", "14:00", &["Haircut"]);
        bad.customer_name = "  ".to_string();
        let err = book_appointment(&conn, &catalog, &calendar, &bad, today()).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let empty_services = request("2025-01-13", "14:00", &[]);
        let err =
            book_appointment(&conn, &catalog, &calendar, &empty_services, today()).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
