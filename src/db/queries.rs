use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::Appointment;

// ── Appointments ──

pub fn insert_appointment(conn: &Connection, appointment: &Appointment) -> anyhow::Result<()> {
    let services_json = serde_json::to_string(&appointment.services)?;

    conn.execute(
        "INSERT INTO appointments (id, customer_name, customer_phone, customer_email, date, start_time, services, total_price, duration_minutes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            appointment.id,
            appointment.customer_name,
            appointment.customer_phone,
            appointment.customer_email,
            appointment.date.format("%Y-%m-%d").to_string(),
            appointment.start_time,
            services_json,
            appointment.total_price,
            appointment.duration_minutes,
            appointment.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

pub fn count_appointments_on(conn: &Connection, date: NaiveDate) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE date = ?1",
        params![date.format("%Y-%m-%d").to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        "SELECT id, customer_name, customer_phone, customer_email, date, start_time, services, total_price, duration_minutes, created_at
         FROM appointments WHERE id = ?1",
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appointment) => Ok(Some(appointment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_appointments(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(
        "SELECT id, customer_name, customer_phone, customer_email, date, start_time, services, total_price, duration_minutes, created_at
         FROM appointments ORDER BY date DESC, start_time DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let id: String = row.get(0)?;
    let customer_name: String = row.get(1)?;
    let customer_phone: String = row.get(2)?;
    let customer_email: String = row.get(3)?;
    let date_str: String = row.get(4)?;
    let start_time: String = row.get(5)?;
    let services_json: String = row.get(6)?;
    let total_price: f64 = row.get(7)?;
    let duration_minutes: i32 = row.get(8)?;
    let created_at_str: String = row.get(9)?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
        .unwrap_or_else(|_| Utc::now().date_naive());
    let services: Vec<String> = serde_json::from_str(&services_json).unwrap_or_default();
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Appointment {
        id,
        customer_name,
        customer_phone,
        customer_email,
        date,
        start_time,
        services,
        total_price,
        duration_minutes,
        created_at,
    })
}

// ── Calendar slots ──

pub fn booked_slots_for_day(conn: &Connection, date: NaiveDate) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT slot_time FROM calendar_slots WHERE date = ?1 AND booked = 1 ORDER BY slot_time ASC",
    )?;

    let rows = stmt.query_map(params![date.format("%Y-%m-%d").to_string()], |row| {
        row.get::<_, String>(0)
    })?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

pub fn mark_slot_booked(conn: &Connection, date: NaiveDate, time: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO calendar_slots (date, slot_time, booked) VALUES (?1, ?2, 1)
         ON CONFLICT(date, slot_time) DO UPDATE SET booked = 1",
        params![date.format("%Y-%m-%d").to_string(), time],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn sample_appointment(id: &str, date: &str, time: &str) -> Appointment {
        Appointment {
            id: id.to_string(),
            customer_name: "Alice".to_string(),
            customer_phone: "+13235550000".to_string(),
            customer_email: "alice@example.com".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            start_time: time.to_string(),
            services: vec!["Haircut".to_string()],
            total_price: 45.0,
            duration_minutes: 30,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_insert_and_get_appointment() {
        let conn = setup_db();
        let appointment = sample_appointment("APT-20250113-001", "2025-01-13", "14:00");
        insert_appointment(&conn, &appointment).unwrap();

        let loaded = get_appointment(&conn, "APT-20250113-001").unwrap().unwrap();
        assert_eq!(loaded.customer_name, "Alice");
        assert_eq!(loaded.start_time, "14:00");
        assert_eq!(loaded.services, vec!["Haircut".to_string()]);
    }

    #[test]
    fn test_get_appointment_missing() {
        let conn = setup_db();
        assert!(get_appointment(&conn, "APT-00000000-000").unwrap().is_none());
    }

    #[test]
    fn test_count_appointments_per_day() {
        let conn = setup_db();
        insert_appointment(&conn, &sample_appointment("a1", "2025-01-13", "09:00")).unwrap();
        insert_appointment(&conn, &sample_appointment("a2", "2025-01-13", "10:00")).unwrap();
        insert_appointment(&conn, &sample_appointment("a3", "2025-01-14", "09:00")).unwrap();

        let day = NaiveDate::parse_from_str("2025-01-13", "%Y-%m-%d").unwrap();
        assert_eq!(count_appointments_on(&conn, day).unwrap(), 2);
    }

    #[test]
    fn test_booked_slots_roundtrip() {
        let conn = setup_db();
        let day = NaiveDate::parse_from_str("2025-01-13", "%Y-%m-%d").unwrap();

        mark_slot_booked(&conn, day, "09:30").unwrap();
        mark_slot_booked(&conn, day, "09:00").unwrap();
        // marking again must not duplicate the row
        mark_slot_booked(&conn, day, "09:30").unwrap();

        let booked = booked_slots_for_day(&conn, day).unwrap();
        assert_eq!(booked, vec!["09:00".to_string(), "09:30".to_string()]);

        let other_day = NaiveDate::parse_from_str("2025-01-14", "%Y-%m-%d").unwrap();
        assert!(booked_slots_for_day(&conn, other_day).unwrap().is_empty());
    }
}
