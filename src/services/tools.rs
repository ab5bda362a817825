use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Value};

use crate::db::queries;
use crate::errors::ToolError;
use crate::services::ai::ToolSchema;
use crate::services::booking::{self, BookingRequest};
use crate::services::catalog::CatalogStore;
use crate::services::email::EmailProvider;
use crate::services::scheduling::CalendarStore;

/// Everything a tool handler may touch, borrowed for the duration of one
/// dispatch. Stores are injected here rather than reached for globally, so
/// tests can substitute in-memory instances.
pub struct ToolContext<'a> {
    pub conn: &'a Connection,
    pub catalog: &'a CatalogStore,
    pub calendar: &'a CalendarStore,
    pub email: &'a dyn EmailProvider,
    pub today: NaiveDate,
}

type Handler = fn(&ToolContext, &Value) -> Result<Value, ToolError>;

struct ToolDef {
    schema: ToolSchema,
    handler: Handler,
}

/// Name → (schema, handler). Adding a tool is one `register` call; nothing
/// else branches on tool names.
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: vec![] }
    }

    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();

        registry.register(
            ToolSchema {
                name: "get_business_info".to_string(),
                description: "Get business information: opening hours, contact details or address"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "category": {
                            "type": "string",
                            "description": "One of 'hours', 'contact' or 'address'. Omit for the full record."
                        }
                    },
                    "required": []
                }),
            },
            get_business_info,
        );

        registry.register(
            ToolSchema {
                name: "get_services".to_string(),
                description: "List all services with prices and durations".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            get_services,
        );

        registry.register(
            ToolSchema {
                name: "check_availability".to_string(),
                description: "List open start times on a date for an appointment of the given duration"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "date": {
                            "type": "string",
                            "description": "Date in YYYY-MM-DD format"
                        },
                        "duration_minutes": {
                            "type": "integer",
                            "description": "Total appointment duration in minutes"
                        }
                    },
                    "required": ["date", "duration_minutes"]
                }),
            },
            check_availability,
        );

        registry.register(
            ToolSchema {
                name: "book_appointment".to_string(),
                description: "Book an appointment once the customer has confirmed name, phone, email, date, time and services"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "customer_name": { "type": "string" },
                        "customer_phone": { "type": "string" },
                        "customer_email": { "type": "string" },
                        "date": {
                            "type": "string",
                            "description": "Date in YYYY-MM-DD format"
                        },
                        "time": {
                            "type": "string",
                            "description": "Start time in HH:MM format, on a 30-minute boundary"
                        },
                        "services": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Names of the requested services"
                        }
                    },
                    "required": ["customer_name", "customer_phone", "customer_email", "date", "time", "services"]
                }),
            },
            book_appointment,
        );

        registry.register(
            ToolSchema {
                name: "send_email_confirmation".to_string(),
                description: "Send a confirmation email for a booked appointment".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "appointment_id": { "type": "string" },
                        "customer_email": { "type": "string" }
                    },
                    "required": ["appointment_id", "customer_email"]
                }),
            },
            send_email_confirmation,
        );

        registry
    }

    pub fn register(&mut self, schema: ToolSchema, handler: Handler) {
        self.tools.push(ToolDef { schema, handler });
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema.clone()).collect()
    }

    pub fn dispatch(&self, ctx: &ToolContext, name: &str, args: &Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.schema.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        validate_arguments(&tool.schema.parameters, args)?;
        (tool.handler)(ctx, args)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Presence and JSON-type check against the declared schema. Failures come
/// back as `InvalidArguments` with a message precise enough for the model
/// to correct itself on the next round.
fn validate_arguments(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let Some(args_obj) = args.as_object() else {
        return Err(ToolError::InvalidArguments(
            "arguments must be a JSON object".to_string(),
        ));
    };

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for field in required.iter().filter_map(|v| v.as_str()) {
            if !args_obj.contains_key(field) {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required field: {field}"
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
        for (key, value) in args_obj {
            let Some(expected) = properties
                .get(key)
                .and_then(|p| p.get("type"))
                .and_then(|t| t.as_str())
            else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(ToolError::InvalidArguments(format!(
                    "field {key} must be of type {expected}"
                )));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn str_arg<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing required field: {field}")))
}

// ── Handlers ──

fn get_business_info(ctx: &ToolContext, args: &Value) -> Result<Value, ToolError> {
    let category = args.get("category").and_then(|v| v.as_str());
    ctx.catalog.business_info(category)
}

fn get_services(ctx: &ToolContext, _args: &Value) -> Result<Value, ToolError> {
    Ok(json!({ "services": ctx.catalog.services() }))
}

fn check_availability(ctx: &ToolContext, args: &Value) -> Result<Value, ToolError> {
    let date = str_arg(args, "date")?;
    let duration_minutes = args["duration_minutes"].as_i64().unwrap_or(0) as i32;

    let slots = ctx
        .calendar
        .check_availability(ctx.conn, date, duration_minutes, ctx.today)?;

    Ok(json!({
        "date": date,
        "duration_minutes": duration_minutes,
        "available": !slots.is_empty(),
        "available_slots": slots,
    }))
}

fn book_appointment(ctx: &ToolContext, args: &Value) -> Result<Value, ToolError> {
    let services = args["services"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|v| {
                    v.as_str().map(|s| s.to_string()).ok_or_else(|| {
                        ToolError::InvalidArguments("services must be strings".to_string())
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    let request = BookingRequest {
        customer_name: str_arg(args, "customer_name")?.to_string(),
        customer_phone: str_arg(args, "customer_phone")?.to_string(),
        customer_email: str_arg(args, "customer_email")?.to_string(),
        date: str_arg(args, "date")?.to_string(),
        time: str_arg(args, "time")?.to_string(),
        services,
    };

    let appointment =
        booking::book_appointment(ctx.conn, ctx.catalog, ctx.calendar, &request, ctx.today)?;

    let message = format!(
        "Appointment {} confirmed for {} at {}",
        appointment.id, appointment.date, appointment.start_time
    );
    Ok(json!({ "appointment": appointment, "message": message }))
}

fn send_email_confirmation(ctx: &ToolContext, args: &Value) -> Result<Value, ToolError> {
    let appointment_id = str_arg(args, "appointment_id")?;
    let customer_email = str_arg(args, "customer_email")?;

    let appointment = queries::get_appointment(ctx.conn, appointment_id)
        .map_err(ToolError::Internal)?
        .ok_or_else(|| ToolError::NotFound(format!("no appointment with id {appointment_id}")))?;

    ctx.email
        .send_confirmation(customer_email, &appointment)
        .map_err(ToolError::Internal)?;

    Ok(json!({
        "sent": true,
        "appointment_id": appointment_id,
        "message": format!("Confirmation email sent to {customer_email}"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{BusinessInfo, Service, WorkingHours};
    use crate::services::email::LogEmailProvider;

    fn fixture_catalog() -> CatalogStore {
        let business = BusinessInfo {
            name: "Elite Barber Shop".to_string(),
            address: "123 Sunset Boulevard, West Hollywood, CA 90069".to_string(),
            phone: "+1 (323) 555-0123".to_string(),
            email: "bookings@elitebarber.example".to_string(),
            timezone: "America/Los_Angeles".to_string(),
            hours: WorkingHours::from_json(
                r#"{"windows":[{"day":"mon","start":"09:00","end":"17:00"}]}"#,
            )
            .unwrap(),
        };
        let services = vec![Service {
            name: "Haircut".to_string(),
            price: 150.0,
            duration_minutes: 30,
            description: None,
        }];
        CatalogStore::from_parts(business, services).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::parse_from_str("2025-01-13", "%Y-%m-%d").unwrap()
    }

    fn with_context<T>(f: impl FnOnce(&ToolRegistry, &ToolContext) -> T) -> T {
        let conn = db::init_db(":memory:").unwrap();
        let catalog = fixture_catalog();
        let calendar = CalendarStore::new(catalog.hours().clone());
        let registry = ToolRegistry::with_default_tools();
        let email = LogEmailProvider;
        let ctx = ToolContext {
            conn: &conn,
            catalog: &catalog,
            calendar: &calendar,
            email: &email,
            today: today(),
        };
        f(&registry, &ctx)
    }

    #[test]
    fn test_unknown_tool_never_invokes_a_handler() {
        with_context(|registry, ctx| {
            let err = registry
                .dispatch(ctx, "delete_everything", &json!({}))
                .unwrap_err();
            assert!(matches!(err, ToolError::UnknownTool(name) if name == "delete_everything"));

            // no handler ran: the ledger and appointment list are untouched
            assert!(queries::booked_slots_for_day(ctx.conn, ctx.today)
                .unwrap()
                .is_empty());
            assert_eq!(queries::count_appointments_on(ctx.conn, ctx.today).unwrap(), 0);
        });
    }

    #[test]
    fn test_missing_required_field() {
        with_context(|registry, ctx| {
            let err = registry
                .dispatch(ctx, "check_availability", &json!({"date": "2025-01-13"}))
                .unwrap_err();
            assert!(
                matches!(err, ToolError::InvalidArguments(ref msg) if msg.contains("duration_minutes"))
            );
        });
    }

    #[test]
    fn test_wrong_argument_type() {
        with_context(|registry, ctx| {
            let err = registry
                .dispatch(
                    ctx,
                    "check_availability",
                    &json!({"date": "2025-01-13", "duration_minutes": "thirty"}),
                )
                .unwrap_err();
            assert!(
                matches!(err, ToolError::InvalidArguments(ref msg) if msg.contains("duration_minutes"))
            );
        });
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        with_context(|registry, ctx| {
            let err = registry
                .dispatch(ctx, "get_services", &json!("{}"))
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(_)));
        });
    }

    #[test]
    fn test_get_services_result_shape() {
        with_context(|registry, ctx| {
            let result = registry.dispatch(ctx, "get_services", &json!({})).unwrap();
            assert_eq!(result["services"][0]["name"], "Haircut");
            assert_eq!(result["services"][0]["price"], 150.0);
        });
    }

    #[test]
    fn test_get_business_info_unknown_category() {
        with_context(|registry, ctx| {
            let err = registry
                .dispatch(ctx, "get_business_info", &json!({"category": "parking"}))
                .unwrap_err();
            assert!(matches!(err, ToolError::NotFound(_)));
        });
    }

    #[test]
    fn test_check_availability_via_dispatch() {
        with_context(|registry, ctx| {
            let result = registry
                .dispatch(
                    ctx,
                    "check_availability",
                    &json!({"date": "2025-01-13", "duration_minutes": 30}),
                )
                .unwrap();
            assert_eq!(result["available"], true);
            assert_eq!(result["available_slots"][0], "09:00");
        });
    }

    #[test]
    fn test_book_appointment_via_dispatch() {
        with_context(|registry, ctx| {
            let result = registry
                .dispatch(
                    ctx,
                    "book_appointment",
                    &json!({
                        "customer_name": "Jordan Lee",
                        "customer_phone": "+13235551234",
                        "customer_email": "jordan@example.com",
                        "date": "2025-01-13",
                        "time": "14:00",
                        "services": ["Haircut"]
                    }),
                )
                .unwrap();
            assert_eq!(result["appointment"]["id"], "APT-20250113-001");

            // and the confirmation email tool finds it
            let sent = registry
                .dispatch(
                    ctx,
                    "send_email_confirmation",
                    &json!({
                        "appointment_id": "APT-20250113-001",
                        "customer_email": "jordan@example.com"
                    }),
                )
                .unwrap();
            assert_eq!(sent["sent"], true);
        });
    }

    #[test]
    fn test_email_confirmation_for_unknown_appointment() {
        with_context(|registry, ctx| {
            let err = registry
                .dispatch(
                    ctx,
                    "send_email_confirmation",
                    &json!({
                        "appointment_id": "APT-20250113-999",
                        "customer_email": "jordan@example.com"
                    }),
                )
                .unwrap_err();
            assert!(matches!(err, ToolError::NotFound(_)));
        });
    }

    #[test]
    fn test_error_payload_shape() {
        let err = ToolError::UnknownService("Massage".to_string());
        let payload = err.to_payload();
        assert_eq!(payload["code"], "unknown_service");
        assert!(payload["error"].as_str().unwrap().contains("Massage"));
    }
}
