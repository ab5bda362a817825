use crate::models::Appointment;

pub trait EmailProvider: Send + Sync {
    fn send_confirmation(&self, to: &str, appointment: &Appointment) -> anyhow::Result<()>;
}

/// Stand-in delivery: writes the send to the log instead of talking to a
/// mail service.
pub struct LogEmailProvider;

impl EmailProvider for LogEmailProvider {
    fn send_confirmation(&self, to: &str, appointment: &Appointment) -> anyhow::Result<()> {
        tracing::info!(
            to = %to,
            appointment_id = %appointment.id,
            date = %appointment.date,
            time = %appointment.start_time,
            "confirmation email sent"
        );
        Ok(())
    }
}
