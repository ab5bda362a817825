pub mod appointment;
pub mod catalog;
pub mod conversation;
pub mod hours;

pub use appointment::Appointment;
pub use catalog::{BusinessInfo, Service};
pub use conversation::{Role, Session, ToolCall, Turn};
pub use hours::{HoursWindow, WorkingHours};
