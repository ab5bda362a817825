use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::models::Session;
use crate::services::ai::LlmProvider;
use crate::services::catalog::CatalogStore;
use crate::services::email::EmailProvider;
use crate::services::scheduling::CalendarStore;
use crate::services::tools::ToolRegistry;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub catalog: CatalogStore,
    pub calendar: CalendarStore,
    pub registry: ToolRegistry,
    pub llm: Box<dyn LlmProvider>,
    pub email: Box<dyn EmailProvider>,
    pub sessions: Mutex<HashMap<String, Session>>,
}
