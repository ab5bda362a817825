use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};

use crate::errors::AppError;
use crate::models::{Session, Turn};
use crate::services::ai::ModelReply;
use crate::services::catalog::CatalogStore;
use crate::services::tools::ToolContext;
use crate::state::AppState;

const SESSION_TTL_MINUTES: i64 = 30;

/// One user turn: append the message, then generate until the model stops
/// asking for tools. Tool failures are folded back into the transcript for
/// the model to handle; only a dead model API or a runaway tool loop aborts
/// the turn.
///
/// The loop works on a copy of the transcript and commits it only once a
/// final reply exists, so an aborted turn leaves the session exactly as it
/// was plus the user's message.
pub async fn handle_user_message(
    state: &Arc<AppState>,
    session_id: &str,
    text: &str,
) -> Result<String, AppError> {
    let now = Utc::now().naive_utc();

    let mut working = {
        let mut sessions = state.sessions.lock().unwrap();
        prune_idle(&mut sessions, now);
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id, now));
        session.turns.push(Turn::user(text));
        session.last_activity = now;
        session.turns.clone()
    };

    let system_prompt = build_system_prompt(&state.catalog, now.date());
    let schemas = state.registry.schemas();

    for _ in 0..state.config.max_tool_iterations {
        let reply = state
            .llm
            .chat(&system_prompt, &working, &schemas)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, session = %session_id, "model call failed");
                AppError::ModelUnavailable(e.to_string())
            })?;

        match reply {
            ModelReply::Text(content) => {
                working.push(Turn::assistant(content.clone()));
                let mut sessions = state.sessions.lock().unwrap();
                if let Some(session) = sessions.get_mut(session_id) {
                    session.turns = working;
                    session.last_activity = Utc::now().naive_utc();
                }
                return Ok(content);
            }
            ModelReply::ToolCalls(calls) => {
                working.push(Turn::assistant_tool_calls(calls.clone()));
                for call in &calls {
                    let payload = {
                        let db = state.db.lock().unwrap();
                        let ctx = ToolContext {
                            conn: &db,
                            catalog: &state.catalog,
                            calendar: &state.calendar,
                            email: state.email.as_ref(),
                            today: now.date(),
                        };
                        match state.registry.dispatch(&ctx, &call.name, &call.arguments) {
                            Ok(value) => {
                                tracing::info!(session = %session_id, tool = %call.name, "tool call succeeded");
                                value
                            }
                            Err(e) => {
                                tracing::warn!(session = %session_id, tool = %call.name, error = %e, "tool call failed");
                                e.to_payload()
                            }
                        }
                    };
                    working.push(Turn::tool_result(call.id.clone(), payload.to_string()));
                }
            }
        }
    }

    tracing::error!(
        session = %session_id,
        cap = state.config.max_tool_iterations,
        "tool loop exceeded iteration cap"
    );
    Err(AppError::ToolLoopExceeded(state.config.max_tool_iterations))
}

fn build_system_prompt(catalog: &CatalogStore, today: NaiveDate) -> String {
    let business = catalog.business();
    format!(
        "You are a friendly, professional receptionist at {}, located at {}.\n\
         Help customers book appointments and answer questions about our services.\n\n\
         Guidelines:\n\
         - Collect the customer's name, phone number and email before booking\n\
         - Check availability before booking; if a time is taken, suggest alternatives\n\
         - Confirm all details with the customer before finalizing an appointment\n\
         - Always give the customer the appointment id after a successful booking\n\
         - All prices are in USD\n\n\
         Working hours: {}\n\
         Current date: {}",
        business.name,
        business.address,
        business.hours.to_human_readable(),
        today.format("%Y-%m-%d"),
    )
}

fn prune_idle(sessions: &mut HashMap<String, Session>, now: NaiveDateTime) {
    sessions.retain(|_, session| now - session.last_activity < Duration::minutes(SESSION_TTL_MINUTES));
}
