//! Alarm routes

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::error::{ApiError, StatusBody};
use crate::AppState;
use alarm::AlarmWindow;

fn required_field<'a>(body: &'a Value, name: &'static str) -> Result<&'a str, ApiError> {
    body.get(name)
        .and_then(Value::as_str)
        .ok_or(ApiError::MissingField(name))
}

/// Publish an alarm-set message. The alarm is armed when the message comes
/// back through the subscription, the same path the device uses.
pub async fn set_alarm(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StatusBody>, ApiError> {
    // A body that is not JSON is reported like an empty one
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let start = required_field(&body, "start_time")?;
    let end = required_field(&body, "end_time")?;

    let window = AlarmWindow::parse(start, end)?;
    state.publisher.publish_alarm(&window).await?;

    info!("Alarm set for {} to {}", start, end);
    Ok(Json(StatusBody::success(format!(
        "Alarm set for {} to {}",
        start, end
    ))))
}
