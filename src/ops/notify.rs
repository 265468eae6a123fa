use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use sqlx::PgPool;
use tokio::sync::broadcast;

use crate::repo::notifications::{self as repo_notifications, NewNotification, NotificationRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Fan-out of freshly stored notifications to connected coordinators.
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<NotificationRecord>,
}

impl NotificationHub {
    pub fn new(buffer: usize) -> Self {
        let (tx, _rx) = broadcast::channel(buffer.max(1));
        Self { sender: tx }
    }

    pub fn publish(&self, record: NotificationRecord) {
        // no receivers is fine; pollers read from the table
        let _ = self.sender.send(record);
    }

    pub fn stream(&self) -> impl Stream<Item = Result<SseEvent, std::convert::Infallible>> {
        let rx = self.sender.subscribe();
        tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|item| async move {
            match item {
                Ok(record) => {
                    let json = serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string());
                    Some(Ok(SseEvent::default().event("notification").data(json)))
                }
                Err(_lagged) => None,
            }
        })
    }
}

pub fn sse_response(
    hub: &NotificationHub,
) -> Sse<impl Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    Sse::new(hub.stream()).keep_alive(KeepAlive::new().interval(Duration::from_secs(20)))
}

/// Persist a notification and broadcast it.
pub async fn emit(
    pool: &PgPool,
    hub: &NotificationHub,
    title: &str,
    message: &str,
    severity: Severity,
    thesis_id: Option<i64>,
) -> Result<NotificationRecord, sqlx::Error> {
    let record = repo_notifications::insert_notification(
        pool,
        &NewNotification {
            title: title.to_string(),
            message: message.to_string(),
            severity: severity.as_str().to_string(),
            thesis_id,
        },
    )
    .await?;

    hub.publish(record.clone());
    Ok(record)
}
