use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;

use crate::core::config::Settings;
use crate::core::time::format_primitive;
use crate::db::models::{Attempt, Exam};

/// Posts lifecycle events to an optional webhook. Delivery is best-effort:
/// failures are logged and counted, never surfaced to the request that
/// triggered them.
#[derive(Clone)]
pub(crate) struct Notifier {
    client: Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        let timeout = Duration::from_secs(settings.notifications().request_timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        let webhook_url = settings.notifications().webhook_url.clone();
        let webhook_url = if webhook_url.is_empty() { None } else { Some(webhook_url) };
        Self { client, webhook_url }
    }

    pub(crate) fn exam_published(&self, exam: &Exam) {
        self.dispatch(
            "exam.published",
            json!({
                "exam_id": exam.id,
                "title": exam.title,
                "cohort": exam.cohort,
                "start_time": format_primitive(exam.start_time),
                "end_time": format_primitive(exam.end_time),
            }),
        );
    }

    pub(crate) fn attempt_graded(&self, attempt: &Attempt) {
        self.dispatch(
            "attempt.graded",
            json!({
                "attempt_id": attempt.id,
                "exam_id": attempt.exam_id,
                "student_id": attempt.student_id,
                "score": attempt.score,
                "max_score": attempt.max_score,
            }),
        );
    }

    fn dispatch(&self, event: &'static str, payload: serde_json::Value) {
        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let client = self.client.clone();

        tokio::spawn(async move {
            if let Err(error) = post_event(&client, &url, event, payload).await {
                metrics::counter!("notification_delivery_fail_total").increment(1);
                tracing::warn!(error = %error, event, "Failed to deliver webhook notification");
            }
        });
    }
}

async fn post_event(
    client: &Client,
    url: &str,
    event: &str,
    payload: serde_json::Value,
) -> Result<()> {
    let response = client
        .post(url)
        .json(&json!({ "event": event, "data": payload }))
        .send()
        .await
        .context("Webhook request failed")?;

    response.error_for_status().context("Webhook returned an error status")?;
    Ok(())
}
