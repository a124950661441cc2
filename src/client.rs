//! Client for the report submission endpoint.
//!
//! # Wire Contract
//!
//! Reports are sent as `multipart/form-data` to `POST {api}/reports/` with
//! the fields `category`, `description`, `gender`, `location`,
//! `perpetrator_details`, `is_anonymous`, `contact_phone`, `contact_email`
//! and, when attached, `evidence`.
//!
//! Any 2xx response means the report was stored. Its JSON body normally
//! carries an `id`, but a missing or unreadable body is still a success so
//! that the user is never invited to send the same report twice. Any other
//! status carries a JSON object whose `message` (or `detail`) is shown to the
//! user verbatim.
//!
//! # Privacy
//!
//! Only the category, the attachment size, and the response status are
//! logged. Report text and contact details never reach the logs.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::{info, instrument, warn};

use crate::error::{GENERIC_SUBMIT_MESSAGE, SubmitError};
use crate::model::{DraftField, EvidenceFile, ReportDraft, SubmissionResult};
use crate::wizard::{Wizard, WizardEffect, WizardEvent, WizardPhase, reduce};

/// Client for the reports collection resource.
#[derive(Clone)]
pub struct ReportClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReportClient {
    /// Create a client for the API rooted at `base_url` (e.g.
    /// `http://localhost:8000/api`).
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client that shares an existing HTTP connection pool.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL of the reports collection.
    pub fn reports_url(&self) -> String {
        format!("{}/reports/", self.base_url)
    }

    /// Submit a report. Exactly one request is made; failures are never
    /// retried here.
    #[instrument(skip_all, fields(category = %draft.category, evidence_bytes))]
    pub async fn submit(&self, draft: &ReportDraft) -> Result<SubmissionResult, SubmitError> {
        tracing::Span::current().record(
            "evidence_bytes",
            draft.evidence.as_ref().map(EvidenceFile::size).unwrap_or(0),
        );

        let form = build_form(draft)?;

        let response = self
            .client
            .post(self.reports_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Report submission did not complete");
                SubmitError::Transport(e)
            })?;

        let status = response.status();
        // An unreadable body is treated the same as a body with no message.
        let body: Option<serde_json::Value> = response.json().await.ok();

        if !status.is_success() {
            let message = body
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| GENERIC_SUBMIT_MESSAGE.to_string());
            warn!(status = status.as_u16(), "Report rejected by server");
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let result = SubmissionResult::from_body(body.unwrap_or_default());
        match &result.id {
            Some(id) => info!(status = status.as_u16(), report_id = %id, "Report submitted"),
            None => warn!(status = status.as_u16(), "Report accepted without a report id"),
        }
        Ok(result)
    }
}

/// Build the multipart body, translating draft field names to wire names.
/// A recognised category is sent as its canonical label.
fn build_form(draft: &ReportDraft) -> Result<Form, SubmitError> {
    let category = match draft.known_category() {
        Some(category) => category.label().to_string(),
        None => draft.category.trim().to_string(),
    };
    let mut form = Form::new()
        .text("category", category)
        .text("description", draft.description.clone())
        .text("gender", draft.gender.wire_value())
        .text("location", draft.location.clone())
        .text("perpetrator_details", draft.perpetrator_details.clone())
        .text("is_anonymous", draft.anonymous.to_string())
        .text("contact_phone", draft.contact_phone.trim().to_string())
        .text("contact_email", draft.contact_email.trim().to_string());

    if let Some(evidence) = &draft.evidence {
        let part = Part::bytes(evidence.bytes.clone())
            .file_name(evidence.file_name.clone())
            .mime_str(&evidence.mime_type)
            .map_err(SubmitError::Transport)?;
        form = form.part("evidence", part);
    }

    Ok(form)
}

/// Pull a user-facing message out of an error body.
fn error_message(body: &serde_json::Value) -> Option<String> {
    ["message", "detail"]
        .iter()
        .filter_map(|key| body.get(key))
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(str::to_string)
}

/// Drives a [`Wizard`] and performs its submit effect with a [`ReportClient`].
pub struct ReportSession {
    client: ReportClient,
    wizard: Wizard,
}

impl ReportSession {
    /// Open a new session with an empty draft at step 1.
    pub fn new(client: ReportClient) -> Self {
        let (wizard, _) = reduce(Wizard::new(), WizardEvent::Start);
        Self { client, wizard }
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    pub fn phase(&self) -> WizardPhase {
        self.wizard.phase
    }

    /// Apply an event. If the transition requests a submission, it is
    /// performed and its outcome fed back before returning.
    pub async fn dispatch(&mut self, event: WizardEvent) -> &Wizard {
        let wizard = std::mem::take(&mut self.wizard);
        let (wizard, effect) = reduce(wizard, event);
        self.wizard = wizard;

        if let Some(WizardEffect::SubmitReport(draft)) = effect {
            let outcome = match self.client.submit(&draft).await {
                Ok(result) => WizardEvent::SubmitSucceeded(result),
                Err(e) => WizardEvent::SubmitFailed(e.user_message()),
            };
            let wizard = std::mem::take(&mut self.wizard);
            self.wizard = reduce(wizard, outcome).0;
        }

        &self.wizard
    }

    /// Update a single draft field.
    pub async fn set(&mut self, field: DraftField) -> &Wizard {
        self.dispatch(WizardEvent::FieldChanged(field)).await
    }

    /// Advance from the current step; from step 2 this submits.
    pub async fn advance(&mut self) -> &Wizard {
        self.dispatch(WizardEvent::Continue).await
    }

    /// Submit (or retry submitting) the current draft.
    pub async fn submit(&mut self) -> &Wizard {
        self.dispatch(WizardEvent::Submit).await
    }
}
