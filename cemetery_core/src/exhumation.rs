//! Exhumation requests: form validation, remote submission with a local
//! fallback store, and status review.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use plot_proto::{
    decode_requests_json, encode_requests_json, ExhumationRequest, ExhumationStatus, RequestOrigin,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::notify::{dispatch_detached, Notification, NotificationDispatch};

const MIN_PHONE_DIGITS: usize = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhumationDraft {
    pub plot_id: String,
    pub requester_name: String,
    pub requester_email: String,
    #[serde(default)]
    pub requester_phone: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub destination_plot: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every failing field of a draft, in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: &'static str) {
        self.errors.push(FieldError { field, message });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect();
        write!(f, "invalid exhumation request ({})", fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

fn looks_like_email(raw: &str) -> bool {
    match raw.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

impl ExhumationDraft {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.plot_id.trim().is_empty() {
            errors.push("plot_id", "plot is required");
        }
        if self.requester_name.trim().is_empty() {
            errors.push("requester_name", "name is required");
        }
        if self.requester_email.trim().is_empty() {
            errors.push("requester_email", "email is required");
        } else if !looks_like_email(&self.requester_email) {
            errors.push("requester_email", "email is not valid");
        }
        if let Some(phone) = self.requester_phone.as_deref().filter(|p| !p.trim().is_empty()) {
            let digits = phone.chars().filter(char::is_ascii_digit).count();
            if digits < MIN_PHONE_DIGITS {
                errors.push("requester_phone", "phone number is too short");
            }
        }
        if self.reason.trim().is_empty() {
            errors.push("reason", "reason is required");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn into_request(self, id: String, origin: RequestOrigin) -> ExhumationRequest {
        fn optional(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        ExhumationRequest {
            id,
            plot_id: self.plot_id.trim().to_string(),
            requester_name: self.requester_name.trim().to_string(),
            requester_email: self.requester_email.trim().to_string(),
            requester_phone: optional(self.requester_phone),
            relationship: optional(self.relationship),
            reason: self.reason.trim().to_string(),
            destination_plot: optional(self.destination_plot),
            documents: self.documents,
            status: ExhumationStatus::Pending,
            created_at: Utc::now(),
            origin,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExhumationError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("request store unavailable: {0}")]
    Unavailable(String),
    #[error("request {0} not found")]
    NotFound(String),
    #[error("request {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: ExhumationStatus,
        to: ExhumationStatus,
    },
    #[error("failed to access request file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse request file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Move a request along its review workflow.
pub fn transition(request: &mut ExhumationRequest, to: ExhumationStatus) -> Result<(), ExhumationError> {
    if !request.status.can_transition_to(to) {
        return Err(ExhumationError::InvalidTransition {
            id: request.id.clone(),
            from: request.status,
            to,
        });
    }
    request.status = to;
    Ok(())
}

#[async_trait]
pub trait ExhumationStore: Send + Sync {
    async fn create(&self, request: ExhumationRequest) -> Result<ExhumationRequest, ExhumationError>;

    async fn list(&self) -> Result<Vec<ExhumationRequest>, ExhumationError>;

    async fn set_status(&self, id: &str, to: ExhumationStatus) -> Result<ExhumationRequest, ExhumationError>;
}

/// Requests kept in a JSON file on the local machine.
pub struct LocalRequestStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalRequestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> ExhumationError {
        ExhumationError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_all(&self) -> Result<Vec<ExhumationRequest>, ExhumationError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => Ok(decode_requests_json(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn write_all(&self, requests: &[ExhumationRequest]) -> Result<(), ExhumationError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let encoded = encode_requests_json(requests)?;
        fs::write(&self.path, encoded).map_err(|err| self.io_error(err))
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ExhumationStore for LocalRequestStore {
    async fn create(&self, request: ExhumationRequest) -> Result<ExhumationRequest, ExhumationError> {
        let _guard = self.guard();
        let mut requests = self.read_all()?;
        requests.retain(|existing| existing.id != request.id);
        requests.push(request.clone());
        self.write_all(&requests)?;
        debug!(
            target: "cemetery::exhumation",
            id = %request.id,
            path = %self.path.display(),
            "local_store.saved"
        );
        Ok(request)
    }

    async fn list(&self) -> Result<Vec<ExhumationRequest>, ExhumationError> {
        let _guard = self.guard();
        self.read_all()
    }

    async fn set_status(&self, id: &str, to: ExhumationStatus) -> Result<ExhumationRequest, ExhumationError> {
        let _guard = self.guard();
        let mut requests = self.read_all()?;
        let request = requests
            .iter_mut()
            .find(|request| request.id == id)
            .ok_or_else(|| ExhumationError::NotFound(id.to_string()))?;
        transition(request, to)?;
        let updated = request.clone();
        self.write_all(&requests)?;
        Ok(updated)
    }
}

/// Where office notifications about new requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeNotice {
    pub recipient: String,
    pub template_id: String,
}

pub struct ExhumationService {
    remote: Arc<dyn ExhumationStore>,
    local: Arc<dyn ExhumationStore>,
    notifier: Option<(Arc<dyn NotificationDispatch>, OfficeNotice)>,
}

impl ExhumationService {
    pub fn new(remote: Arc<dyn ExhumationStore>, local: Arc<dyn ExhumationStore>) -> Self {
        Self {
            remote,
            local,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, dispatcher: Arc<dyn NotificationDispatch>, notice: OfficeNotice) -> Self {
        self.notifier = Some((dispatcher, notice));
        self
    }

    /// Validate and store a request. A failing remote store never loses the
    /// submission: it is kept locally under a `local-` id instead.
    pub async fn submit(&self, draft: ExhumationDraft) -> Result<ExhumationRequest, ExhumationError> {
        draft.validate()?;
        let request = draft.clone().into_request(Uuid::new_v4().to_string(), RequestOrigin::Remote);
        let saved = match self.remote.create(request).await {
            Ok(saved) => {
                info!(
                    target: "cemetery::exhumation",
                    id = %saved.id,
                    plot_id = %saved.plot_id,
                    "exhumation.submitted=remote"
                );
                saved
            }
            Err(err) => {
                warn!(
                    target: "cemetery::exhumation",
                    error = %err,
                    "exhumation.remote_failed"
                );
                let fallback =
                    draft.into_request(format!("local-{}", Uuid::new_v4()), RequestOrigin::LocalFallback);
                let saved = self.local.create(fallback).await?;
                info!(
                    target: "cemetery::exhumation",
                    id = %saved.id,
                    plot_id = %saved.plot_id,
                    "exhumation.submitted=local"
                );
                saved
            }
        };
        self.notify(&saved);
        Ok(saved)
    }

    fn notify(&self, request: &ExhumationRequest) {
        let Some((dispatcher, notice)) = self.notifier.as_ref() else {
            return;
        };
        let notification = Notification::new(notice.recipient.clone(), notice.template_id.clone())
            .with_param("request_id", request.id.clone())
            .with_param("plot_id", request.plot_id.clone())
            .with_param("requester_name", request.requester_name.clone())
            .with_param("requester_email", request.requester_email.clone())
            .with_param("reason", request.reason.clone())
            .with_param("submitted_at", request.created_at.to_rfc3339());
        dispatch_detached(Arc::clone(dispatcher), notification);
    }

    /// Move a request to a new status in whichever store holds it.
    pub async fn review(&self, id: &str, to: ExhumationStatus) -> Result<ExhumationRequest, ExhumationError> {
        let store = if id.starts_with("local-") {
            &self.local
        } else {
            &self.remote
        };
        let updated = store.set_status(id, to).await?;
        info!(
            target: "cemetery::exhumation",
            id,
            status = %updated.status,
            "exhumation.reviewed"
        );
        Ok(updated)
    }

    /// Requests from both stores, newest first. An unreachable remote store
    /// only hides its own requests.
    pub async fn list(&self) -> Result<Vec<ExhumationRequest>, ExhumationError> {
        let mut requests = match self.remote.list().await {
            Ok(requests) => requests,
            Err(err) => {
                warn!(target: "cemetery::exhumation", error = %err, "exhumation.remote_list_failed");
                Vec::new()
            }
        };
        requests.extend(self.local.list().await?);
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }
}
