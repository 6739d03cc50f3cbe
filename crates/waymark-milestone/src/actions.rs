//! Callback interfaces the evaluator drives when a milestone fires.
//!
//! All three report failure as data. A callback that is not configured is
//! recorded as a failure in the history entry rather than raised.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use waymark_core::milestone::{SnapshotForm, SnapshotOperation};
use waymark_core::template::{
    render_template, sanitize_ref_name, TemplateVars, DEFAULT_BRANCH_TEMPLATE,
    DEFAULT_MESSAGE_TEMPLATE, DEFAULT_TAG_TEMPLATE,
};

/// Outcome reported by a git snapshot executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitSnapshotResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GitSnapshotResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Outcome of a property change or stub mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Fully rendered parameters for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRequest {
    pub form: SnapshotForm,
    pub document_path: String,
    pub variables: TemplateVars,
    pub commit_message: String,
    pub branch_name: String,
    pub tag_name: String,
}

impl SnapshotRequest {
    /// Render the form's templates (or the defaults) with `variables`.
    pub fn render(form: &SnapshotForm, document_path: &str, variables: &TemplateVars) -> Self {
        let message = form
            .message_template
            .as_deref()
            .unwrap_or(DEFAULT_MESSAGE_TEMPLATE);
        let branch = form.branch_template.as_deref().unwrap_or(DEFAULT_BRANCH_TEMPLATE);
        let tag = form.tag_template.as_deref().unwrap_or(DEFAULT_TAG_TEMPLATE);
        Self {
            form: form.clone(),
            document_path: document_path.to_string(),
            variables: variables.clone(),
            commit_message: render_template(message, variables),
            branch_name: sanitize_ref_name(&render_template(branch, variables)),
            tag_name: sanitize_ref_name(&render_template(tag, variables)),
        }
    }

    pub fn operation(&self) -> SnapshotOperation {
        self.form.operation
    }
}

/// Performs the commit/branch/tag for a fired milestone.
#[async_trait::async_trait]
pub trait GitSnapshotExecutor: Send + Sync {
    async fn execute_snapshot(&self, request: &SnapshotRequest) -> GitSnapshotResult;
}

/// Writes a single document property.
#[async_trait::async_trait]
pub trait PropertyChangeApplier: Send + Sync {
    async fn apply_property_change(
        &self,
        document_path: &str,
        property: &str,
        value: &Value,
    ) -> ActionResult;
}

/// Applies an opaque stub mutation to a document.
#[async_trait::async_trait]
pub trait StubMutationApplier: Send + Sync {
    async fn apply_stub_mutation(
        &self,
        document_path: &str,
        filter: &Value,
        mutation: &Value,
    ) -> ActionResult;
}

/// The set of callbacks an evaluator dispatches to. Each is optional.
#[derive(Clone, Default)]
pub struct MilestoneCallbacks {
    pub git_snapshot: Option<Arc<dyn GitSnapshotExecutor>>,
    pub property_change: Option<Arc<dyn PropertyChangeApplier>>,
    pub stub_mutation: Option<Arc<dyn StubMutationApplier>>,
}

impl MilestoneCallbacks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_git_snapshot(mut self, executor: Arc<dyn GitSnapshotExecutor>) -> Self {
        self.git_snapshot = Some(executor);
        self
    }

    pub fn with_property_change(mut self, applier: Arc<dyn PropertyChangeApplier>) -> Self {
        self.property_change = Some(applier);
        self
    }

    pub fn with_stub_mutation(mut self, applier: Arc<dyn StubMutationApplier>) -> Self {
        self.stub_mutation = Some(applier);
        self
    }

    /// Route every callback to one implementation.
    pub fn all<T>(actions: Arc<T>) -> Self
    where
        T: GitSnapshotExecutor + PropertyChangeApplier + StubMutationApplier + 'static,
    {
        let git_snapshot: Arc<dyn GitSnapshotExecutor> = actions.clone();
        let property_change: Arc<dyn PropertyChangeApplier> = actions.clone();
        let stub_mutation: Arc<dyn StubMutationApplier> = actions;
        Self {
            git_snapshot: Some(git_snapshot),
            property_change: Some(property_change),
            stub_mutation: Some(stub_mutation),
        }
    }
}

impl std::fmt::Debug for MilestoneCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MilestoneCallbacks")
            .field("git_snapshot", &self.git_snapshot.is_some())
            .field("property_change", &self.property_change.is_some())
            .field("stub_mutation", &self.stub_mutation.is_some())
            .finish()
    }
}

/// A call observed by [`RecordingActions`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Snapshot(SnapshotRequest),
    Property {
        document_path: String,
        property: String,
        value: Value,
    },
    Stub {
        document_path: String,
        filter: Value,
        mutation: Value,
    },
}

/// Collects calls in memory (for testing and dry runs).
#[derive(Default)]
pub struct RecordingActions {
    calls: Mutex<Vec<RecordedCall>>,
    fail_snapshot: Option<String>,
    fail_property: Option<String>,
}

impl RecordingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every snapshot report `error`.
    pub fn failing_snapshot(mut self, error: &str) -> Self {
        self.fail_snapshot = Some(error.to_string());
        self
    }

    /// Make every property change report `error`.
    pub fn failing_property(mut self, error: &str) -> Self {
        self.fail_property = Some(error.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, call: RecordedCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

#[async_trait::async_trait]
impl GitSnapshotExecutor for RecordingActions {
    async fn execute_snapshot(&self, request: &SnapshotRequest) -> GitSnapshotResult {
        self.push(RecordedCall::Snapshot(request.clone()));
        if let Some(err) = &self.fail_snapshot {
            return GitSnapshotResult::failed(err.clone());
        }
        GitSnapshotResult {
            success: true,
            commit_sha: Some("0000000".into()),
            commit_message: Some(request.commit_message.clone()),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl PropertyChangeApplier for RecordingActions {
    async fn apply_property_change(
        &self,
        document_path: &str,
        property: &str,
        value: &Value,
    ) -> ActionResult {
        self.push(RecordedCall::Property {
            document_path: document_path.to_string(),
            property: property.to_string(),
            value: value.clone(),
        });
        match &self.fail_property {
            Some(err) => ActionResult::failed(err.clone()),
            None => ActionResult::ok(),
        }
    }
}

#[async_trait::async_trait]
impl StubMutationApplier for RecordingActions {
    async fn apply_stub_mutation(
        &self,
        document_path: &str,
        filter: &Value,
        mutation: &Value,
    ) -> ActionResult {
        self.push(RecordedCall::Stub {
            document_path: document_path.to_string(),
            filter: filter.clone(),
            mutation: mutation.clone(),
        });
        ActionResult::ok()
    }
}
