//! The pause point taken when the server defect fires.

use std::future::Future;

use serde::Serialize;

/// What the operator needs to inspect the failed server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefectNotice {
    pub container_name: String,
    /// The server error text.
    pub message: String,
    /// Command that shows the server-side stack trace.
    pub logs_hint: String,
}

impl DefectNotice {
    #[must_use]
    pub fn new(container_name: &str, message: impl Into<String>) -> Self {
        Self {
            container_name: container_name.to_string(),
            message: message.into(),
            logs_hint: format!("docker logs {container_name}"),
        }
    }
}

/// Called once when the resumed scan hits the defect, before teardown
/// removes the container.
pub trait DefectAcknowledger: Send + Sync {
    fn acknowledge(&self, notice: &DefectNotice) -> impl Future<Output = ()> + Send;
}

/// Logs the notice and returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPause;

impl DefectAcknowledger for NoPause {
    async fn acknowledge(&self, notice: &DefectNotice) {
        tracing::warn!(
            container = %notice.container_name,
            hint = %notice.logs_hint,
            "Defect reproduced, continuing to teardown without pausing"
        );
    }
}
