//! Statement execution with bounded polling

use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use super::WorkspaceApi;
use super::types::{StatementRequest, StatementResponse};
use crate::error::{DatabricksMcpError, Result};

/// How long and how often to poll an in-progress statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            deadline: Duration::from_secs(300),
        }
    }
}

/// Submit a statement and poll until it reaches a terminal state.
///
/// The terminal response is returned as-is; callers decide whether a
/// FAILED state is an error. When the deadline passes the statement is
/// cancelled (best effort) and a timeout error is returned.
pub async fn run_statement(
    api: &dyn WorkspaceApi,
    request: &StatementRequest,
    policy: PollPolicy,
) -> Result<StatementResponse> {
    let started = Instant::now();
    let mut response = api.execute_statement(request).await?;
    debug!(
        "Statement {} submitted, state {}",
        response.statement_id,
        response.state().as_str()
    );

    while response.state().is_in_progress() {
        if started.elapsed() >= policy.deadline {
            warn!(
                "Statement {} still {} after {:?}, cancelling",
                response.statement_id,
                response.state().as_str(),
                policy.deadline
            );
            if let Err(e) = api.cancel_statement(&response.statement_id).await {
                warn!("Failed to cancel statement {}: {}", response.statement_id, e);
            }
            return Err(DatabricksMcpError::Timeout(format!(
                "statement {} still {} after {}s",
                response.statement_id,
                response.state().as_str(),
                policy.deadline.as_secs()
            )));
        }
        tokio::time::sleep(policy.interval).await;
        response = api.get_statement(&response.statement_id).await?;
    }

    Ok(response)
}
