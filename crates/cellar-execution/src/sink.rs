use async_trait::async_trait;
use cellar_ledger::transaction::ExecutionResult;
use cellar_ledger::types::{Digest, ObjectId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Sponsored,
    CustodialMint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Confirmed,
    Reverted,
    Unconfirmed,
    Failed,
}

/// Record of one attempt, handed to an [`OutcomeSink`] once the attempt is over
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub id: Uuid,
    pub flow: Flow,
    pub recorded_at: DateTime<Utc>,
    pub digest: Option<Digest>,
    pub status: OutcomeStatus,
    pub extracted_id: Option<ObjectId>,
    pub error: Option<&'static str>,
    pub detail: Option<String>,
}

impl ExecutionOutcome {
    pub fn new(flow: Flow, result: &Result<ExecutionResult, Error>, extracted_id: Option<ObjectId>) -> Self {
        let (digest, status, error, detail) = match result {
            Ok(result) if result.is_success() => (Some(result.digest), OutcomeStatus::Confirmed, None, None),
            Ok(result) => (Some(result.digest), OutcomeStatus::Reverted, None, result.error().map(|x| x.to_string())),
            Err(e @ Error::ConfirmationTimeout { digest }) => (Some(*digest), OutcomeStatus::Unconfirmed, Some(e.kind()), None),
            Err(e) => (None, OutcomeStatus::Failed, Some(e.kind()), Some(e.user_message())),
        };

        Self {
            id: Uuid::new_v4(),
            flow,
            recorded_at: Utc::now(),
            digest,
            status,
            extracted_id,
            error,
            detail,
        }
    }
}

/// Destination of attempt outcomes, such as a transaction log table
#[async_trait]
pub trait OutcomeSink: 'static + Send + Sync {
    async fn record(&self, outcome: ExecutionOutcome);
}

/// Sink writing outcomes to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl OutcomeSink for TracingSink {
    async fn record(&self, outcome: ExecutionOutcome) {
        let digest = outcome.digest.map(|x| x.to_string()).unwrap_or_default();
        let extracted_id = outcome.extracted_id.map(|x| x.to_string()).unwrap_or_default();

        match outcome.status {
            OutcomeStatus::Confirmed => info!(
                id = %outcome.id,
                flow = ?outcome.flow,
                digest = %digest,
                extracted_id = %extracted_id,
                recorded_at = %outcome.recorded_at,
                "transaction confirmed"
            ),
            status => warn!(
                id = %outcome.id,
                flow = ?outcome.flow,
                status = ?status,
                digest = %digest,
                error = outcome.error.unwrap_or_default(),
                detail = outcome.detail.as_deref().unwrap_or_default(),
                recorded_at = %outcome.recorded_at,
                "transaction not confirmed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use cellar_ledger::transaction::{ExecutionResult, ExecutionStatus, GasUsed};
    use cellar_ledger::types::Digest;

    use crate::sink::{ExecutionOutcome, Flow, OutcomeSink, OutcomeStatus, TracingSink};
    use crate::Error;

    fn result(status: ExecutionStatus) -> ExecutionResult {
        ExecutionResult {
            digest: Digest::new([4; 32]),
            status,
            created: vec![],
            mutated: vec![],
            deleted: vec![],
            events: vec![],
            gas_used: GasUsed::default(),
            checkpoint: Some(1),
        }
    }

    #[test]
    fn reverted_execution_keeps_its_digest_and_reason() {
        let outcome = ExecutionOutcome::new(
            Flow::Sponsored,
            &Ok(result(ExecutionStatus::Failure {
                error: "MoveAbort".to_string(),
            })),
            None,
        );

        assert_eq!(outcome.status, OutcomeStatus::Reverted);
        assert_eq!(outcome.digest, Some(Digest::new([4; 32])));
        assert_eq!(outcome.detail.as_deref(), Some("MoveAbort"));
    }

    #[test]
    fn timeout_is_unconfirmed_rather_than_failed() {
        let outcome = ExecutionOutcome::new(Flow::CustodialMint, &Err(Error::ConfirmationTimeout { digest: Digest::new([4; 32]) }), None);

        assert_eq!(outcome.status, OutcomeStatus::Unconfirmed);
        assert_eq!(outcome.error, Some("confirmation_timeout"));
    }

    #[test]
    fn configuration_detail_is_not_recorded() {
        let outcome = ExecutionOutcome::new(Flow::CustodialMint, &Err(Error::Configuration("key deadbeef is invalid".to_string())), None);

        assert!(!serde_json::to_string(&outcome).unwrap().contains("deadbeef"));
    }

    #[tokio::test]
    async fn tracing_sink_accepts_every_status() {
        TracingSink.record(ExecutionOutcome::new(Flow::Sponsored, &Ok(result(ExecutionStatus::Success)), None)).await;
        TracingSink
            .record(ExecutionOutcome::new(Flow::Sponsored, &Err(Error::SigningRejected("declined".to_string())), None))
            .await;
    }
}
