use cellar_ledger::signing::UserSignature;
use cellar_ledger::transaction::{ExecutionResult, ExecutionStatus};
use cellar_ledger::types::{Digest, ObjectId};
use cellar_sponsoring::SponsoredTransaction;
use serde::{Deserialize, Serialize};

use crate::endpoint::RequestContext;
use crate::Error;

/// A sponsored transaction along with the signature the user's wallet produced over it
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExecuteSponsoredRequest {
    pub bytes: String,
    pub digest: Digest,
    pub user_signature: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor_signature: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecuteSponsoredResponse {
    pub digest: Digest,

    /// `success`, or `failure` along with the abort reason
    #[serde(flatten)]
    pub status: ExecutionStatus,

    pub created: Vec<ObjectId>,
    pub checkpoint: Option<u64>,
}

impl From<ExecutionResult> for ExecuteSponsoredResponse {
    fn from(value: ExecutionResult) -> Self {
        Self {
            digest: value.digest,
            created: value.created.iter().map(|x| x.id()).collect(),
            checkpoint: value.checkpoint,
            status: value.status,
        }
    }
}

pub async fn execute_sponsored_endpoint(ctx: &RequestContext<'_>, request: ExecuteSponsoredRequest) -> Result<ExecuteSponsoredResponse, Error> {
    let signature = UserSignature::from_base64(request.user_signature.trim()).map_err(|e| Error::InvalidRequest(format!("user_signature: {}", e)))?;

    let sponsored = SponsoredTransaction {
        bytes: request.bytes,
        digest: request.digest,
        sponsor_signature: request.sponsor_signature,
    };

    let result = ctx.execution.execute_sponsored(sponsored, signature).await?;

    Ok(result.into())
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use cellar_execution::testing::user_signer;
    use cellar_execution::Error as ExecutionError;
    use cellar_ledger::signing::sign;
    use cellar_ledger::testing::{InMemoryLedger, MockLedger};
    use cellar_ledger::transaction::ExecutionStatus;

    use crate::endpoint::execute::{execute_sponsored_endpoint, ExecuteSponsoredRequest, ExecuteSponsoredResponse};
    use crate::endpoint::sponsor::{sponsor_transaction_endpoint, SponsorTransactionRequest};
    use crate::endpoint::RequestContext;
    use crate::testing::{purchase_kind, user_address, TestEnvironment};
    use crate::Error;

    async fn signed_request(test: &TestEnvironment) -> ExecuteSponsoredRequest {
        let ctx = RequestContext::empty(test.context());
        let sponsored = sponsor_transaction_endpoint(
            &ctx,
            SponsorTransactionRequest {
                transaction_kind_bytes: STANDARD.encode(purchase_kind()),
                sender: user_address().to_hex(),
                network: None,
            },
        )
        .await
        .unwrap();

        let signature = sign(&STANDARD.decode(&sponsored.bytes).unwrap(), &user_signer()).await.unwrap();

        ExecuteSponsoredRequest {
            bytes: sponsored.bytes,
            digest: sponsored.digest,
            user_signature: signature.to_base64(),
            sponsor_signature: sponsored.sponsor_signature,
        }
    }

    #[tokio::test]
    async fn signed_sponsored_transaction_is_confirmed() {
        // Given
        let test = TestEnvironment::new().await;
        let request = signed_request(&test).await;
        let digest = request.digest;

        // When
        let response = execute_sponsored_endpoint(&RequestContext::empty(test.context()), request).await.unwrap();

        // Then
        assert_eq!(response.digest, digest);
        assert_eq!(response.status, ExecutionStatus::Success);
        assert!(response.checkpoint.is_some());
        assert_eq!(test.ledger.submissions().len(), 1);
    }

    #[tokio::test]
    async fn tampered_digest_is_rejected_before_submission() {
        let test = TestEnvironment::new().await;
        let mut request = signed_request(&test).await;
        request.digest = Default::default();

        let result = execute_sponsored_endpoint(&RequestContext::empty(test.context()), request).await;

        assert!(matches!(result, Err(Error::Execution(ExecutionError::InvalidRequest(_)))));
        assert!(test.ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn malformed_signature_is_an_invalid_request() {
        let test = TestEnvironment::new().await;
        let mut request = signed_request(&test).await;
        request.user_signature = "AAAA".to_string();

        let result = execute_sponsored_endpoint(&RequestContext::empty(test.context()), request).await;

        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn pending_transaction_is_reported_as_unconfirmed() {
        // Given
        let test = TestEnvironment::with_ledger(InMemoryLedger::new().with_finality_after(None)).await;
        let request = signed_request(&test).await;

        // When
        let result = execute_sponsored_endpoint(&RequestContext::empty(test.context()), request).await;

        // Then
        assert!(matches!(result, Err(Error::Execution(ExecutionError::ConfirmationTimeout { .. }))));
    }

    #[test]
    fn reverted_status_is_flattened() {
        let response = ExecuteSponsoredResponse {
            digest: Default::default(),
            status: ExecutionStatus::Failure {
                error: "MoveAbort(shop::purchase, 2)".to_string(),
            },
            created: vec![],
            checkpoint: Some(7),
        };

        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "failure");
        assert_eq!(json["error"], "MoveAbort(shop::purchase, 2)");
    }
}
