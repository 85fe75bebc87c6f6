use std::fmt::{Debug, Formatter};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cellar_ledger::signing::{self, SignedTransaction, Signer};
use cellar_ledger::transaction::{ExecutionResult, TransactionBuilder};
use cellar_sponsoring::SponsoredTransaction;
use tracing::{debug, instrument};

use crate::sink::{ExecutionOutcome, Flow};
use crate::{Client, Error};

/// Position of a sponsored transaction in its lifecycle
pub enum PipelineState {
    Drafting(TransactionBuilder),
    Sponsoring { transaction_kind_bytes: Vec<u8> },
    Signing(SponsoredTransaction),
    Submitting(SignedTransaction),
    Confirmed(ExecutionResult),
    Failed(Error),
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Drafting(_) => "drafting",
            Self::Sponsoring { .. } => "sponsoring",
            Self::Signing(_) => "signing",
            Self::Submitting(_) => "submitting",
            Self::Confirmed(_) => "confirmed",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed(_) | Self::Failed(_))
    }
}

impl Debug for PipelineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(e) => write!(f, "Failed({})", e),
            Self::Confirmed(result) => write!(f, "Confirmed({})", result.digest),
            state => f.write_str(state.name()),
        }
    }
}

/// A single sponsored transaction attempt: Drafting, Sponsoring, Signing, Submitting, then
/// Confirmed or Failed. The state is owned by the attempt and never shared.
pub struct Pipeline {
    client: Client,
    signer: Signer,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(client: Client, signer: Signer, state: PipelineState) -> Self {
        Self { client, signer, state }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Advances by one state. Terminal states are left unchanged.
    pub async fn step(&mut self) -> &PipelineState {
        let state = std::mem::replace(&mut self.state, PipelineState::Drafting(TransactionBuilder::new()));
        let from = state.name();

        self.state = match state {
            PipelineState::Drafting(mut builder) => Self::transition(self.draft(&mut builder), |transaction_kind_bytes| PipelineState::Sponsoring {
                transaction_kind_bytes,
            }),
            PipelineState::Sponsoring { transaction_kind_bytes } => Self::transition(self.sponsor(&transaction_kind_bytes).await, PipelineState::Signing),
            PipelineState::Signing(sponsored) => Self::transition(self.sign(&sponsored).await, PipelineState::Submitting),
            PipelineState::Submitting(transaction) => Self::transition(self.submit(transaction).await, PipelineState::Confirmed),
            terminal => terminal,
        };

        debug!(from, to = self.state.name(), "pipeline step");
        &self.state
    }

    /// Steps until a terminal state and reports the outcome
    #[instrument(name = "pipeline", skip_all, fields(sender = %self.signer.address()))]
    pub async fn run(mut self) -> Result<ExecutionResult, Error> {
        let result = loop {
            match std::mem::replace(&mut self.state, PipelineState::Drafting(TransactionBuilder::new())) {
                PipelineState::Confirmed(result) => break Ok(result),
                PipelineState::Failed(e) => break Err(e),
                state => {
                    self.state = state;
                    self.step().await;
                },
            }
        };

        self.client.sink().record(ExecutionOutcome::new(Flow::Sponsored, &result, None)).await;
        result
    }

    fn transition<T>(result: Result<T, Error>, next: impl FnOnce(T) -> PipelineState) -> PipelineState {
        match result {
            Ok(value) => next(value),
            Err(e) => PipelineState::Failed(e),
        }
    }

    /// Kind-only bytes of the drafted operations
    pub fn draft(&self, builder: &mut TransactionBuilder) -> Result<Vec<u8>, Error> {
        let kind = builder.build_kind_only()?;

        Ok(kind.to_bytes()?)
    }

    /// Sponsorship for the signer's account, retried on relay outages
    pub async fn sponsor(&self, transaction_kind_bytes: &[u8]) -> Result<SponsoredTransaction, Error> {
        self.client.sponsor(transaction_kind_bytes, &self.signer.address().to_hex()).await
    }

    /// Sender signature over the sponsored bytes, followed by the sponsor's own signature
    pub async fn sign(&self, sponsored: &SponsoredTransaction) -> Result<SignedTransaction, Error> {
        let bytes = STANDARD
            .decode(&sponsored.bytes)
            .map_err(|_| Error::InvalidRequest("sponsored bytes are not base64".to_string()))?;

        let signature = signing::sign(&bytes, &self.signer).await?;

        let mut signatures = vec![signature.to_base64()];
        signatures.extend(sponsored.sponsor_signature.clone());

        let transaction = SignedTransaction::from_base64(&sponsored.bytes, signatures)?;
        if transaction.digest() != sponsored.digest {
            return Err(Error::InvalidRequest(format!(
                "transaction digest {} does not match sponsorship {}",
                transaction.digest(),
                sponsored.digest
            )));
        }

        Ok(transaction)
    }

    pub async fn submit(&self, transaction: SignedTransaction) -> Result<ExecutionResult, Error> {
        self.client.submitter().submit(transaction).await
    }
}
