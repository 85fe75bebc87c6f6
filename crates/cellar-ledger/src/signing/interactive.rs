use std::sync::Arc;

use async_trait::async_trait;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::crypto::transaction_digest;
use crate::signing::UserSignature;
use crate::types::{Address, Digest};
use crate::Error;

/// Request shown to the holder of a wallet
#[derive(Debug, Clone)]
pub struct SignatureRequest {
    pub address: Address,
    pub transaction_bytes: Vec<u8>,
    pub digest: Digest,
}

impl SignatureRequest {
    pub fn transaction_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.transaction_bytes)
    }
}

#[derive(Debug, Clone)]
pub enum WalletResponse {
    Approved(UserSignature),
    Declined(String),
}

/// A wallet controlled by the end user. Requesting a signature may wait for as long as the
/// user takes to answer.
#[async_trait]
pub trait Wallet: 'static + Send + Sync {
    fn address(&self) -> Address;

    async fn request_signature(&self, request: SignatureRequest) -> Result<WalletResponse, Error>;
}

#[derive(Clone)]
pub struct InteractiveSigner {
    wallet: Arc<dyn Wallet>,
}

impl InteractiveSigner {
    pub fn new<W: Wallet>(wallet: W) -> Self {
        Self { wallet: Arc::new(wallet) }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub async fn sign(&self, transaction_bytes: &[u8]) -> Result<UserSignature, Error> {
        let request = SignatureRequest {
            address: self.address(),
            transaction_bytes: transaction_bytes.to_vec(),
            digest: transaction_digest(transaction_bytes),
        };

        debug!(digest = %request.digest, "waiting for wallet approval");

        let signature = match self.wallet.request_signature(request).await? {
            WalletResponse::Approved(signature) => signature,
            WalletResponse::Declined(reason) => return Err(Error::SigningRejected(reason)),
        };

        signature.verify(transaction_bytes)?;
        if signature.address() != self.address() {
            return Err(Error::SigningRejected(format!("signature was not produced by {}", self.address())));
        }

        Ok(signature)
    }
}

/// A signature request waiting for the wallet's answer
#[derive(Debug)]
pub struct PendingApproval {
    pub request: SignatureRequest,
    responder: oneshot::Sender<WalletResponse>,
}

impl PendingApproval {
    pub fn approve(self, signature: UserSignature) {
        let _ = self.responder.send(WalletResponse::Approved(signature));
    }

    pub fn decline(self, reason: impl Into<String>) {
        let _ = self.responder.send(WalletResponse::Declined(reason.into()));
    }
}

/// Wallet reached through a channel. Requests are delivered to the receiver returned by
/// [`ChannelWallet::new`], typically forwarded to a user interface.
pub struct ChannelWallet {
    address: Address,
    requests: mpsc::Sender<PendingApproval>,
}

impl ChannelWallet {
    pub fn new(address: Address, capacity: usize) -> (Self, mpsc::Receiver<PendingApproval>) {
        let (requests, receiver) = mpsc::channel(capacity);

        (Self { address, requests }, receiver)
    }
}

#[async_trait]
impl Wallet for ChannelWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn request_signature(&self, request: SignatureRequest) -> Result<WalletResponse, Error> {
        let (responder, response) = oneshot::channel();

        self.requests
            .send(PendingApproval { request, responder })
            .await
            .map_err(|_| Error::SigningRejected("wallet is not connected".to_string()))?;

        response
            .await
            .map_err(|_| Error::SigningRejected("wallet closed without answering".to_string()))
    }
}

/// Signature the user produced out-of-band, e.g. in a browser wallet, and submitted along with
/// the transaction
pub struct ProvidedSignature {
    address: Address,
    signature: UserSignature,
}

impl ProvidedSignature {
    pub fn new(address: Address, signature: UserSignature) -> Self {
        Self { address, signature }
    }
}

#[async_trait]
impl Wallet for ProvidedSignature {
    fn address(&self) -> Address {
        self.address
    }

    async fn request_signature(&self, request: SignatureRequest) -> Result<WalletResponse, Error> {
        Ok(match self.signature.verify(&request.transaction_bytes) {
            Ok(()) => WalletResponse::Approved(self.signature.clone()),
            Err(_) => WalletResponse::Declined("provided signature does not sign this transaction".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ed25519_dalek::{Signer as _, SigningKey};

    use crate::crypto::{ed25519_address, signing_message};
    use crate::signing::{ChannelWallet, InteractiveSigner, ProvidedSignature, UserSignature};
    use crate::Error;

    fn user_key() -> SigningKey {
        SigningKey::from_bytes(&[3; 32])
    }

    fn user_signature(bytes: &[u8]) -> UserSignature {
        let key = user_key();
        UserSignature::from_parts(&key.sign(&signing_message(bytes)).to_bytes(), key.verifying_key().as_bytes())
    }

    mod channel_wallet {
        use super::*;

        #[tokio::test]
        async fn approval_resumes_the_signer() {
            // Given
            let address = ed25519_address(user_key().verifying_key().as_bytes());
            let (wallet, mut requests) = ChannelWallet::new(address, 1);
            let signer = InteractiveSigner::new(wallet);

            tokio::spawn(async move {
                let pending = requests.recv().await.unwrap();
                let signature = user_signature(&pending.request.transaction_bytes);
                pending.approve(signature);
            });

            // When
            let signature = signer.sign(b"purchase").await.unwrap();

            // Then
            assert_eq!(signature.address(), address);
        }

        #[tokio::test]
        async fn decline_is_a_signing_rejection() {
            // Given
            let (wallet, mut requests) = ChannelWallet::new(ed25519_address(user_key().verifying_key().as_bytes()), 1);
            let signer = InteractiveSigner::new(wallet);

            tokio::spawn(async move {
                requests.recv().await.unwrap().decline("user closed the popup");
            });

            // When
            let result = signer.sign(b"purchase").await;

            // Then
            match result {
                Err(Error::SigningRejected(reason)) => assert_eq!(reason, "user closed the popup"),
                other => panic!("unexpected result {:?}", other),
            }
        }

        #[tokio::test]
        async fn disconnected_wallet_is_a_signing_rejection() {
            let (wallet, requests) = ChannelWallet::new(ed25519_address(user_key().verifying_key().as_bytes()), 1);
            drop(requests);

            let result = InteractiveSigner::new(wallet).sign(b"purchase").await;

            assert!(matches!(result, Err(Error::SigningRejected(_))));
        }

        #[tokio::test]
        async fn signer_waits_until_the_user_answers() {
            let (wallet, mut requests) = ChannelWallet::new(ed25519_address(user_key().verifying_key().as_bytes()), 1);
            let signer = InteractiveSigner::new(wallet);

            let pending = tokio::spawn(async move { signer.sign(b"purchase").await });
            let request = requests.recv().await.unwrap();

            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(!pending.is_finished());

            request.approve(user_signature(b"purchase"));
            assert!(pending.await.unwrap().is_ok());
        }

        #[tokio::test]
        async fn signature_of_another_key_is_rejected() {
            // Given
            let (wallet, mut requests) = ChannelWallet::new(crate::types::Address::from_u8(0x99), 1);
            let signer = InteractiveSigner::new(wallet);

            tokio::spawn(async move {
                let pending = requests.recv().await.unwrap();
                let signature = user_signature(&pending.request.transaction_bytes);
                pending.approve(signature);
            });

            // When
            let result = signer.sign(b"purchase").await;

            // Then
            assert!(matches!(result, Err(Error::SigningRejected(_))));
        }
    }

    mod provided_signature {
        use super::*;

        #[tokio::test]
        async fn matching_signature_is_approved() {
            let address = ed25519_address(user_key().verifying_key().as_bytes());
            let signer = InteractiveSigner::new(ProvidedSignature::new(address, user_signature(b"purchase")));

            assert!(signer.sign(b"purchase").await.is_ok());
        }

        #[tokio::test]
        async fn signature_over_other_bytes_is_declined() {
            let address = ed25519_address(user_key().verifying_key().as_bytes());
            let signer = InteractiveSigner::new(ProvidedSignature::new(address, user_signature(b"purchase")));

            assert!(matches!(signer.sign(b"another purchase").await, Err(Error::SigningRejected(_))));
        }
    }
}
