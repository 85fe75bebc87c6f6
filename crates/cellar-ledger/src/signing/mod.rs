use std::fmt::{Debug, Display, Formatter};

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use cellar_common::enum_dispatch;
use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::instrument;

mod custodial;
pub use custodial::{CustodialKey, CustodialSigner};

mod interactive;
pub use interactive::{ChannelWallet, InteractiveSigner, PendingApproval, ProvidedSignature, SignatureRequest, Wallet, WalletResponse};

use crate::crypto::{ed25519_address, signing_message, ED25519_FLAG};
use crate::transaction::TransactionData;
use crate::types::{Address, Digest};
use crate::Error;

const SERIALIZED_SIGNATURE_LENGTH: usize = 1 + SIGNATURE_LENGTH + PUBLIC_KEY_LENGTH;

/// Serialized ed25519 signature: scheme flag, signature and public key. Rendered in base64.
#[derive(Clone, PartialEq, Eq)]
pub struct UserSignature(Vec<u8>);

impl UserSignature {
    pub fn from_parts(signature: &[u8; SIGNATURE_LENGTH], public_key: &[u8; PUBLIC_KEY_LENGTH]) -> Self {
        let mut bytes = Vec::with_capacity(SERIALIZED_SIGNATURE_LENGTH);
        bytes.push(ED25519_FLAG);
        bytes.extend_from_slice(signature);
        bytes.extend_from_slice(public_key);

        Self(bytes)
    }

    pub fn from_base64(s: &str) -> Result<Self, Error> {
        let bytes = BASE64_STANDARD
            .decode(s)
            .map_err(|_| Error::InvalidRequest("signature is not valid base64".to_string()))?;

        if bytes.len() != SERIALIZED_SIGNATURE_LENGTH || bytes[0] != ED25519_FLAG {
            return Err(Error::InvalidRequest("signature is not a serialized ed25519 signature".to_string()));
        }

        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.0)
    }

    fn signature(&self) -> Signature {
        let mut bytes = [0; SIGNATURE_LENGTH];
        bytes.copy_from_slice(&self.0[1..1 + SIGNATURE_LENGTH]);
        Signature::from_bytes(&bytes)
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let mut bytes = [0; PUBLIC_KEY_LENGTH];
        bytes.copy_from_slice(&self.0[1 + SIGNATURE_LENGTH..]);
        bytes
    }

    /// Address of the account that produced the signature
    pub fn address(&self) -> Address {
        ed25519_address(&self.public_key())
    }

    /// Checks the signature was produced over `transaction_bytes`
    pub fn verify(&self, transaction_bytes: &[u8]) -> Result<(), Error> {
        let key = VerifyingKey::from_bytes(&self.public_key()).map_err(|_| Error::SigningRejected("invalid public key".to_string()))?;

        key.verify(&signing_message(transaction_bytes), &self.signature())
            .map_err(|_| Error::SigningRejected("signature does not match the transaction".to_string()))
    }
}

impl Display for UserSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Debug for UserSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserSignature({})", self.address())
    }
}

impl Serialize for UserSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for UserSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_base64(&value).map_err(D::Error::custom)
    }
}

/// Who signs on behalf of the transaction sender
#[derive(Clone)]
pub enum Signer {
    /// The user, through their wallet
    Interactive(InteractiveSigner),

    /// A key held by the service
    Custodial(std::sync::Arc<CustodialSigner>),
}

impl Signer {
    pub fn address(&self) -> Address {
        enum_dispatch!(self {
            Self::Interactive(x) => x.address(),
            Self::Custodial(x) => x.address()
        })
    }
}

impl Debug for Signer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interactive(x) => write!(f, "Interactive({})", x.address()),
            Self::Custodial(x) => write!(f, "Custodial({})", x.address()),
        }
    }
}

/// Obtain the sender's signature over the serialized `transaction_bytes`. The transaction
/// must be complete and sent by the signer's account.
#[instrument(name = "sign", skip_all, fields(signer = %signer.address()))]
pub async fn sign(transaction_bytes: &[u8], signer: &Signer) -> Result<UserSignature, Error> {
    let transaction = TransactionData::from_bytes(transaction_bytes)?;
    if transaction.sender() != signer.address() {
        return Err(Error::InvalidRequest(format!(
            "transaction is sent by {} but signer is {}",
            transaction.sender(),
            signer.address()
        )));
    }

    match signer {
        Signer::Interactive(signer) => signer.sign(transaction_bytes).await,
        Signer::Custodial(signer) => Ok(signer.sign(transaction_bytes)),
    }
}

/// A complete transaction along with every signature it requires. Consumed on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    transaction: TransactionData,
    transaction_bytes: String,
    digest: Digest,
    signatures: Vec<String>,
}

impl SignedTransaction {
    /// `signatures` are serialized signatures in base64, the sender's first
    pub fn from_base64(transaction_bytes: &str, signatures: Vec<String>) -> Result<Self, Error> {
        if signatures.is_empty() {
            return Err(Error::InvalidRequest("transaction is not signed".to_string()));
        }

        let transaction = TransactionData::from_base64(transaction_bytes)?;

        Ok(Self {
            digest: transaction.digest()?,
            transaction,
            transaction_bytes: transaction_bytes.to_string(),
            signatures,
        })
    }

    pub fn new(transaction: &TransactionData, signatures: Vec<String>) -> Result<Self, Error> {
        Self::from_base64(&transaction.to_base64()?, signatures)
    }

    pub fn transaction(&self) -> &TransactionData {
        &self.transaction
    }

    pub fn transaction_bytes(&self) -> &str {
        &self.transaction_bytes
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::signing::{sign, CustodialKey, CustodialSigner, SignedTransaction, Signer, UserSignature};
    use crate::transaction::wire::{GasData, ProgrammableTransaction};
    use crate::transaction::{TransactionData, TransactionKind};
    use crate::types::Address;
    use crate::Error;

    fn custodial() -> Arc<CustodialSigner> {
        Arc::new(CustodialSigner::from_key(&CustodialKey::new(hex::encode([9u8; 32]))).unwrap())
    }

    fn a_transaction(sender: Address) -> TransactionData {
        TransactionData::new(
            TransactionKind::ProgrammableTransaction(ProgrammableTransaction { inputs: vec![], commands: vec![] }),
            sender,
            GasData {
                payment: vec![],
                owner: sender,
                price: 1_000,
                budget: 10_000_000,
            },
        )
    }

    mod sign {
        use super::*;

        #[tokio::test]
        async fn custodial_signature_matches_the_transaction() {
            // Given
            let signer = custodial();
            let bytes = a_transaction(signer.address()).to_bytes().unwrap();

            // When
            let signature = sign(&bytes, &Signer::Custodial(signer.clone())).await.unwrap();

            // Then
            assert!(signature.verify(&bytes).is_ok());
            assert_eq!(signature.address(), signer.address());
        }

        #[tokio::test]
        async fn sender_must_be_the_signer() {
            let bytes = a_transaction(Address::from_u8(1)).to_bytes().unwrap();

            let result = sign(&bytes, &Signer::Custodial(custodial())).await;

            assert!(matches!(result, Err(Error::InvalidRequest(_))));
        }

        #[tokio::test]
        async fn kind_only_bytes_cannot_be_signed() {
            let kind = a_transaction(Address::from_u8(1)).kind().to_bytes().unwrap();

            assert!(matches!(sign(&kind, &Signer::Custodial(custodial())).await, Err(Error::Encoding(_))));
        }
    }

    mod user_signature {
        use super::*;

        #[test]
        fn base64_form_is_checked() {
            assert!(UserSignature::from_base64("AAAA").is_err());
            assert!(UserSignature::from_base64("%%%").is_err());
        }

        #[test]
        fn serializes_as_base64() {
            let signer = custodial();
            let signature = signer.sign(b"x");

            let json = serde_json::to_value(&signature).unwrap();
            let decoded: UserSignature = serde_json::from_value(json).unwrap();

            assert_eq!(decoded, signature);
            assert_eq!(decoded.to_base64().len(), 132);
        }
    }

    mod signed_transaction {
        use super::*;

        #[test]
        fn digest_is_computed_from_the_bytes() {
            let transaction = a_transaction(Address::from_u8(1));

            let signed = SignedTransaction::new(&transaction, vec!["sig".to_string()]).unwrap();

            assert_eq!(signed.digest(), transaction.digest().unwrap());
            assert_eq!(signed.transaction().sender(), Address::from_u8(1));
        }

        #[test]
        fn unsigned_transaction_is_rejected() {
            let transaction = a_transaction(Address::from_u8(1));

            assert!(matches!(SignedTransaction::new(&transaction, vec![]), Err(Error::InvalidRequest(_))));
        }
    }
}
