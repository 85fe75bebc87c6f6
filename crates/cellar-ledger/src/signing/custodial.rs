use std::fmt::{Debug, Formatter};

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use ed25519_dalek::{Signer as _, SigningKey, SECRET_KEY_LENGTH};
use serde::{Deserialize, Deserializer};
use zeroize::Zeroizing;

use crate::crypto::{ed25519_address, signing_message, ED25519_FLAG};
use crate::signing::UserSignature;
use crate::types::Address;
use crate::Error;

/// Secret key of a custodial account, as found in the configuration. Never printed.
#[derive(Clone)]
pub struct CustodialKey(Zeroizing<String>);

impl CustodialKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    fn expose(&self) -> &str {
        self.0.trim()
    }
}

impl Debug for CustodialKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("CustodialKey(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for CustodialKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Signs with a key held by the service. The ed25519 key only exists for the duration of a
/// signature, the secret itself is wiped when the signer is dropped.
pub struct CustodialSigner {
    secret: Zeroizing<[u8; SECRET_KEY_LENGTH]>,
    address: Address,
}

impl Debug for CustodialSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodialSigner")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl CustodialSigner {
    /// Accepts either 32 bytes in hex, with or without `0x`, or the base64 encoding of the
    /// scheme flag followed by the 32 bytes.
    pub fn from_key(key: &CustodialKey) -> Result<Self, Error> {
        let secret = Self::decode(key.expose())?;
        let address = ed25519_address(SigningKey::from_bytes(&secret).verifying_key().as_bytes());

        Ok(Self { secret, address })
    }

    fn decode(value: &str) -> Result<Zeroizing<[u8; SECRET_KEY_LENGTH]>, Error> {
        let mut secret = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);

        let digits = value.strip_prefix("0x").unwrap_or(value);
        if digits.len() == 2 * SECRET_KEY_LENGTH && digits.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode_to_slice(digits, secret.as_mut_slice()).map_err(|_| Error::InvalidKey("malformed hex key".to_string()))?;
            return Ok(secret);
        }

        let decoded = Zeroizing::new(
            BASE64_STANDARD
                .decode(value)
                .map_err(|_| Error::InvalidKey("key is neither hex nor base64".to_string()))?,
        );

        match decoded.split_first() {
            Some((&ED25519_FLAG, bytes)) if bytes.len() == SECRET_KEY_LENGTH => {
                secret.copy_from_slice(bytes);
                Ok(secret)
            },
            Some((&ED25519_FLAG, _)) => Err(Error::InvalidKey(format!("expected {} key bytes", SECRET_KEY_LENGTH))),
            _ => Err(Error::InvalidKey("only ed25519 keys are supported".to_string())),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign(&self, transaction_bytes: &[u8]) -> UserSignature {
        let key = SigningKey::from_bytes(&self.secret);
        let signature = key.sign(&signing_message(transaction_bytes));

        UserSignature::from_parts(&signature.to_bytes(), key.verifying_key().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use base64::prelude::BASE64_STANDARD;
    use base64::Engine;

    use crate::signing::{CustodialKey, CustodialSigner};
    use crate::Error;

    const SECRET: [u8; 32] = [7; 32];

    fn hex_key() -> CustodialKey {
        CustodialKey::new(format!("0x{}", hex::encode(SECRET)))
    }

    #[test]
    fn hex_and_base64_keys_give_the_same_signer() {
        // Given
        let mut flagged = vec![0u8];
        flagged.extend_from_slice(&SECRET);
        let base64 = CustodialKey::new(BASE64_STANDARD.encode(&flagged));

        // When
        let from_hex = CustodialSigner::from_key(&hex_key()).unwrap();
        let from_base64 = CustodialSigner::from_key(&base64).unwrap();

        // Then
        assert_eq!(from_hex.address(), from_base64.address());
    }

    #[test]
    fn unprefixed_hex_is_accepted() {
        let key = CustodialKey::new(hex::encode(SECRET));

        assert_eq!(
            CustodialSigner::from_key(&key).unwrap().address(),
            CustodialSigner::from_key(&hex_key()).unwrap().address()
        );
    }

    #[test]
    fn other_schemes_are_rejected() {
        let mut flagged = vec![1u8];
        flagged.extend_from_slice(&SECRET);

        let result = CustodialSigner::from_key(&CustodialKey::new(BASE64_STANDARD.encode(&flagged)));

        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[test]
    fn errors_do_not_echo_the_key() {
        let key = CustodialKey::new("definitely-not-a-key");

        let error = CustodialSigner::from_key(&key).unwrap_err();

        assert!(!error.to_string().contains("definitely-not-a-key"));
    }

    #[test]
    fn debug_output_is_redacted() {
        let signer = CustodialSigner::from_key(&hex_key()).unwrap();
        let secret = hex::encode(SECRET);

        assert!(!format!("{:?}", signer).contains(&secret));
        assert!(!format!("{:?}", hex_key()).contains(&secret));
    }

    #[test]
    fn signatures_verify_against_the_signed_bytes() {
        let signer = CustodialSigner::from_key(&hex_key()).unwrap();

        let signature = signer.sign(b"transaction");

        assert!(signature.verify(b"transaction").is_ok());
        assert!(signature.verify(b"other transaction").is_err());
        assert_eq!(signature.address(), signer.address());
    }

    #[test]
    fn keys_deserialize_from_plain_strings() {
        let key: CustodialKey = serde_json::from_str(&format!("\"{}\"", hex::encode(SECRET))).unwrap();

        assert!(!key.is_empty());
        assert!(CustodialSigner::from_key(&key).is_ok());
    }
}
