use crate::{LedgerError, Result};
use secp256k1::ecdsa::Signature as Secp256k1Signature;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ECDSA signature in 64-byte compact form (`r || s`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            return Err(LedgerError::Crypto("Invalid signature length".to_string()));
        }

        // Reject encodings secp256k1 would refuse later
        Secp256k1Signature::from_compact(bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid signature: {}", e)))?;

        Ok(Self { bytes: bytes.to_vec() })
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn from_secp256k1(signature: Secp256k1Signature) -> Self {
        Self {
            bytes: signature.serialize_compact().to_vec(),
        }
    }

    pub fn to_secp256k1(&self) -> Result<Secp256k1Signature> {
        Secp256k1Signature::from_compact(&self.bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid signature: {}", e)))
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        let secp_sig = self.to_secp256k1()?;
        Ok(secp_sig.serialize_der().to_vec())
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let secp_sig = Secp256k1Signature::from_der(der)
            .map_err(|e| LedgerError::Crypto(format!("Invalid DER signature: {}", e)))?;

        Ok(Self::from_secp256k1(secp_sig))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;
    use crate::crypto::hash::Hash256;

    #[test]
    fn test_signature_roundtrip() -> Result<()> {
        let private_key = PrivateKey::new()?;
        let public_key = private_key.public_key()?;
        let message = Hash256::hash(b"test message");

        let signature = private_key.sign(&message)?;
        assert!(public_key.verify(&message, &signature)?);

        let other = Hash256::hash(b"other message");
        assert!(!public_key.verify(&other, &signature)?);

        Ok(())
    }

    #[test]
    fn test_signature_bytes() -> Result<()> {
        let private_key = PrivateKey::new()?;
        let message = Hash256::hash(b"test message");
        let signature = private_key.sign(&message)?;

        let restored = Signature::from_bytes(signature.to_bytes())?;
        assert_eq!(signature, restored);

        assert!(Signature::from_bytes(&[0u8; 10]).is_err());

        Ok(())
    }

    #[test]
    fn test_der_encoding() -> Result<()> {
        let private_key = PrivateKey::new()?;
        let message = Hash256::hash(b"test message");
        let signature = private_key.sign(&message)?;

        let der = signature.to_der()?;
        let restored_signature = Signature::from_der(&der)?;

        assert_eq!(signature, restored_signature);

        Ok(())
    }
}
