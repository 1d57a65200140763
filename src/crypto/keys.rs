use crate::crypto::hash::{Hash256, Hash160};
use crate::crypto::signatures::Signature;
use crate::{LedgerError, Result};
use secp256k1::{Secp256k1, SecretKey, PublicKey as Secp256k1PublicKey, Message};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ADDRESS_PREFIX: &str = "mlg";
const ADDRESS_VERSION: u8 = 0x00;

#[derive(Debug, Clone)]
pub struct PrivateKey {
    key: SecretKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    key: Vec<u8>, // Compressed SEC1 encoding
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl PrivateKey {
    pub fn new() -> Result<Self> {
        let mut rng = OsRng;
        let mut secret_bytes = [0u8; 32];
        rng.fill_bytes(&mut secret_bytes);

        let secret_key = SecretKey::from_slice(&secret_bytes)
            .map_err(|e| LedgerError::Crypto(format!("Failed to create private key: {}", e)))?;

        Ok(Self { key: secret_key })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(LedgerError::Crypto("Private key must be 32 bytes".to_string()));
        }

        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid private key: {}", e)))?;

        Ok(Self { key: secret_key })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.secret_bytes()
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        let secp = Secp256k1::signing_only();
        let public_key = Secp256k1PublicKey::from_secret_key(&secp, &self.key);

        Ok(PublicKey {
            key: public_key.serialize().to_vec(),
        })
    }

    pub fn address(&self) -> Result<String> {
        Ok(self.public_key()?.to_address())
    }

    pub fn sign(&self, message: &Hash256) -> Result<Signature> {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest_slice(message.as_bytes())
            .map_err(|e| LedgerError::Crypto(format!("Invalid message: {}", e)))?;

        let signature = secp.sign_ecdsa(&message, &self.key);
        Ok(Signature::from_secp256k1(signature))
    }
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let public_key = Secp256k1PublicKey::from_slice(bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            key: public_key.serialize().to_vec(),
        })
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn hash160(&self) -> Hash160 {
        Hash160::hash_sha256(&self.key)
    }

    pub fn to_address(&self) -> String {
        let hash160 = self.hash160();

        let mut data = Vec::with_capacity(25);
        data.push(ADDRESS_VERSION);
        data.extend_from_slice(hash160.as_bytes());

        let hash = Hash256::double_hash(&data);
        data.extend_from_slice(&hash.as_bytes()[0..4]);

        format!("{}{}", ADDRESS_PREFIX, bs58::encode(data).into_string())
    }

    pub fn verify(&self, message: &Hash256, signature: &Signature) -> Result<bool> {
        let secp = Secp256k1::verification_only();

        let public_key = Secp256k1PublicKey::from_slice(&self.key)
            .map_err(|e| LedgerError::Crypto(format!("Invalid public key: {}", e)))?;

        let message = Message::from_digest_slice(message.as_bytes())
            .map_err(|e| LedgerError::Crypto(format!("Invalid message: {}", e)))?;

        let secp_signature = signature.to_secp256k1()?;

        Ok(secp.verify_ecdsa(&message, &secp_signature, &public_key).is_ok())
    }
}

impl KeyPair {
    pub fn new() -> Result<Self> {
        let private_key = PrivateKey::new()?;
        let public_key = private_key.public_key()?;

        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn from_private_key(private_key: PrivateKey) -> Result<Self> {
        let public_key = private_key.public_key()?;

        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn address(&self) -> String {
        self.public_key.to_address()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.key))
    }
}

pub fn address_to_hash160(address: &str) -> Result<Hash160> {
    let encoded = address
        .strip_prefix(ADDRESS_PREFIX)
        .ok_or_else(|| LedgerError::InvalidAddress(address.to_string()))?;

    let decoded = bs58::decode(encoded).into_vec()
        .map_err(|_| LedgerError::InvalidAddress(address.to_string()))?;

    if decoded.len() != 25 || decoded[0] != ADDRESS_VERSION {
        return Err(LedgerError::InvalidAddress(address.to_string()));
    }

    let data = &decoded[0..21];
    let checksum = &decoded[21..25];
    let hash = Hash256::double_hash(data);

    if &hash.as_bytes()[0..4] != checksum {
        return Err(LedgerError::InvalidAddress(address.to_string()));
    }

    let mut hash160_bytes = [0u8; 20];
    hash160_bytes.copy_from_slice(&decoded[1..21]);

    Ok(Hash160::new(hash160_bytes))
}

pub fn is_valid_address(address: &str) -> bool {
    address_to_hash160(address).is_ok()
}
