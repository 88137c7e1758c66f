// A keypair is a single 32-byte seed reused two ways: as an Ed25519 signing
// seed (identity, `verifySig`) and, via the standard Edwards/Montgomery
// birational map, as the static secret for ECDH-based asymmetric encryption.
// This satisfies the source's single `(public_key, private_key)` model while
// giving us both signing and Diffie-Hellman key agreement from one encoded
// pair. The X25519 scalar is derived the same way Ed25519 itself derives its
// signing scalar (RFC 8032 SHA-512 expansion + clamping), so a remote peer's
// published Ed25519 public key converts to the matching X25519 public key
// via `ed25519_to_x25519_public` rather than needing a second encoded key.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::hazmat::ExpandedSecretKey;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey as XPublicKey, StaticSecret as XStaticSecret};

use crate::error::{CoreError, CoreResult};

/// 32-byte keypair seed, base64-encoded for storage and wire representation.
#[derive(Clone)]
pub struct Keypair {
    seed: [u8; 32],
}

impl Keypair {
    /// Generates a fresh random keypair.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self { seed }
    }

    /// Reconstructs a keypair from a base64-encoded 32-byte seed (the
    /// private-key field of a `pub,priv` key-file record).
    pub fn from_base64_seed(encoded: &str) -> CoreResult<Self> {
        let bytes = B64
            .decode(encoded.trim())
            .map_err(|e| CoreError::InvalidPubkey(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CoreError::InvalidPubkey(format!(
                "expected 32-byte seed, got {}",
                bytes.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        Ok(Self { seed })
    }

    pub fn private_base64(&self) -> String {
        B64.encode(self.seed)
    }

    pub fn public_base64(&self) -> String {
        B64.encode(self.verifying_key().to_bytes())
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.seed)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key().verifying_key()
    }

    /// The X25519 scalar matching this identity's Ed25519 signing key: the
    /// same SHA-512-expanded, clamped scalar RFC 8032 uses for signing,
    /// rather than a raw clamp of the seed itself (those are different
    /// scalars and would not agree with `ed25519_to_x25519_public`).
    pub fn x25519_secret(&self) -> XStaticSecret {
        let expanded = ExpandedSecretKey::from(&self.signing_key());
        XStaticSecret::from(expanded.scalar.to_bytes())
    }

    pub fn x25519_public(&self) -> XPublicKey {
        XPublicKey::from(&self.x25519_secret())
    }
}

/// Converts an Ed25519 verifying key to the X25519 public key that shares
/// its scalar, via the birational map between the Edwards and Montgomery
/// forms of Curve25519 (the same conversion libsodium's
/// `crypto_sign_ed25519_pk_to_curve25519` performs).
pub fn ed25519_to_x25519_public(ed_pub: &VerifyingKey) -> CoreResult<XPublicKey> {
    let point = CompressedEdwardsY(ed_pub.to_bytes())
        .decompress()
        .ok_or_else(|| CoreError::InvalidPubkey("not a valid Ed25519 point".into()))?;
    Ok(XPublicKey::from(point.to_montgomery().to_bytes()))
}

/// Decodes a base64-encoded Ed25519 public key string into a `VerifyingKey`.
pub fn decode_public_key(encoded: &str) -> CoreResult<VerifyingKey> {
    let bytes = B64
        .decode(encoded.trim())
        .map_err(|e| CoreError::InvalidPubkey(e.to_string()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CoreError::InvalidPubkey("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| CoreError::InvalidPubkey(e.to_string()))
}

/// Decodes a peer's base64-encoded Ed25519 public key string (the same
/// string used as `signer`) and converts it to the matching X25519
/// encryption-target key.
pub fn decode_x25519_public(encoded: &str) -> CoreResult<XPublicKey> {
    let verifying = decode_public_key(encoded)?;
    ed25519_to_x25519_public(&verifying)
}
