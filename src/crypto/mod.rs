// The cryptographic envelope: asymmetric public-key encrypt/decrypt over an
// X25519 ECDH shared secret plus `crypto_secretbox` (XSalsa20Poly1305),
// Ed25519 sign/verify, a forward-secrecy channel keyed per remote peer, and
// the replay-timestamp predicate the Block model calls for freshly received
// encrypted blocks.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use crypto_secretbox::{
    Key as SecretboxKey, KeyInit, XSalsa20Poly1305,
    aead::{Aead, generic_array::GenericArray},
};
use ed25519_dalek::{Signature as EdSignature, Signer, Verifier};
use parking_lot::RwLock;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{CoreError, CoreResult};
use crate::keypair::{Keypair, decode_public_key, decode_x25519_public};

const NONCE_LEN: usize = 24;
/// Replay window: encrypted blocks received within this many seconds of now
/// must carry a valid `rply` proof (see `Block::decrypt`).
pub const REPLAY_WINDOW_SECS: i64 = 60;
/// How far a `rply` timestamp may drift from the validator's clock and still
/// be accepted.
const RPLY_TOLERANCE_SECS: i64 = 300;

/// Holds the node's active identity and performs all crypto operations
/// against it. Modeled as an explicit service object (not a global), per the
/// reference's discussion of process-global crypto state.
pub struct CryptoEngine {
    active: RwLock<Keypair>,
}

impl CryptoEngine {
    pub fn new(active: Keypair) -> Self {
        Self {
            active: RwLock::new(active),
        }
    }

    /// Generates a fresh identity and installs it as active.
    pub fn generate() -> Self {
        Self::new(Self::generate_keypair())
    }

    pub fn active_public_base64(&self) -> String {
        self.active.read().public_base64()
    }

    /// Swaps the active keypair (called by the key manager on
    /// `changeActiveKey`).
    pub fn set_active(&self, kp: Keypair) {
        *self.active.write() = kp;
    }

    /// Generates a brand new keypair without touching the active identity.
    pub fn generate_keypair() -> Keypair {
        let mut rng = OsRng;
        Keypair::generate(&mut rng)
    }

    /// Encrypts `plaintext` to `peer_pub_b64` using ECDH (our active secret,
    /// their public key) + secretbox. Output is `nonce ‖ ciphertext`,
    /// base64-encoded.
    pub fn encrypt_asym(&self, plaintext: &[u8], peer_pub_b64: &str) -> CoreResult<String> {
        let peer_pub = decode_x25519_public(peer_pub_b64)?;
        let secret = self.active.read().x25519_secret();
        let shared = secret.diffie_hellman(&peer_pub);
        let key = SecretboxKey::from_slice(shared.as_bytes());
        let cipher = XSalsa20Poly1305::new(key);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = GenericArray::from_slice(&nonce_bytes);
        let mut ct = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CoreError::Decryption)?;
        let mut out = nonce_bytes.to_vec();
        out.append(&mut ct);
        Ok(B64.encode(out))
    }

    /// Decrypts a base64 `nonce ‖ ciphertext` blob that was sealed by
    /// `sender_pub_b64` to the active private key.
    pub fn decrypt_asym_from(&self, ciphertext_b64: &str, sender_pub_b64: &str) -> CoreResult<Vec<u8>> {
        let blob = B64
            .decode(ciphertext_b64.trim())
            .map_err(|_| CoreError::Decryption)?;
        if blob.len() < NONCE_LEN {
            return Err(CoreError::Decryption);
        }
        let (nonce_bytes, ct) = blob.split_at(NONCE_LEN);
        let sender_pub = decode_x25519_public(sender_pub_b64)?;
        let secret = self.active.read().x25519_secret();
        let shared = secret.diffie_hellman(&sender_pub);
        let key = SecretboxKey::from_slice(shared.as_bytes());
        let cipher = XSalsa20Poly1305::new(key);
        let nonce = GenericArray::from_slice(nonce_bytes);
        cipher.decrypt(nonce, ct).map_err(|_| CoreError::Decryption)
    }

    /// Ed25519-signs `data` under the active key, returning a base64 detached
    /// signature.
    pub fn sign(&self, data: &[u8]) -> String {
        let sig = self.active.read().signing_key().sign(data);
        B64.encode(sig.to_bytes())
    }

    /// Verifies `signature_b64` over `data` under `signer_pub_b64`. Returns
    /// `false` rather than an error on any malformed input, matching the
    /// "signature failures are recovered locally" policy.
    pub fn verify(data: &[u8], signature_b64: &str, signer_pub_b64: &str) -> bool {
        let verify_inner = || -> CoreResult<bool> {
            let pk = decode_public_key(signer_pub_b64)?;
            let sig_bytes = B64
                .decode(signature_b64.trim())
                .map_err(|_| CoreError::Decryption)?;
            let sig_arr: [u8; 64] = sig_bytes.try_into().map_err(|_| CoreError::Decryption)?;
            let sig = EdSignature::from_bytes(&sig_arr);
            Ok(pk.verify(data, &sig).is_ok())
        };
        verify_inner().unwrap_or(false)
    }

    /// Encrypts `plaintext` a second time using a channel derived from the
    /// signer's identity, modeling the source's `forwardEnc` pass. In this
    /// minimal envelope the forward channel reuses ECDH against the signer's
    /// key, kept distinct from the outer asym layer by call site rather than
    /// by a second key-agreement primitive.
    pub fn forward_encrypt(&self, plaintext: &[u8], signer_pub_b64: &str) -> CoreResult<String> {
        self.encrypt_asym(plaintext, signer_pub_b64)
    }

    /// Inverse of `forward_encrypt`; errors are swallowed by the caller
    /// (`Block::decrypt`) per the "no content disclosure on failure" policy.
    pub fn forward_decrypt(&self, ciphertext_b64: &str, signer_pub_b64: &str) -> CoreResult<Vec<u8>> {
        self.decrypt_asym_from(ciphertext_b64, signer_pub_b64)
    }

    /// Seals `plaintext` to `recipient_pub_b64` using a fresh, one-shot
    /// ephemeral X25519 keypair rather than the sender's static identity key.
    /// Used for a block's outer envelope (body/meta/signer/sig), where the
    /// true signer identity is only supposed to become known to the
    /// recipient *after* decryption; an ECDH keyed to the sender's static
    /// key would leak it up front. Output is
    /// `ephemeral_pub ‖ nonce ‖ ciphertext`, base64-encoded.
    pub fn seal_anonymous(recipient_pub_b64: &str, plaintext: &[u8]) -> CoreResult<String> {
        let recipient_pub = decode_x25519_public(recipient_pub_b64)?;
        let ephemeral_secret = {
            let mut seed = [0u8; 32];
            OsRng.fill_bytes(&mut seed);
            x25519_dalek::StaticSecret::from(seed)
        };
        let ephemeral_pub = x25519_dalek::PublicKey::from(&ephemeral_secret);
        let shared = ephemeral_secret.diffie_hellman(&recipient_pub);
        let key = SecretboxKey::from_slice(shared.as_bytes());
        let cipher = XSalsa20Poly1305::new(key);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = GenericArray::from_slice(&nonce_bytes);
        let mut ct = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CoreError::Decryption)?;
        let mut out = Vec::with_capacity(32 + NONCE_LEN + ct.len());
        out.extend_from_slice(ephemeral_pub.as_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.append(&mut ct);
        Ok(B64.encode(out))
    }

    /// Opens a blob produced by `seal_anonymous` using the active private
    /// key; the sender's ephemeral public key travels with the ciphertext so
    /// no prior knowledge of the sender is required.
    pub fn open_sealed(&self, sealed_b64: &str) -> CoreResult<Vec<u8>> {
        let blob = B64
            .decode(sealed_b64.trim())
            .map_err(|_| CoreError::Decryption)?;
        if blob.len() < 32 + NONCE_LEN {
            return Err(CoreError::Decryption);
        }
        let (ephemeral_pub_bytes, rest) = blob.split_at(32);
        let (nonce_bytes, ct) = rest.split_at(NONCE_LEN);
        let ephemeral_pub_arr: [u8; 32] = ephemeral_pub_bytes
            .try_into()
            .map_err(|_| CoreError::Decryption)?;
        let ephemeral_pub = x25519_dalek::PublicKey::from(ephemeral_pub_arr);
        let secret = self.active.read().x25519_secret();
        let shared = secret.diffie_hellman(&ephemeral_pub);
        let key = SecretboxKey::from_slice(shared.as_bytes());
        let cipher = XSalsa20Poly1305::new(key);
        let nonce = GenericArray::from_slice(nonce_bytes);
        cipher.decrypt(nonce, ct).map_err(|_| CoreError::Decryption)
    }
}

/// Validates a `rply` replay proof: must parse as an integer epoch-second
/// timestamp within `RPLY_TOLERANCE_SECS` of now. This is deliberately the
/// only contract `Block::decrypt` relies on (§4.2 calls it "an opaque
/// predicate"); the proof format itself is not otherwise specified.
pub fn replay_timestamp_validation(rply: &str) -> bool {
    let claimed: i64 = match rply.trim().parse() {
        Ok(v) => v,
        Err(_) => return false,
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    (now - claimed).abs() <= RPLY_TOLERANCE_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn engine_with_seed(seed: u64) -> (CryptoEngine, Keypair) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let kp = Keypair::generate(&mut rng);
        (CryptoEngine::new(kp.clone()), kp)
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let (engine, kp) = engine_with_seed(1);
        let data = b"hello onion";
        let sig = engine.sign(data);
        assert!(CryptoEngine::verify(data, &sig, &kp.public_base64()));
    }

    #[test]
    fn verify_fails_on_mutated_body() {
        let (engine, kp) = engine_with_seed(2);
        let sig = engine.sign(b"hello");
        assert!(!CryptoEngine::verify(b"hellp", &sig, &kp.public_base64()));
    }

    #[test]
    fn asym_roundtrip_between_two_identities() {
        let (alice, alice_kp) = engine_with_seed(3);
        let (bob, bob_kp) = engine_with_seed(4);

        let ct = alice
            .encrypt_asym(b"secret payload", &bob_kp.public_base64())
            .unwrap();
        let pt = bob.decrypt_asym_from(&ct, &alice_kp.public_base64()).unwrap();
        assert_eq!(pt, b"secret payload");
    }

    #[test]
    fn sealed_box_roundtrips_without_sender_identity() {
        let (bob, bob_kp) = engine_with_seed(5);
        let sealed = CryptoEngine::seal_anonymous(&bob_kp.public_base64(), b"who am i").unwrap();
        let opened = bob.open_sealed(&sealed).unwrap();
        assert_eq!(opened, b"who am i");
    }

    #[test]
    fn replay_validation_accepts_fresh_and_rejects_garbage() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert!(replay_timestamp_validation(&now.to_string()));
        assert!(!replay_timestamp_validation("not-a-timestamp"));
    }
}
