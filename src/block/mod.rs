// The Block model: parse/validate the wire format, asymmetric decryption,
// Ed25519 signature verification, parent-chain reassembly, and store-backed
// querying. Grounded on `onionrblockapi.py`'s `update`/`decrypt`/`verifySig`/
// `mergeChain`/`getBlocks` contract.

pub mod cache;
pub mod store;

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::warn;

use crate::crypto::{CryptoEngine, REPLAY_WINDOW_SECS, replay_timestamp_validation};
use crate::error::{CoreError, CoreResult};
use crate::hash::block_hash_hex;

pub use cache::BlockCache;
pub use store::{BlockStore, MemoryBlockStore};

/// `header.encryptType`. `Sym` is declared but unimplemented, a reserved
/// value that fails `decrypt()` cleanly rather than silently succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptType {
    None,
    Asym,
    Sym,
}

impl EncryptType {
    fn parse(s: &str) -> Self {
        match s {
            "asym" => EncryptType::Asym,
            "sym" => EncryptType::Sym,
            _ => EncryptType::None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            EncryptType::None => "none",
            EncryptType::Asym => "asym",
            EncryptType::Sym => "sym",
        }
    }
}

/// The metadata sub-object embedded (plaintext) or sealed (encrypted) inside
/// `header.meta`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rply: Option<String>,
    #[serde(rename = "forwardEnc", default, skip_serializing_if = "is_false")]
    pub forward_enc: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Deserialize)]
struct HeaderWire<'a> {
    #[serde(default)]
    sig: Option<String>,
    #[serde(default)]
    signer: Option<String>,
    #[serde(default)]
    time: i64,
    #[serde(rename = "encryptType", default)]
    encrypt_type: String,
    #[serde(borrow)]
    meta: &'a RawValue,
}

#[derive(Serialize)]
struct HeaderOut<'a> {
    sig: &'a str,
    signer: &'a str,
    time: i64,
    #[serde(rename = "encryptType")]
    encrypt_type: &'a str,
    #[serde(serialize_with = "serialize_raw")]
    meta: &'a str,
}

fn serialize_raw<S>(raw_json: &&str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let value: Box<RawValue> =
        RawValue::from_string((*raw_json).to_string()).map_err(serde::ser::Error::custom)?;
    value.serialize(serializer)
}

/// Options for constructing and signing/encrypting a fresh block.
pub struct NewBlock {
    pub block_type: String,
    pub parent: Option<String>,
    pub content: Vec<u8>,
    pub sign: bool,
    /// Recipient public key: when present the block is asym-encrypted to it.
    pub encrypt_to: Option<String>,
    pub forward_enc: bool,
    pub rply: Option<String>,
    pub time: i64,
}

/// A single content-addressed network object.
pub struct Block {
    hash: String,
    raw: Vec<u8>,

    sig: String,
    signer: String,
    time: i64,
    encrypt_type: EncryptType,
    meta_raw: String,

    metadata: Metadata,
    content: Vec<u8>,

    date: i64,
    valid: bool,
    is_encrypted: bool,
    decrypted: bool,
    signed: bool,
    signed_data: Option<Vec<u8>>,
}

impl Block {
    /// Builds, signs and (optionally) encrypts a fresh block, returning the
    /// serialized bytes ready for `save()`. Does not assign a hash or
    /// receipt date; those are filled in once stored.
    pub fn build(spec: NewBlock, engine: &CryptoEngine) -> CoreResult<Self> {
        let metadata = Metadata {
            block_type: Some(spec.block_type),
            parent: spec.parent,
            rply: spec.rply,
            forward_enc: spec.forward_enc,
        };
        let meta_json = serde_json::to_string(&metadata)?;

        let signer_plain = engine.active_public_base64();
        let signature_plain = if spec.sign {
            engine.sign(&signed_region(meta_json.as_bytes(), &spec.content))
        } else {
            String::new()
        };

        let (meta_field, signer_field, sig_field, body, encrypt_type, is_encrypted) =
            match &spec.encrypt_to {
                Some(recipient) => {
                    let meta_ct = CryptoEngine::seal_anonymous(recipient, meta_json.as_bytes())?;
                    let signer_ct = CryptoEngine::seal_anonymous(recipient, signer_plain.as_bytes())?;
                    let sig_ct = if signature_plain.is_empty() {
                        String::new()
                    } else {
                        CryptoEngine::seal_anonymous(recipient, signature_plain.as_bytes())?
                    };
                    let body_ct = CryptoEngine::seal_anonymous(recipient, &spec.content)?;
                    (
                        serde_json::to_string(&meta_ct)?,
                        signer_ct,
                        sig_ct,
                        body_ct.into_bytes(),
                        EncryptType::Asym,
                        true,
                    )
                }
                None => (
                    meta_json.clone(),
                    signer_plain,
                    signature_plain,
                    spec.content.clone(),
                    EncryptType::None,
                    false,
                ),
            };

        let header = HeaderOut {
            sig: &sig_field,
            signer: &signer_field,
            time: spec.time,
            encrypt_type: encrypt_type.as_str(),
            meta: &meta_field,
        };
        let header_json = serde_json::to_string(&header)?;

        let mut raw = Vec::with_capacity(header_json.len() + 1 + body.len());
        raw.extend_from_slice(header_json.as_bytes());
        raw.push(b'\n');
        raw.extend_from_slice(&body);

        let hash = block_hash_hex(&raw);

        let signed = !sig_field.is_empty();
        let signed_data = if signed && !is_encrypted {
            Some(signed_region(meta_field.as_bytes(), &body))
        } else {
            None
        };

        Ok(Block {
            hash,
            raw,
            sig: sig_field,
            signer: signer_field,
            time: spec.time,
            encrypt_type,
            meta_raw: meta_field,
            metadata: if is_encrypted { Metadata::default() } else { metadata },
            content: body,
            date: now_epoch(),
            valid: true,
            is_encrypted,
            decrypted: false,
            signed,
            signed_data,
        })
    }

    /// Loads and parses a block by hash, preferring the cache over the
    /// store. On any parse/validation failure the block is purged from the
    /// store and `is_valid()` returns false; the caller still receives a
    /// `Block` so it can inspect the failure, matching the source's
    /// self-healing `update()`.
    pub fn load(hash: &str, store: &dyn BlockStore, cache: &BlockCache) -> CoreResult<Self> {
        let raw = cache
            .get(hash)
            .or_else(|| store.get(hash))
            .ok_or_else(|| CoreError::NoDataAvailable(hash.to_string()))?;
        let date = store.received_at(hash).unwrap_or_else(now_epoch);

        let mut block = Self::parse_raw(hash.to_string(), raw.clone(), date);
        if !block.valid {
            store.remove(hash);
        } else if !cache.contains(hash) {
            cache.insert(hash, &raw);
        }
        block.date = date;
        Ok(block)
    }

    fn parse_raw(hash: String, raw: Vec<u8>, date: i64) -> Self {
        match parse_inner(&raw) {
            Ok(parsed) => Block {
                hash,
                raw,
                date,
                valid: true,
                ..parsed
            },
            Err(e) => {
                warn!(hash = %hash, error = %e, "failed to parse block, marking invalid");
                Block {
                    hash,
                    raw,
                    sig: String::new(),
                    signer: String::new(),
                    time: 0,
                    encrypt_type: EncryptType::None,
                    meta_raw: String::new(),
                    metadata: Metadata::default(),
                    content: Vec::new(),
                    date,
                    valid: false,
                    is_encrypted: false,
                    decrypted: false,
                    signed: false,
                    signed_data: None,
                }
            }
        }
    }

    /// Persists `raw` into `store` under its content hash and, if it fits,
    /// the `cache`.
    pub fn save(&self, store: &dyn BlockStore, cache: &BlockCache) {
        store.insert(&self.hash, &self.raw, self.metadata.block_type.as_deref());
        cache.insert(&self.hash, &self.raw);
    }

    /// Removes this block from `store` and marks it invalid.
    pub fn delete(&mut self, store: &dyn BlockStore) {
        store.remove(&self.hash);
        self.valid = false;
    }

    /// Decrypts an `asym`-encrypted block using `engine`'s active key.
    /// Idempotent: a second call returns `Ok(true)` immediately. `sym`
    /// blocks fail cleanly since the type is reserved/unimplemented.
    pub fn decrypt(&mut self, engine: &CryptoEngine) -> CoreResult<bool> {
        if self.decrypted {
            return Ok(true);
        }
        match self.encrypt_type {
            EncryptType::None => {
                self.decrypted = true;
                Ok(true)
            }
            EncryptType::Sym => Err(CoreError::Decryption),
            EncryptType::Asym => self.decrypt_asym(engine),
        }
    }

    fn decrypt_asym(&mut self, engine: &CryptoEngine) -> CoreResult<bool> {
        let meta_ct: String = serde_json::from_str(&self.meta_raw)?;
        let meta_plain = engine.open_sealed(&meta_ct).map_err(|_| CoreError::Decryption)?;
        let signer_plain = engine.open_sealed(&self.signer).map_err(|_| CoreError::Decryption)?;
        let body_plain = engine
            .open_sealed(&String::from_utf8_lossy(&self.content))
            .map_err(|_| CoreError::Decryption)?;
        let sig_plain = if self.sig.is_empty() {
            Vec::new()
        } else {
            engine.open_sealed(&self.sig).map_err(|_| CoreError::Decryption)?
        };

        let metadata: Metadata = serde_json::from_slice(&meta_plain)?;
        let signer = String::from_utf8(signer_plain).map_err(|_| CoreError::Decryption)?;

        // Replay validation applies only to freshly received encrypted
        // blocks; the gate is keyed to *receipt* date, not claimed `time`.
        // This is intentional, see DESIGN.md.
        let age = now_epoch() - self.date;
        if age < REPLAY_WINDOW_SECS {
            let rply_ok = metadata
                .rply
                .as_deref()
                .map(replay_timestamp_validation)
                .unwrap_or(false);
            if !rply_ok {
                self.metadata = Metadata::default();
                self.signer = String::new();
                self.sig = String::new();
                self.signed_data = None;
                return Err(CoreError::ReplayAttack);
            }
        }

        let meta_text = String::from_utf8(meta_plain.clone()).map_err(|_| CoreError::Decryption)?;
        self.signed_data = if !sig_plain.is_empty() {
            Some(signed_region(meta_text.as_bytes(), &body_plain))
        } else {
            None
        };
        self.signer = signer;
        self.sig = B64.encode(&sig_plain);
        self.metadata = metadata;
        self.content = body_plain;
        self.decrypted = true;

        if self.metadata.forward_enc {
            // Swallow forward-channel decryption failures: no content
            // disclosure on failure.
            if let Ok(inner) = engine.forward_decrypt(
                &String::from_utf8_lossy(&self.content),
                &self.signer,
            ) {
                self.content = inner;
            }
        }

        Ok(true)
    }

    /// Ed25519-verifies `signed_data` under `signer` with `sig`.
    pub fn verify_sig(&self) -> bool {
        match &self.signed_data {
            Some(data) if self.signed => CryptoEngine::verify(data, &self.sig, &self.signer),
            _ => false,
        }
    }

    /// True iff verification under `candidate_pub` succeeds.
    pub fn is_signer(&self, candidate_pub: &str) -> bool {
        match &self.signed_data {
            Some(data) if self.signed => CryptoEngine::verify(data, &self.sig, candidate_pub),
            _ => false,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
    pub fn block_type(&self) -> Option<&str> {
        self.metadata.block_type.as_deref()
    }
    pub fn parent(&self) -> Option<&str> {
        self.metadata.parent.as_deref()
    }
    pub fn content(&self) -> &[u8] {
        &self.content
    }
    pub fn content_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
    pub fn date(&self) -> i64 {
        self.date
    }
    /// Author-claimed `header.time`, as opposed to `date()`'s receipt time.
    pub fn claimed_time(&self) -> i64 {
        self.time
    }
    pub fn is_valid(&self) -> bool {
        self.valid
    }
    pub fn is_signed(&self) -> bool {
        self.signed
    }
    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }
    pub fn signer(&self) -> &str {
        &self.signer
    }
    pub fn signature(&self) -> &str {
        &self.sig
    }
}

fn parse_inner(raw: &[u8]) -> CoreResult<Block> {
    let split = raw
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| CoreError::ParseFailure("missing header/body separator".into()))?;
    let (header_bytes, body) = raw.split_at(split);
    let body = &body[1..];
    let header_str = std::str::from_utf8(header_bytes)
        .map_err(|e| CoreError::ParseFailure(e.to_string()))?;
    let wire: HeaderWire = serde_json::from_str(header_str)?;

    let encrypt_type = EncryptType::parse(&wire.encrypt_type);
    let is_encrypted = !matches!(encrypt_type, EncryptType::None);
    let meta_raw = wire.meta.get().to_string();

    let metadata = if is_encrypted {
        Metadata::default()
    } else {
        serde_json::from_str(&meta_raw)?
    };

    let sig = wire.sig.unwrap_or_default();
    let signer = wire.signer.unwrap_or_default();
    let signed = !sig.is_empty();
    let signed_data = if signed {
        Some(signed_region(meta_raw.as_bytes(), body))
    } else {
        None
    };

    Ok(Block {
        hash: String::new(),
        raw: Vec::new(),
        sig,
        signer,
        time: wire.time,
        encrypt_type,
        meta_raw,
        metadata,
        content: body.to_vec(),
        date: 0,
        valid: true,
        is_encrypted,
        decrypted: !is_encrypted,
        signed,
        signed_data,
    })
}

fn signed_region(meta_field: &[u8], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(meta_field.len() + body.len());
    out.extend_from_slice(meta_field);
    out.extend_from_slice(body);
    out
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Walks `block.parent` from `child_hash` up to `limit` steps (inspecting at
/// most `limit + 1` blocks), stopping at a null, invalid, self-, or
/// already-visited parent. Concatenates each block's base64-decoded content,
/// child-first (most recent first).
pub fn merge_chain(
    child_hash: &str,
    limit: usize,
    store: &dyn BlockStore,
    cache: &BlockCache,
) -> CoreResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut current = child_hash.to_string();

    for _ in 0..=limit {
        if !seen.insert(current.clone()) {
            break;
        }
        let block = Block::load(&current, store, cache)?;
        if !block.valid {
            break;
        }
        if let Ok(decoded) = B64.decode(block.content()) {
            out.extend_from_slice(&decoded);
        }
        match block.parent() {
            Some(parent) if parent != current => current = parent.to_string(),
            _ => break,
        }
    }
    Ok(out)
}

/// Filters for `get_blocks`.
#[derive(Default)]
pub struct BlockQuery<'a> {
    pub block_type: Option<&'a str>,
    pub signer: Option<&'a [&'a str]>,
    pub signed: Option<bool>,
    pub parent: Option<&'a str>,
    pub reverse: bool,
    pub limit: Option<usize>,
}

/// Filters the store by type, then loads and further filters each candidate
/// on signer/signed/parent. `limit` truncates the *filtered* result (the
/// source's `relevant_Blocks` capitalization bug is not reproduced: the
/// correct check is `len(relevant_blocks) < limit`).
pub fn get_blocks(
    query: &BlockQuery,
    store: &dyn BlockStore,
    cache: &BlockCache,
) -> CoreResult<Vec<Block>> {
    let candidates = match query.block_type {
        Some(t) => store.list_by_type(t),
        None => store.list(),
    };

    let mut relevant_blocks = Vec::new();
    for hash in candidates {
        if let Some(limit) = query.limit {
            if relevant_blocks.len() >= limit {
                break;
            }
        }
        let block = Block::load(&hash, store, cache)?;
        if !block.valid {
            continue;
        }
        if let Some(signers) = query.signer {
            if !signers.contains(&block.signer()) {
                continue;
            }
        }
        if let Some(signed) = query.signed {
            if block.is_signed() != signed {
                continue;
            }
        }
        if let Some(parent) = query.parent {
            if block.parent() != Some(parent) {
                continue;
            }
        }
        relevant_blocks.push(block);
    }

    if query.reverse {
        relevant_blocks.reverse();
    }
    Ok(relevant_blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::Keypair;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn engine(seed: u64) -> (CryptoEngine, Keypair) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let kp = Keypair::generate(&mut rng);
        (CryptoEngine::new(kp.clone()), kp)
    }

    #[test]
    fn plaintext_block_round_trips_and_verifies() {
        let (k1, k1_kp) = engine(1);
        let (_k2, k2_kp) = engine(2);

        let block = Block::build(
            NewBlock {
                block_type: "bin".into(),
                parent: None,
                content: b"hello".to_vec(),
                sign: true,
                encrypt_to: None,
                forward_enc: false,
                rply: None,
                time: 1_700_000_000,
            },
            &k1,
        )
        .unwrap();

        let store = MemoryBlockStore::new();
        let cache = BlockCache::new(1 << 20, 1 << 20);
        block.save(&store, &cache);

        let reloaded = Block::load(block.hash(), &store, &cache).unwrap();
        assert!(reloaded.is_valid());
        assert!(reloaded.is_signed());
        assert!(reloaded.verify_sig());
        assert!(reloaded.is_signer(&k1_kp.public_base64()));
        assert!(!reloaded.is_signer(&k2_kp.public_base64()));
        assert_eq!(reloaded.content(), b"hello");
    }

    #[test]
    fn asym_block_decrypts_and_reveals_signer() {
        let (k1, k1_kp) = engine(3);
        let (k2, k2_kp) = engine(4);

        let now = now_epoch();
        let block = Block::build(
            NewBlock {
                block_type: "con".into(),
                parent: None,
                content: b"secret".to_vec(),
                sign: true,
                encrypt_to: Some(k2_kp.public_base64()),
                forward_enc: false,
                rply: Some(now.to_string()),
                time: now,
            },
            &k1,
        )
        .unwrap();

        let store = MemoryBlockStore::new();
        let cache = BlockCache::new(1 << 20, 1 << 20);
        block.save(&store, &cache);

        let mut reloaded = Block::load(block.hash(), &store, &cache).unwrap();
        assert!(reloaded.is_encrypted());
        assert!(reloaded.decrypt(&k2).unwrap());
        assert_eq!(reloaded.signer(), k1_kp.public_base64());
        assert!(reloaded.verify_sig());
        assert_eq!(reloaded.content(), b"secret");

        // idempotent
        assert!(reloaded.decrypt(&k2).unwrap());
    }

    #[test]
    fn replay_attack_zeroes_decrypted_state() {
        let (k1, _k1_kp) = engine(5);
        let (k2, k2_kp) = engine(6);

        let now = now_epoch();
        let block = Block::build(
            NewBlock {
                block_type: "con".into(),
                parent: None,
                content: b"secret".to_vec(),
                sign: true,
                encrypt_to: Some(k2_kp.public_base64()),
                forward_enc: false,
                rply: Some("not-a-real-proof".into()),
                time: now,
            },
            &k1,
        )
        .unwrap();

        let store = MemoryBlockStore::new();
        let cache = BlockCache::new(1 << 20, 1 << 20);
        block.save(&store, &cache);

        let mut reloaded = Block::load(block.hash(), &store, &cache).unwrap();
        let result = reloaded.decrypt(&k2);
        assert!(matches!(result, Err(CoreError::ReplayAttack)));
        assert_eq!(reloaded.signer(), "");
        assert!(!reloaded.verify_sig());
    }

    #[test]
    fn mutated_body_breaks_verification() {
        let (k1, _k1_kp) = engine(7);
        let block = Block::build(
            NewBlock {
                block_type: "bin".into(),
                parent: None,
                content: b"hello".to_vec(),
                sign: true,
                encrypt_to: None,
                forward_enc: false,
                rply: None,
                time: 1,
            },
            &k1,
        )
        .unwrap();

        let store = MemoryBlockStore::new();
        let cache = BlockCache::new(1 << 20, 1 << 20);
        block.save(&store, &cache);
        let mut raw = store.get(block.hash()).unwrap();
        *raw.last_mut().unwrap() = b'!';
        // reinsert corrupted bytes under a *different* key to test signature
        // sensitivity without disturbing hash-lookup invariants
        store.insert("corrupted", &raw, Some("bin"));
        let cache2 = BlockCache::new(1 << 20, 1 << 20);
        let corrupted = Block::load("corrupted", &store, &cache2).unwrap();
        assert!(!corrupted.verify_sig());
    }

    #[test]
    fn merge_chain_concatenates_child_first() {
        let (k1, _) = engine(8);
        let store = MemoryBlockStore::new();
        let cache = BlockCache::new(1 << 20, 1 << 20);

        let root = Block::build(
            NewBlock {
                block_type: "bin".into(),
                parent: None,
                content: B64.encode(b"A").into_bytes(),
                sign: false,
                encrypt_to: None,
                forward_enc: false,
                rply: None,
                time: 1,
            },
            &k1,
        )
        .unwrap();
        root.save(&store, &cache);

        let mid = Block::build(
            NewBlock {
                block_type: "bin".into(),
                parent: Some(root.hash().to_string()),
                content: B64.encode(b"B").into_bytes(),
                sign: false,
                encrypt_to: None,
                forward_enc: false,
                rply: None,
                time: 2,
            },
            &k1,
        )
        .unwrap();
        mid.save(&store, &cache);

        let tip = Block::build(
            NewBlock {
                block_type: "bin".into(),
                parent: Some(mid.hash().to_string()),
                content: B64.encode(b"C").into_bytes(),
                sign: false,
                encrypt_to: None,
                forward_enc: false,
                rply: None,
                time: 3,
            },
            &k1,
        )
        .unwrap();
        tip.save(&store, &cache);

        let merged = merge_chain(tip.hash(), 1000, &store, &cache).unwrap();
        assert_eq!(merged, b"CBA");
    }

    #[test]
    fn merge_chain_respects_limit() {
        let (k1, _) = engine(9);
        let store = MemoryBlockStore::new();
        let cache = BlockCache::new(1 << 20, 1 << 20);

        let mut prev: Option<String> = None;
        let mut last_hash = String::new();
        for i in 0..5 {
            let b = Block::build(
                NewBlock {
                    block_type: "bin".into(),
                    parent: prev.clone(),
                    content: B64.encode([i as u8]).into_bytes(),
                    sign: false,
                    encrypt_to: None,
                    forward_enc: false,
                    rply: None,
                    time: i,
                },
                &k1,
            )
            .unwrap();
            b.save(&store, &cache);
            prev = Some(b.hash().to_string());
            last_hash = b.hash().to_string();
        }

        let merged = merge_chain(&last_hash, 1, &store, &cache).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn cache_bound_evicts_in_insertion_order() {
        let (k1, _) = engine(10);
        let store = MemoryBlockStore::new();
        let cache = BlockCache::new(1000, 0); // nothing survives in cache
        let block = Block::build(
            NewBlock {
                block_type: "bin".into(),
                parent: None,
                content: b"x".to_vec(),
                sign: false,
                encrypt_to: None,
                forward_enc: false,
                rply: None,
                time: 1,
            },
            &k1,
        )
        .unwrap();
        block.save(&store, &cache);
        assert!(!cache.contains(block.hash()));
        assert!(store.get(block.hash()).is_some());
    }
}
