//! Black-box scenarios against the public API, one per named case in
//! `SPEC_FULL.md`'s end-to-end scenario list.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use onionr_core::block::{BlockQuery, get_blocks, merge_chain};
use onionr_core::{Block, BlockCache, CoreError, CryptoEngine, Keypair, MemoryBlockStore, NewBlock};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn keypair(seed: u64) -> Keypair {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Keypair::generate(&mut rng)
}

fn now_epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// S1: a plaintext, signed block round-trips through save/load with correct
/// signer identification and content.
#[test]
fn s1_plaintext_signed_block_roundtrips() {
    let k1 = keypair(101);
    let k2 = keypair(102);
    let engine = CryptoEngine::new(k1.clone());

    let block = Block::build(
        NewBlock {
            block_type: "bin".into(),
            parent: None,
            content: b"hello".to_vec(),
            sign: true,
            encrypt_to: None,
            forward_enc: false,
            rply: None,
            time: now_epoch(),
        },
        &engine,
    )
    .unwrap();

    let store = MemoryBlockStore::new();
    let cache = BlockCache::new(1 << 20, 1 << 20);
    block.save(&store, &cache);

    let reloaded = Block::load(block.hash(), &store, &cache).unwrap();
    assert!(reloaded.is_signed());
    assert!(reloaded.is_signer(&k1.public_base64()));
    assert!(!reloaded.is_signer(&k2.public_base64()));
    assert_eq!(reloaded.content(), b"hello");
}

/// S2: a block asym-encrypted to K2 and signed by K1, with a fresh `rply`,
/// decrypts under K2's active key and reveals K1 as the signer.
#[test]
fn s2_asym_block_decrypts_and_reveals_signer() {
    let k1 = keypair(103);
    let k2 = keypair(104);
    let k1_engine = CryptoEngine::new(k1.clone());
    let k2_engine = CryptoEngine::new(k2.clone());

    let now = now_epoch();
    let block = Block::build(
        NewBlock {
            block_type: "con".into(),
            parent: None,
            content: b"secret".to_vec(),
            sign: true,
            encrypt_to: Some(k2.public_base64()),
            forward_enc: false,
            rply: Some(now.to_string()),
            time: now,
        },
        &k1_engine,
    )
    .unwrap();

    let store = MemoryBlockStore::new();
    let cache = BlockCache::new(1 << 20, 1 << 20);
    block.save(&store, &cache);

    let mut reloaded = Block::load(block.hash(), &store, &cache).unwrap();
    assert!(reloaded.decrypt(&k2_engine).unwrap());
    assert_eq!(reloaded.signer(), k1.public_base64());
    assert!(reloaded.verify_sig());
}

/// S3: the same block as S2, but with `rply` replaced by garbage; decryption
/// must fail with `ReplayAttack` and leave the decrypted state zeroed.
#[test]
fn s3_garbage_rply_triggers_replay_attack() {
    let k1 = keypair(105);
    let k2 = keypair(106);
    let k1_engine = CryptoEngine::new(k1.clone());
    let k2_engine = CryptoEngine::new(k2.clone());

    let now = now_epoch();
    let block = Block::build(
        NewBlock {
            block_type: "con".into(),
            parent: None,
            content: b"secret".to_vec(),
            sign: true,
            encrypt_to: Some(k2.public_base64()),
            forward_enc: false,
            rply: Some("not-a-real-proof".into()),
            time: now,
        },
        &k1_engine,
    )
    .unwrap();

    let store = MemoryBlockStore::new();
    let cache = BlockCache::new(1 << 20, 1 << 20);
    block.save(&store, &cache);

    let mut reloaded = Block::load(block.hash(), &store, &cache).unwrap();
    let result = reloaded.decrypt(&k2_engine);
    assert!(matches!(result, Err(CoreError::ReplayAttack)));
    assert_eq!(reloaded.signer(), "");
}

/// S4: a three-block parent chain A <- B <- C reassembles child-first.
#[test]
fn s4_parent_chain_merges_content_child_first() {
    let k1 = keypair(107);
    let engine = CryptoEngine::new(k1);
    let store = MemoryBlockStore::new();
    let cache = BlockCache::new(1 << 20, 1 << 20);

    let a = Block::build(
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
        &engine,
    )
    .unwrap();
    a.save(&store, &cache);

    let b = Block::build(
        NewBlock {
            block_type: "bin".into(),
            parent: Some(a.hash().to_string()),
            content: B64.encode(b"B").into_bytes(),
            sign: false,
            encrypt_to: None,
            forward_enc: false,
            rply: None,
            time: 2,
        },
        &engine,
    )
    .unwrap();
    b.save(&store, &cache);

    let c = Block::build(
        NewBlock {
            block_type: "bin".into(),
            parent: Some(b.hash().to_string()),
            content: B64.encode(b"C").into_bytes(),
            sign: false,
            encrypt_to: None,
            forward_enc: false,
            rply: None,
            time: 3,
        },
        &engine,
    )
    .unwrap();
    c.save(&store, &cache);

    let merged = merge_chain(c.hash(), 10, &store, &cache).unwrap();
    assert_eq!(merged, b"CBA");
}

/// S5: a config value set and saved survives a fresh `ConfigStore::load` on
/// the same data directory, simulating a process restart.
#[test]
fn s5_config_value_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cfg = onionr_core::ConfigStore::load(dir.path());
        cfg.set("x.y", Some(serde_json::json!(1)), true);
    }
    let cfg = onionr_core::ConfigStore::load(dir.path());
    assert_eq!(cfg.get("x.y", serde_json::json!(null), false), serde_json::json!(1));
}

/// S6: with a cache total budget of 100 bytes, inserting 40-byte blocks A,
/// B, C in order evicts A (the oldest) before B.
#[test]
fn s6_cache_evicts_oldest_first_under_pressure() {
    let cache = BlockCache::new(40, 100);
    cache.insert("a", &[0u8; 40]);
    cache.insert("b", &[0u8; 40]);
    cache.insert("c", &[0u8; 40]);

    assert!(!cache.contains("a"));
    assert!(cache.contains("b"));
    assert!(cache.contains("c"));
}

/// Property 10 (idempotent decrypt) alongside S2: decrypting an
/// already-decrypted block twice yields the same result without error.
#[test]
fn decrypt_is_idempotent_after_first_success() {
    let k1 = keypair(108);
    let k2 = keypair(109);
    let k1_engine = CryptoEngine::new(k1);
    let k2_engine = CryptoEngine::new(k2.clone());

    let now = now_epoch();
    let block = Block::build(
        NewBlock {
            block_type: "con".into(),
            parent: None,
            content: b"again".to_vec(),
            sign: true,
            encrypt_to: Some(k2.public_base64()),
            forward_enc: false,
            rply: Some(now.to_string()),
            time: now,
        },
        &k1_engine,
    )
    .unwrap();

    let store = MemoryBlockStore::new();
    let cache = BlockCache::new(1 << 20, 1 << 20);
    block.save(&store, &cache);

    let mut reloaded = Block::load(block.hash(), &store, &cache).unwrap();
    assert!(reloaded.decrypt(&k2_engine).unwrap());
    assert!(reloaded.decrypt(&k2_engine).unwrap());
    assert_eq!(reloaded.content(), b"again");
}

/// `get_blocks` filtering by signer and type over a small store.
#[test]
fn get_blocks_filters_by_type_and_signer() {
    let k1 = keypair(110);
    let k2 = keypair(111);
    let engine1 = CryptoEngine::new(k1.clone());
    let engine2 = CryptoEngine::new(k2.clone());
    let store = MemoryBlockStore::new();
    let cache = BlockCache::new(1 << 20, 1 << 20);

    for (engine, kind, time) in [(&engine1, "bin", 1), (&engine2, "con", 2), (&engine1, "con", 3)] {
        let block = Block::build(
            NewBlock {
                block_type: kind.into(),
                parent: None,
                content: b"x".to_vec(),
                sign: true,
                encrypt_to: None,
                forward_enc: false,
                rply: None,
                time,
            },
            engine,
        )
        .unwrap();
        block.save(&store, &cache);
    }

    let k1_pub = k1.public_base64();
    let signers = [k1_pub.as_str()];
    let query = BlockQuery {
        block_type: Some("con"),
        signer: Some(&signers),
        ..Default::default()
    };
    let found = get_blocks(&query, &store, &cache).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].content(), b"x");
}
