//! Core primitives for a Tor-based, content-addressed P2P storage and
//! messaging network: the block model, its cryptographic envelope, the
//! local key manager, the hidden-service network controller, the ephemeral
//! bootstrap rendezvous, the dotted-path config store, and the plugin/event
//! surface. HTTP endpoints, the board UI, CLI add-file/get-file subcommands,
//! and the on-disk byte-store are collaborators maintained outside this
//! crate; see `block::BlockStore` for the narrow contract this crate expects
//! of that collaborator.

pub mod block;
pub mod bootstrap;
pub mod config;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod keypair;
pub mod keystore;
pub mod logging;
pub mod net;
pub mod plugins;

pub use block::{Block, BlockCache, BlockQuery, BlockStore, MemoryBlockStore, NewBlock};
pub use config::ConfigStore;
pub use crypto::CryptoEngine;
pub use error::{CoreError, CoreResult};
pub use keypair::Keypair;
pub use keystore::KeyManager;
pub use net::NetController;
pub use plugins::PluginManager;

/// Threads the process-level services through the core's operations in
/// place of the reference implementation's implicit globals (§9 design
/// notes): the active keypair, the block cache, the config tree, and the
/// plugin registry. Tests build their own private `CoreContext` rather than
/// sharing process-global state.
pub struct CoreContext {
    pub config: ConfigStore,
    pub crypto: CryptoEngine,
    pub cache: BlockCache,
    pub keys: KeyManager,
    pub plugins: PluginManager,
}

impl CoreContext {
    /// Builds a context rooted at `data_dir`, loading the config store from
    /// disk and sizing the block cache from `allocations.blockCache` /
    /// `allocations.block_cache_total` (falling back to generous defaults if
    /// unset).
    pub fn new(data_dir: impl Into<std::path::PathBuf>, active: Keypair) -> Self {
        let data_dir = data_dir.into();
        let config = ConfigStore::load(&data_dir);
        let per_block = config
            .get("allocations.blockCache", serde_json::json!(1 << 20), false)
            .as_u64()
            .unwrap_or(1 << 20) as usize;
        let total = config
            .get(
                "allocations.block_cache_total",
                serde_json::json!(32 << 20),
                false,
            )
            .as_u64()
            .unwrap_or(32 << 20) as usize;

        Self {
            config,
            crypto: CryptoEngine::new(active),
            cache: BlockCache::new(per_block, total),
            keys: KeyManager::new(&data_dir),
            plugins: PluginManager::new(&data_dir),
        }
    }
}
