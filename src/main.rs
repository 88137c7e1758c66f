// Thin binary entry point exercising the core from the command line. This is
// ambient plumbing (§10.3): it does not reimplement the external board/
// HTTP/file-transfer CLI subcommands that stay out of scope for this crate,
// it just gives the seven core components somewhere to be driven from.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use onionr_core::{
    CoreContext, Keypair,
    block::{Block, MemoryBlockStore, NewBlock},
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "onionr", about = "Anonymous P2P content-addressed storage core")]
struct Cli {
    /// Data directory; falls back to ONIONR_HOME, then DATA_DIR, then ./data/.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lists the public keys in the local keystore.
    ListKeys,
    /// Generates a fresh keypair and appends it to the local keystore.
    NewKey,
    /// Selects the active identity used for signing/decryption.
    UseKey { pubkey: String },
    /// Gets or sets a dotted-path config value.
    Config {
        key: String,
        /// When present, sets the value (as a JSON literal) instead of reading it.
        value: Option<String>,
    },
    /// Builds a signed plaintext "bin" block and prints its hash.
    Publish { content: String },
}

fn main() {
    onionr_core::logging::init_tracing();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(onionr_core::config::resolve_data_dir);

    let keys = onionr_core::KeyManager::new(&data_dir);
    let active = match keys.pubkey_list().ok().and_then(|l| l.into_iter().next()) {
        Some(pubkey) => {
            let priv_key = keys.privkey(&pubkey).ok().flatten();
            match priv_key.and_then(|p| Keypair::from_base64_seed(&p).ok()) {
                Some(kp) => kp,
                None => Keypair::generate(&mut rand::rngs::OsRng),
            }
        }
        None => Keypair::generate(&mut rand::rngs::OsRng),
    };

    let ctx = CoreContext::new(data_dir, active);

    let result = match cli.command {
        Command::ListKeys => ctx.keys.pubkey_list().map(|keys| {
            for k in keys {
                println!("{k}");
            }
        }),
        Command::NewKey => ctx.keys.add_key(None).map(|(pubkey, _)| {
            println!("{pubkey}");
        }),
        Command::UseKey { pubkey } => ctx.keys.change_active_key(&pubkey, &ctx.crypto),
        Command::Config { key, value } => {
            match value {
                Some(raw) => {
                    let parsed: serde_json::Value =
                        serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));
                    ctx.config.set(&key, Some(parsed), true);
                    Ok(())
                }
                None => {
                    println!("{}", ctx.config.get(&key, serde_json::Value::Null, false));
                    Ok(())
                }
            }
        }
        Command::Publish { content } => {
            let store = MemoryBlockStore::new();
            Block::build(
                NewBlock {
                    block_type: "bin".to_string(),
                    parent: None,
                    content: content.into_bytes(),
                    sign: true,
                    encrypt_to: None,
                    forward_enc: false,
                    rply: None,
                    time: std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .map(|d| d.as_secs() as i64)
                        .unwrap_or(0),
                },
                &ctx.crypto,
            )
            .map(|block| {
                block.save(&store, &ctx.cache);
                println!("{}", block.hash());
            })
        }
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        std::process::exit(1);
    }
    info!("done");
}
