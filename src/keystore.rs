// Local keypair store: `<data_dir>/keys.txt`, one `pub,priv\n` record per
// line, no header, no escaping. Grounded on `keymanager.py`.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::crypto::CryptoEngine;
use crate::error::{CoreError, CoreResult};
use crate::keypair::Keypair;

/// Manages the on-disk `pub,priv` key list and the active-identity switch on
/// a `CryptoEngine`.
pub struct KeyManager {
    key_file: PathBuf,
    lock: Mutex<()>,
}

impl KeyManager {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            key_file: data_dir.as_ref().join("keys.txt"),
            lock: Mutex::new(()),
        }
    }

    /// Adds `(pub, priv)` to the key file, generating a fresh pair when both
    /// are absent. Rejects a duplicate public key. Tolerates an absent file
    /// on first add.
    pub fn add_key(&self, pair: Option<(String, String)>) -> CoreResult<(String, String)> {
        let _guard = self.lock.lock();
        let (pub_key, priv_key) = match pair {
            Some(p) => p,
            None => {
                let kp = CryptoEngine::generate_keypair();
                (kp.public_base64(), kp.private_base64())
            }
        };

        if self.pubkey_list_unlocked()?.contains(&pub_key) {
            return Err(CoreError::KeyExists(pub_key));
        }

        let mut contents = match fs::read_to_string(&self.key_file) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        contents.push_str(&pub_key);
        contents.push(',');
        contents.push_str(&priv_key);
        contents.push('\n');
        if let Some(parent) = self.key_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.key_file, contents)?;
        Ok((pub_key, priv_key))
    }

    /// Rewrites the file without the line whose first field matches `pub_key`.
    /// Returns `false` if no such key existed.
    pub fn remove_key(&self, pub_key: &str) -> CoreResult<bool> {
        let _guard = self.lock.lock();
        let contents = match fs::read_to_string(&self.key_file) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut found = false;
        let kept: Vec<&str> = contents
            .lines()
            .filter(|line| {
                if line.is_empty() {
                    return false;
                }
                let first = line.split(',').next().unwrap_or("");
                if first == pub_key {
                    found = true;
                    false
                } else {
                    true
                }
            })
            .collect();

        if !found {
            return Ok(false);
        }

        let mut out = kept.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        fs::write(&self.key_file, out)?;
        Ok(true)
    }

    /// Returns the public keys, in file order.
    pub fn pubkey_list(&self) -> CoreResult<Vec<String>> {
        let _guard = self.lock.lock();
        self.pubkey_list_unlocked()
    }

    fn pubkey_list_unlocked(&self) -> CoreResult<Vec<String>> {
        match fs::read_to_string(&self.key_file) {
            Ok(contents) => Ok(contents
                .lines()
                .filter(|l| !l.is_empty())
                .filter_map(|l| l.split(',').next())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the private key paired with `pub_key`, matched exactly on the
    /// line's first field (unlike the substring match in the Python
    /// original, which could match an unrelated key sharing a substring).
    pub fn privkey(&self, pub_key: &str) -> CoreResult<Option<String>> {
        let _guard = self.lock.lock();
        let contents = match fs::read_to_string(&self.key_file) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        for line in contents.lines() {
            let mut parts = line.splitn(2, ',');
            if let (Some(p), Some(priv_k)) = (parts.next(), parts.next()) {
                if p == pub_key {
                    return Ok(Some(priv_k.to_string()));
                }
            }
        }
        Ok(None)
    }

    /// Requires `pub_key` to exist, then swaps `engine`'s active keypair.
    pub fn change_active_key(&self, pub_key: &str, engine: &CryptoEngine) -> CoreResult<()> {
        if !self.pubkey_list()?.contains(&pub_key.to_string()) {
            return Err(CoreError::KeyNotKnown(pub_key.to_string()));
        }
        let priv_key = self
            .privkey(pub_key)?
            .ok_or_else(|| CoreError::KeyNotKnown(pub_key.to_string()))?;
        let kp = Keypair::from_base64_seed(&priv_key)?;
        engine.set_active(kp);
        Ok(())
    }
}
