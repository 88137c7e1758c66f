// Hidden-service network controller: torrc synthesis, transport lifecycle
// (spawn / bootstrap-detect / kill), and port allocation. Grounded on
// `netcontroller.py`.

pub mod control;

use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::error::{CoreError, CoreResult};

/// Lifecycle state of the anonymizing transport, per the state machine in
/// the network-controller design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Init,
    Configuring,
    Starting,
    Bootstrapping,
    Ready,
    Stopping,
    Stopped,
}

/// Binds an OS-chosen ephemeral port on loopback, reads it back, then closes
/// the socket. Accepts the small TOCTOU risk of the port being reused before
/// the transport binds it, matching `netcontroller.py::getOpenPort`.
pub fn get_open_port() -> CoreResult<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Resolves the transport binary: `./tor` first, then `tor` on `PATH`,
/// matching `netcontroller.py::torBinary`'s local-override-before-PATH order.
pub fn resolve_tor_binary() -> PathBuf {
    let local = PathBuf::from("./tor");
    if local.is_file() {
        return local;
    }
    PathBuf::from("tor")
}

pub struct NetController {
    data_dir: PathBuf,
    torrc_path: PathBuf,
    pub socks_port: u16,
    pub hs_port: u16,
    pub control_port: u16,
    control_password: String,
    api_ip: String,
    tor_binary: PathBuf,
    pub state: TransportState,
    pub ready: bool,
    pub onion_address: String,
    child: Option<std::process::Child>,
}

impl NetController {
    pub fn new(data_dir: impl Into<PathBuf>, hs_port: u16) -> CoreResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            torrc_path: data_dir.join("torrc"),
            socks_port: get_open_port()?,
            hs_port,
            control_port: get_open_port()?,
            control_password: String::new(),
            api_ip: "127.0.0.1".to_string(),
            tor_binary: resolve_tor_binary(),
            data_dir,
            state: TransportState::Init,
            ready: false,
            onion_address: String::new(),
            child: None,
        })
    }

    fn pid_file(&self) -> PathBuf {
        self.data_dir.join("torPid.txt")
    }

    /// Synthesizes the torrc: random control password, persisted ports,
    /// hashed password via `tor --hash-password`, and (only at security
    /// level 0) a long-lived hidden service block.
    pub fn generate_torrc(&mut self, config: &ConfigStore) -> CoreResult<()> {
        self.state = TransportState::Configuring;

        let mut token = [0u8; 50];
        OsRng.fill_bytes(&mut token);
        self.control_password = B64.encode(token);
        config.set(
            "tor.controlpassword",
            Some(serde_json::json!(self.control_password)),
            true,
        );
        config.set(
            "tor.socksport",
            Some(serde_json::json!(self.socks_port)),
            true,
        );
        config.set(
            "tor.controlPort",
            Some(serde_json::json!(self.control_port)),
            true,
        );

        let hashed = self.hash_control_password()?;

        let tor_data_dir = self.data_dir.join("tordata");
        let mut torrc = format!(
            "SocksPort {} OnionTrafficOnly\nDataDirectory {}\nCookieAuthentication 1\nControlPort {}\nHashedControlPassword {}\n",
            self.socks_port,
            tor_data_dir.display(),
            self.control_port,
            hashed,
        );

        let security_level = config
            .get("general.security_level", serde_json::json!(1), false)
            .as_i64()
            .unwrap_or(1);
        if security_level == 0 {
            let v3 = config
                .get("tor.v3onions", serde_json::json!(true), false)
                .as_bool()
                .unwrap_or(true);
            let hs_dir = self.data_dir.join("hs");
            torrc.push_str(&format!("HiddenServiceDir {}\n", hs_dir.display()));
            if v3 {
                torrc.push_str("HiddenServiceVersion 3\n");
            } else {
                torrc.push_str("# HiddenServiceVersion 2\n");
            }
            torrc.push_str(&format!(
                "HiddenServicePort 80 {}:{}\n",
                self.api_ip, self.hs_port
            ));
        }

        if self.torrc_path.exists() {
            std::fs::remove_file(&self.torrc_path)?;
        }
        std::fs::write(&self.torrc_path, torrc)?;
        Ok(())
    }

    fn hash_control_password(&self) -> CoreResult<String> {
        let output = Command::new(&self.tor_binary)
            .arg("--hash-password")
            .arg(&self.control_password)
            .output()
            .map_err(|e| CoreError::NetworkStartup(format!("failed to run tor binary: {e}")))?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.lines()
            .find(|line| !line.to_lowercase().contains("warn"))
            .map(str::to_string)
            .ok_or_else(|| CoreError::NetworkStartup("tor --hash-password produced no usable line".into()))
    }

    /// Spawns the transport with `-f torrc`, verifies its version isn't the
    /// unsupported `0.2.` series, then streams stdout until `bootstrapped
    /// 100%` or the process exits without reaching it. Honors Ctrl-C during
    /// the bootstrap wait.
    pub async fn start(&mut self, config: &ConfigStore) -> CoreResult<()> {
        self.generate_torrc(config)?;
        self.state = TransportState::Starting;

        let version_output = Command::new(&self.tor_binary).arg("--version").output();
        match version_output {
            Ok(out) => {
                let text = String::from_utf8_lossy(&out.stdout);
                if text.contains("Tor 0.2.") {
                    self.state = TransportState::Stopped;
                    return Err(CoreError::NetworkStartup(
                        "transport version 0.2.x is unsupported, need >= 0.3".into(),
                    ));
                }
            }
            Err(e) => {
                self.state = TransportState::Stopped;
                return Err(CoreError::NetworkStartup(format!(
                    "transport binary not found: {e}"
                )));
            }
        }

        let mut child = Command::new(&self.tor_binary)
            .arg("-f")
            .arg(&self.torrc_path)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| CoreError::NetworkStartup(format!("failed to spawn transport: {e}")))?;

        self.state = TransportState::Bootstrapping;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::NetworkStartup("transport stdout not captured".into()))?;

        let bootstrap = tokio::task::spawn_blocking(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(_) => break,
                };
                debug!(target: "tor", "{line}");
                if line.to_lowercase().contains("bootstrapped 100") {
                    return true;
                }
            }
            false
        });

        let bootstrapped = tokio::select! {
            res = bootstrap => res.unwrap_or(false),
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted while waiting for transport bootstrap");
                let _ = child.kill();
                self.state = TransportState::Stopped;
                return Err(CoreError::NetworkStartup("interrupted during bootstrap".into()));
            }
        };

        if !bootstrapped {
            let _ = child.kill();
            self.state = TransportState::Stopped;
            return Err(CoreError::NetworkStartup(
                "transport exited without completing bootstrap (stray instance or permissions?)"
                    .into(),
            ));
        }

        self.onion_address = std::fs::read_to_string(self.data_dir.join("hs/hostname"))
            .unwrap_or_default()
            .trim()
            .to_string();

        std::fs::write(self.pid_file(), child.id().unwrap_or(0).to_string())?;
        self.child = Some(child);
        self.ready = true;
        self.state = TransportState::Ready;
        info!(
            onion = %self.onion_address,
            at = %crate::logging::human_time(now_epoch()),
            "transport bootstrapped"
        );
        Ok(())
    }

    /// Reads the PID file and sends a termination signal, tolerating
    /// permission errors and an already-gone process, then removes the PID
    /// file, matching `netcontroller.py::killTor`'s tolerant teardown.
    pub fn stop(&mut self) -> CoreResult<()> {
        self.state = TransportState::Stopping;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        } else if let Ok(contents) = std::fs::read_to_string(self.pid_file()) {
            if let Ok(pid) = contents.trim().parse::<i32>() {
                kill_pid(pid);
            }
        }
        let _ = std::fs::remove_file(self.pid_file());
        self.ready = false;
        self.state = TransportState::Stopped;
        Ok(())
    }

    pub fn control_password(&self) -> &str {
        &self.control_password
    }
}

fn now_epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Sends SIGTERM to `pid` via the `kill` utility; a missing process or
/// denied permission (Windows-style) is tolerated rather than propagated,
/// matching `netcontroller.py::killTor`'s tolerant teardown.
fn kill_pid(pid: i32) {
    let _ = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_port_is_bindable_and_nonzero() {
        let port = get_open_port().unwrap();
        assert!(port > 0);
    }

    #[test]
    fn torrc_synthesis_writes_expected_directives() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::load(dir.path());
        let mut controller = NetController::new(dir.path(), 9999).unwrap();
        controller.tor_binary = PathBuf::from("tor"); // may be absent; hashing falls back below
        // Skip hashing when no real tor binary is present in this environment.
        if Command::new(&controller.tor_binary).arg("--version").output().is_err() {
            return;
        }
        controller.generate_torrc(&config).unwrap();
        let text = std::fs::read_to_string(dir.path().join("torrc")).unwrap();
        assert!(text.contains("SocksPort"));
        assert!(text.contains("ControlPort"));
    }

    #[test]
    fn security_level_zero_emits_hidden_service_block() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::load(dir.path());
        config.set("general.security_level", Some(serde_json::json!(0)), false);
        let mut controller = NetController::new(dir.path(), 9999).unwrap();
        if Command::new(&controller.tor_binary).arg("--version").output().is_err() {
            return;
        }
        controller.generate_torrc(&config).unwrap();
        let text = std::fs::read_to_string(dir.path().join("torrc")).unwrap();
        assert!(text.contains("HiddenServiceDir"));
    }
}
