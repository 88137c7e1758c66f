// A minimal async client for the transport's control port, covering just
// the two operations the bootstrap rendezvous needs: password
// authentication and publishing an ephemeral hidden service (the
// `ADD_ONION` equivalent referenced in the spec's bootstrap component).

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{CoreError, CoreResult};

pub struct ControlClient {
    stream: BufReader<TcpStream>,
}

impl ControlClient {
    pub async fn connect(control_port: u16) -> CoreResult<Self> {
        let stream = TcpStream::connect(("127.0.0.1", control_port)).await?;
        Ok(Self {
            stream: BufReader::new(stream),
        })
    }

    async fn command(&mut self, line: &str) -> CoreResult<String> {
        self.stream.get_mut().write_all(line.as_bytes()).await?;
        self.stream.get_mut().write_all(b"\r\n").await?;
        let mut response = String::new();
        self.stream.read_line(&mut response).await?;
        Ok(response)
    }

    /// `AUTHENTICATE "<password>"` against the control port.
    pub async fn authenticate(&mut self, password: &str) -> CoreResult<()> {
        let resp = self.command(&format!("AUTHENTICATE \"{password}\"")).await?;
        if resp.starts_with("250") {
            Ok(())
        } else {
            Err(CoreError::NetworkStartup(format!(
                "control port authentication rejected: {}",
                resp.trim()
            )))
        }
    }

    /// Publishes a new ephemeral v3 onion service forwarding `external_port`
    /// to `local_port`, analogous to `stem`'s
    /// `create_ephemeral_hidden_service(..., key_type="NEW", key_content="ED25519-V3")`.
    /// Returns the service id (without the `.onion` suffix).
    pub async fn add_ephemeral_onion(
        &mut self,
        external_port: u16,
        local_port: u16,
    ) -> CoreResult<String> {
        let cmd = format!(
            "ADD_ONION NEW:ED25519-V3 Flags=DiscardPK Port={external_port},{local_port}"
        );
        let resp = self.command(&cmd).await?;
        if !resp.starts_with("250") {
            return Err(CoreError::NetworkStartup(format!(
                "ADD_ONION failed: {}",
                resp.trim()
            )));
        }
        // Real control-port replies are multi-line; a complete client would
        // keep reading until the final "250 OK". This minimal client reads
        // the `ServiceID=` line, which stem surfaces as `response.service_id`.
        let mut service_id = None;
        loop {
            let mut line = String::new();
            let n = self.stream.read_line(&mut line).await?;
            if n == 0 {
                break;
            }
            if let Some(rest) = line.trim().strip_prefix("250-ServiceID=") {
                service_id = Some(rest.to_string());
            }
            if line.trim() == "250 OK" {
                break;
            }
        }
        service_id.ok_or_else(|| {
            CoreError::NetworkStartup("ADD_ONION response missing ServiceID".into())
        })
    }
}
