use tokio::net::UnixStream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use crate::{Result, Context};
use crate::common::SOCKET_PATH;

const BANNER: &str = "OK ALTSCREEN IPC";

pub struct IpcClient {
    socket_path: String,
}

/// Drop the greeting and the `BYE` that closes every exchange.
fn strip_framing(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().collect();
    if lines.first() == Some(&BANNER) {
        lines.remove(0);
    }
    if lines.last() == Some(&"BYE") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

impl IpcClient {
    pub fn new() -> Self {
        Self::with_path(SOCKET_PATH)
    }

    pub fn with_path(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub async fn send(&self, command: &str) -> Result<String> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .context("Failed to connect to daemon. Is it running?")?;

        // QUIT makes the daemon close the stream once the reply is written.
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\nQUIT\n").await?;

        let mut response = String::new();
        stream.read_to_string(&mut response).await?;

        Ok(strip_framing(&response))
    }

    pub async fn is_alive(&self) -> bool {
        UnixStream::connect(&self.socket_path).await.is_ok()
    }

    pub async fn ping(&self) -> Result<bool> {
        match self.send("PING").await {
            Ok(resp) => Ok(resp.contains("PONG")),
            Err(_) => Ok(false),
        }
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}
