//! Local pairing listener.
//!
//! Tools report what they did over a Unix socket as newline-delimited JSON.
//! The listener writes one log line per report to a shared sink.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One report from a paired tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingAction {
    #[serde(default)]
    pub task_id: String,
    pub action: String,
    #[serde(default)]
    pub source: String,
}

impl PairingAction {
    pub fn new(
        task_id: impl Into<String>,
        action: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            action: action.into(),
            source: source.into(),
        }
    }

    /// The line written to the sink for this report
    pub fn log_line(&self) -> String {
        format!(" [LOG] Tool: {} | Action: {}\n", self.source, self.action)
    }
}

/// A bound pairing socket, ready to serve
pub struct PairingListener {
    listener: UnixListener,
    path: PathBuf,
}

impl PairingListener {
    /// Bind `path`, replacing a stale socket file left by a previous run.
    pub fn bind(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale pairing socket"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        let listener = UnixListener::bind(&path)?;
        info!(path = %path.display(), "pairing listener bound");
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections forever, one task per connection.
    ///
    /// Writes to `sink` are serialized by its mutex. Accept errors are logged
    /// and the loop continues.
    pub async fn serve<W>(self, sink: Arc<Mutex<W>>) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        loop {
            let (stream, _) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(err) => {
                    warn!(error = %err, "pairing accept failed");
                    continue;
                }
            };
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, sink).await {
                    debug!(error = %err, "pairing connection closed with error");
                }
            });
        }
    }
}

async fn handle_connection<W>(stream: UnixStream, sink: Arc<Mutex<W>>) -> io::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PairingAction>(&line) {
            Ok(action) => {
                info!(
                    task_id = %action.task_id,
                    source = %action.source,
                    action = %action.action,
                    "pairing report"
                );
                let mut out = sink.lock().await;
                out.write_all(action.log_line().as_bytes()).await?;
                out.flush().await?;
            }
            Err(err) => warn!(error = %err, "ignoring malformed pairing report"),
        }
    }
    Ok(())
}

/// Bind `path` and serve until the process exits.
pub async fn serve<W>(path: impl AsRef<Path>, sink: Arc<Mutex<W>>) -> io::Result<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    PairingListener::bind(path)?.serve(sink).await
}

/// Send one report. Succeeds silently when no listener is running.
pub async fn report(path: impl AsRef<Path>, action: &PairingAction) -> io::Result<()> {
    let mut stream = match UnixStream::connect(path.as_ref()).await {
        Ok(stream) => stream,
        Err(err) => {
            debug!(error = %err, "no pairing listener, report dropped");
            return Ok(());
        }
    };
    let mut line = serde_json::to_vec(action).map_err(io::Error::other)?;
    line.push(b'\n');
    stream.write_all(&line).await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_line_format() {
        let action = PairingAction::new("t1", "edit src/lib.rs", "editor");
        assert_eq!(action.log_line(), " [LOG] Tool: editor | Action: edit src/lib.rs\n");
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let action: PairingAction = serde_json::from_str(r#"{"action":"run"}"#).unwrap();
        assert_eq!(action.action, "run");
        assert!(action.task_id.is_empty());
    }

    #[tokio::test]
    async fn test_report_without_listener_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sock");
        report(&path, &PairingAction::new("t", "a", "s")).await.unwrap();
    }
}
