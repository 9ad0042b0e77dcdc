//! Liveness probing of machine status endpoints

use std::time::Duration;
use tracing::debug;

/// Probes a machine's status URL to decide whether it is awake.
///
/// Any HTTP response at all counts as awake; the status code and body are
/// not inspected. A timeout, DNS failure or refused connection all mean
/// "not awake yet" rather than an error, since the question being asked is
/// only whether the machine is reachable.
pub struct StatusProbe {
    client: reqwest::Client,
}

impl StatusProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub async fn is_awake(&self, status_url: &str) -> bool {
        match self.client.get(status_url).send().await {
            Ok(response) => {
                debug!(url = status_url, status = %response.status(), "Status endpoint responded");
                true
            }
            Err(e) => {
                debug!(url = status_url, error = %e, "Status endpoint unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(listener: TcpListener, status_line: &'static str) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).await;
        let response = format!("HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let _ = stream.write_all(response.as_bytes()).await;
    }

    #[tokio::test]
    async fn test_any_response_counts_as_awake() {
        for status_line in ["200 OK", "500 Internal Server Error", "404 Not Found"] {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            tokio::spawn(serve_once(listener, status_line));

            let probe = StatusProbe::new(Duration::from_secs(1)).unwrap();
            assert!(
                probe.is_awake(&format!("http://127.0.0.1:{port}/")).await,
                "{status_line} should count as awake"
            );
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_not_awake() {
        // Bind then drop to get a port nothing is listening on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = StatusProbe::new(Duration::from_secs(1)).unwrap();
        assert!(!probe.is_awake(&format!("http://127.0.0.1:{port}/")).await);
    }

    #[tokio::test]
    async fn test_timeout_is_not_awake() {
        // Accept the connection but never respond
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let probe = StatusProbe::new(Duration::from_millis(200)).unwrap();
        assert!(!probe.is_awake(&format!("http://127.0.0.1:{port}/")).await);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_not_awake() {
        let probe = StatusProbe::new(Duration::from_secs(1)).unwrap();
        assert!(!probe.is_awake("http://wolgate-test.invalid/").await);
    }
}
