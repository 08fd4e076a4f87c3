use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Deadlines and buffer limits for one probe exchange.
#[derive(Debug, Clone, Copy)]
pub struct CaptureSettings {
    pub write_timeout: Duration,
    pub read_timeout: Duration,
    pub buffer_size: usize,
    pub max_response_size: usize,
}

impl From<&EngineConfig> for CaptureSettings {
    fn from(config: &EngineConfig) -> Self {
        CaptureSettings {
            write_timeout: config.write_timeout(),
            read_timeout: config.read_timeout(),
            buffer_size: config.read_buffer_size,
            max_response_size: config.max_response_size,
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Sends `payload` (if any) and collects the reply.
///
/// Reads stop at a short read, EOF, the response cap or the read deadline. Only a failed write is
/// an error; a failed or timed-out read returns whatever arrived before it, possibly nothing.
pub async fn capture<S>(
    stream: &mut S,
    payload: &[u8],
    settings: &CaptureSettings,
    peer: &str,
) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if !payload.is_empty() {
        let write = async {
            stream.write_all(payload).await?;
            stream.flush().await
        };
        match timeout(settings.write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                return Err(EngineError::Capture {
                    addr: peer.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(EngineError::Capture {
                    addr: peer.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::TimedOut, "probe write timed out"),
                })
            }
        }
    }

    let buffer_size = settings.buffer_size.max(1);
    let mut buf = vec![0u8; buffer_size];
    let mut response = Vec::new();
    let deadline = Instant::now() + settings.read_timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, stream.read(&mut buf)).await {
            Err(_) => break,
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                response.extend_from_slice(&buf[..n]);
                if response.len() >= settings.max_response_size {
                    response.truncate(settings.max_response_size);
                    break;
                }
                if n < buffer_size {
                    break;
                }
            }
            Ok(Err(e)) => {
                debug!(peer, error = %e, bytes = response.len(), "read failed");
                break;
            }
        }
    }

    Ok(response)
}

pub fn http_get_request(host: &str) -> Vec<u8> {
    format!(
        "GET / HTTP/1.1\r\nHost: {}\r\nUser-Agent: probescope\r\nAccept: */*\r\nConnection: close\r\n\r\n",
        host
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn settings(read_ms: u64, buffer_size: usize, max: usize) -> CaptureSettings {
        CaptureSettings {
            write_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_millis(read_ms),
            buffer_size,
            max_response_size: max,
        }
    }

    #[tokio::test]
    async fn test_banner_only_read() {
        let (mut client, mut server) = duplex(1024);
        server.write_all(b"SSH-2.0-Test\r\n").await.unwrap();

        let bytes = capture(&mut client, &[], &settings(500, 2048, 8192), "test")
            .await
            .unwrap();
        assert_eq!(bytes, b"SSH-2.0-Test\r\n");
    }

    #[tokio::test]
    async fn test_probe_is_written_before_reading() {
        let (mut client, mut server) = duplex(1024);
        let echo = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            server.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"PING");
            server.write_all(b"+PONG\r\n").await.unwrap();
            server
        });

        let bytes = capture(&mut client, b"PING", &settings(1000, 2048, 8192), "test")
            .await
            .unwrap();
        assert_eq!(bytes, b"+PONG\r\n");
        drop(echo.await.unwrap());
    }

    #[tokio::test]
    async fn test_silent_peer_yields_empty_after_deadline() {
        let (mut client, _server) = duplex(64);
        let started = std::time::Instant::now();
        let bytes = capture(&mut client, &[], &settings(100, 64, 1024), "test")
            .await
            .unwrap();
        assert!(bytes.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_full_buffers_keep_reading_until_cap() {
        let (mut client, mut server) = duplex(4096);
        server.write_all(&[b'a'; 64]).await.unwrap();

        // 16-byte reads are all full, so reading continues until the 40-byte cap
        let bytes = capture(&mut client, &[], &settings(500, 16, 40), "test")
            .await
            .unwrap();
        assert_eq!(bytes.len(), 40);
    }

    #[tokio::test]
    async fn test_closed_peer_returns_empty() {
        let (mut client, server) = duplex(64);
        drop(server);
        let bytes = capture(&mut client, &[], &settings(500, 64, 1024), "test")
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_http_get_names_host() {
        let request = String::from_utf8(http_get_request("10.0.0.1")).unwrap();
        assert!(request.starts_with("GET / HTTP/1.1\r\n"));
        assert!(request.contains("Host: 10.0.0.1\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }
}
