use async_trait::async_trait;
use futures::future::join_all;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::scanner::results::{PortResult, Target};

/// Plain TCP connect with a deadline. Refusal, unreachability and timeouts all surface as
/// `EngineError::Connect`, which callers read as "closed".
pub async fn connect(target: Target, deadline: Duration) -> Result<TcpStream> {
    match timeout(deadline, TcpStream::connect(target.socket_addr())).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(EngineError::Connect {
            addr: target.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(EngineError::Connect {
            addr: target.to_string(),
            reason: format!("timed out after {}ms", deadline.as_millis()),
        }),
    }
}

/// Receives every connection the sweep opens. The stream is closed when the handler drops it.
#[async_trait]
pub trait OpenPortHandler: Send + Sync {
    async fn on_open(&self, target: Target, stream: TcpStream) -> PortResult;
}

/// Connect sweep over one host, bounded by a semaphore that may be shared across hosts.
#[derive(Clone)]
pub struct PortScanner {
    semaphore: Arc<Semaphore>,
    politeness: Duration,
}

impl PortScanner {
    pub fn new(semaphore: Arc<Semaphore>, politeness: Duration) -> Self {
        Self {
            semaphore,
            politeness,
        }
    }

    pub fn with_limit(max_concurrency: usize, politeness: Duration) -> Self {
        Self::new(Arc::new(Semaphore::new(max_concurrency.max(1))), politeness)
    }

    /// Connects to every port and returns the results of the open ones, in no particular order.
    ///
    /// A unit holds its permit through connect, the handler and the politeness sleep. Once `cancel`
    /// fires no further units are admitted; units already running finish normally.
    pub async fn scan(
        &self,
        host: IpAddr,
        ports: &[u16],
        connect_timeout: Duration,
        handler: Arc<dyn OpenPortHandler>,
        cancel: &CancellationToken,
    ) -> Vec<PortResult> {
        let mut tasks = Vec::with_capacity(ports.len());

        for &port in ports {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(%host, admitted = tasks.len(), total = ports.len(), "scan cancelled");
                    break;
                }
                permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let target = Target::new(host, port);
            let handler = Arc::clone(&handler);
            let politeness = self.politeness;

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let result = match connect(target, connect_timeout).await {
                    Ok(stream) => {
                        debug!(%target, "port open");
                        Some(handler.on_open(target, stream).await)
                    }
                    Err(e) => {
                        debug!(error = %e, "port closed");
                        None
                    }
                };
                if !politeness.is_zero() {
                    sleep(politeness).await;
                }
                result
            }));
        }

        join_all(tasks)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!(%host, error = %e, "scan unit aborted");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    struct Recorder {
        active: AtomicUsize,
        peak: AtomicUsize,
        hold: Duration,
    }

    impl Recorder {
        fn new(hold: Duration) -> Arc<Self> {
            Arc::new(Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                hold,
            })
        }
    }

    #[async_trait]
    impl OpenPortHandler for Recorder {
        async fn on_open(&self, target: Target, _stream: TcpStream) -> PortResult {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(self.hold).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            PortResult::open(target.port)
        }
    }

    async fn listeners(n: usize) -> (Vec<TcpListener>, Vec<u16>) {
        let mut listeners = Vec::new();
        let mut ports = Vec::new();
        for _ in 0..n {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            ports.push(listener.local_addr().unwrap().port());
            listeners.push(listener);
        }
        (listeners, ports)
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_refused_port_is_not_reported() {
        let (_keep, mut ports) = listeners(1).await;
        let open = ports[0];
        ports.push(closed_port().await);

        let scanner = PortScanner::with_limit(4, Duration::ZERO);
        let handler = Recorder::new(Duration::ZERO);
        let results = scanner
            .scan(
                "127.0.0.1".parse().unwrap(),
                &ports,
                Duration::from_millis(500),
                handler,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].port, open);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let (_keep, ports) = listeners(6).await;
        let scanner = PortScanner::with_limit(2, Duration::from_millis(1));
        let handler = Recorder::new(Duration::from_millis(50));

        let results = scanner
            .scan(
                "127.0.0.1".parse().unwrap(),
                &ports,
                Duration::from_millis(500),
                handler.clone(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(results.len(), 6);
        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancelled_token_admits_nothing() {
        let (_keep, ports) = listeners(3).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let results = PortScanner::with_limit(4, Duration::ZERO)
            .scan(
                "127.0.0.1".parse().unwrap(),
                &ports,
                Duration::from_millis(500),
                Recorder::new(Duration::ZERO),
                &cancel,
            )
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_connect_error_names_address() {
        let port = closed_port().await;
        let target = Target::new("127.0.0.1".parse().unwrap(), port);
        match connect(target, Duration::from_millis(500)).await {
            Err(EngineError::Connect { addr, .. }) => assert_eq!(addr, target.to_string()),
            other => panic!("expected connect error, got {:?}", other.map(|_| ())),
        }
    }
}
