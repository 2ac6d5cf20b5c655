use std::{fmt, future::Future, io, net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::{TcpListener, ToSocketAddrs},
    signal,
    task::JoinSet,
    time,
};

use crate::{Result, ServerErr};

/// The pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How accepted clients are served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServeMode {
    /// One client at a time, the next accept waits for the current send.
    Sequential,
    /// One task per client.
    #[default]
    Spawn,
}

impl FromStr for ServeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "spawn" => Ok(Self::Spawn),
            other => Err(format!("unknown serve mode {other}, expected spawn or sequential")),
        }
    }
}

impl fmt::Display for ServeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeMode::Sequential => write!(f, "sequential"),
            ServeMode::Spawn => write!(f, "spawn"),
        }
    }
}

/// The lifecycle of a single client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Accepted,
    Sending { sent: usize },
    Closed,
}

/// Pushes the whole artifact down one stream, then closes its write side.
///
/// Nothing is ever read from the client.
struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    artifact: Arc<[u8]>,
    state: ConnState,
}

impl<S: AsyncWrite + Unpin> Connection<S> {
    fn new(stream: S, peer: SocketAddr, artifact: Arc<[u8]>) -> Self {
        Self {
            stream,
            peer,
            artifact,
            state: ConnState::Accepted,
        }
    }

    /// Drives the connection until it's closed or `deadline` expires.
    ///
    /// # Returns
    /// The amount of bytes sent or a `Connection` error for this peer.
    async fn serve(mut self, deadline: Duration) -> Result<usize> {
        let peer = self.peer;

        match time::timeout(deadline, self.drive()).await {
            Ok(Ok(sent)) => {
                info!("served {sent} bytes to {peer}");
                Ok(sent)
            }
            Ok(Err(source)) => Err(ServerErr::Connection { peer, source }),
            Err(_) => Err(ServerErr::Connection {
                peer,
                source: io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("the send did not complete within {deadline:?}"),
                ),
            }),
        }
    }

    async fn drive(&mut self) -> io::Result<usize> {
        let total = self.artifact.len();

        loop {
            self.state = match self.state {
                ConnState::Accepted => ConnState::Sending { sent: 0 },
                ConnState::Sending { sent } if sent == total => {
                    self.stream.flush().await?;
                    self.stream.shutdown().await?;
                    ConnState::Closed
                }
                ConnState::Sending { sent } => {
                    let n = self.stream.write(&self.artifact[sent..]).await?;
                    if n == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::WriteZero,
                            format!("the client stopped accepting bytes after {sent} of {total}"),
                        ));
                    }

                    ConnState::Sending { sent: sent + n }
                }
                ConnState::Closed => return Ok(total),
            };
        }
    }
}

/// Serves a fixed artifact buffer to every client that connects.
pub struct ArtifactServer {
    listener: TcpListener,
    artifact: Arc<[u8]>,
    mode: ServeMode,
    write_timeout: Duration,
}

impl ArtifactServer {
    /// Binds the listener, nothing is served until `run` is called.
    ///
    /// # Arguments
    /// * `addr` - The address to listen at.
    /// * `artifact` - The encoded artifact, shared read only by every client.
    ///
    /// # Returns
    /// The server or a `Bind` error.
    pub async fn bind<A>(addr: A, artifact: impl Into<Arc<[u8]>>) -> Result<Self>
    where
        A: ToSocketAddrs + fmt::Display,
    {
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerErr::Bind {
                addr: addr.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            artifact: artifact.into(),
            mode: ServeMode::default(),
            write_timeout: Duration::from_secs(30),
        })
    }

    pub fn mode(mut self, mode: ServeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts clients until `shutdown` resolves.
    ///
    /// Failed clients and failed accepts are logged and skipped. Once
    /// `shutdown` fires the listener is closed and the in flight sends are
    /// awaited, each one bounded by the write timeout.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(
            "listening at {addr}, serving {} bytes ({} mode)",
            self.artifact.len(),
            self.mode
        );

        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("failed to accept a connection: {e}");
                            time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    debug!("accepted {peer}");
                    let conn = Connection::new(stream, peer, self.artifact.clone());

                    match self.mode {
                        ServeMode::Sequential => report(conn.serve(self.write_timeout).await),
                        ServeMode::Spawn => {
                            tasks.spawn(conn.serve(self.write_timeout));
                        }
                    }
                }
            }

            while let Some(joined) = tasks.try_join_next() {
                reap(joined);
            }
        }

        drop(self.listener);
        info!("no longer accepting, waiting for {} in flight sends", tasks.len());

        while let Some(joined) = tasks.join_next().await {
            reap(joined);
        }

        Ok(())
    }
}

fn report(served: Result<usize>) {
    if let Err(e) = served {
        warn!("{e}");
    }
}

fn reap(joined: std::result::Result<Result<usize>, tokio::task::JoinError>) {
    match joined {
        Ok(served) => report(served),
        Err(e) => warn!("a client task failed: {e}"),
    }
}

/// Resolves on ctrl-c or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Binds `host:port` and serves `artifact` until ctrl-c or SIGTERM.
pub async fn serve(
    host: &str,
    port: u16,
    artifact: Arc<[u8]>,
    mode: ServeMode,
    write_timeout: Duration,
) -> Result<()> {
    ArtifactServer::bind(format!("{host}:{port}"), artifact)
        .await?
        .mode(mode)
        .write_timeout(write_timeout)
        .run(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, duplex};

    use super::*;

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 4242))
    }

    fn artifact(len: usize) -> Arc<[u8]> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn short_writes_are_resumed() {
        let buf = artifact(10_000);
        // The pipe holds far less than the artifact, every write is partial.
        let (tx, mut rx) = duplex(64);

        let conn = Connection::new(tx, peer(), buf.clone());
        let send = tokio::spawn(conn.serve(Duration::from_secs(5)));

        let mut received = Vec::new();
        rx.read_to_end(&mut received).await.unwrap();

        assert_eq!(send.await.unwrap().unwrap(), buf.len());
        assert_eq!(received, &buf[..]);
    }

    #[tokio::test]
    async fn empty_artifact_closes_right_away() {
        let (tx, mut rx) = duplex(64);
        let sent = Connection::new(tx, peer(), artifact(0))
            .serve(Duration::from_secs(1))
            .await
            .unwrap();

        let mut received = Vec::new();
        rx.read_to_end(&mut received).await.unwrap();

        assert_eq!(sent, 0);
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn dropped_reader_is_a_connection_error() {
        let (tx, rx) = duplex(64);
        drop(rx);

        let err = Connection::new(tx, peer(), artifact(1024))
            .serve(Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, ServerErr::Connection { peer: p, .. } if p == peer()));
        assert!(!err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_reader_hits_the_deadline() {
        // Keep the reader alive but never read from it.
        let (tx, _rx) = duplex(64);

        let err = Connection::new(tx, peer(), artifact(1024))
            .serve(Duration::from_millis(100))
            .await
            .unwrap_err();

        let ServerErr::Connection { source, .. } = err else {
            panic!("expected a connection error, got {err:?}");
        };
        assert_eq!(source.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn serve_mode_from_str() {
        assert_eq!("spawn".parse(), Ok(ServeMode::Spawn));
        assert_eq!("Sequential".parse(), Ok(ServeMode::Sequential));
        assert!("pool".parse::<ServeMode>().is_err());
    }
}
