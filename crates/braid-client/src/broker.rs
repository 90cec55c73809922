//! Pooled broker connection.
//!
//! A [`Broker`] owns a bounded pool of TCP connections to one broker
//! address and serializes one request/response exchange at a time over a
//! borrowed connection. The pool is created lazily on first use and torn
//! down by [`Broker::close`]; a later exchange recreates it from scratch.
//!
//! Failure semantics: dial errors, write errors, read errors, deadline
//! expiry, and pool-acquisition timeouts all surface as the connectivity
//! error kind ([`Error::is_connectivity`]). No retry happens here — retry
//! is a policy decision made by the metadata client's bootstrap loop and
//! the producer's partition loop.

use std::sync::Arc;

use braid_protocol::{Request, Response, MAX_MESSAGE_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::debug;

use crate::config::BrokerConfig;
use crate::error::{Error, Result};

/// A pooled connection to a single broker node.
#[derive(Debug)]
pub struct Broker {
    config: BrokerConfig,
    pool: Mutex<Option<Arc<ConnectionPool>>>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            pool: Mutex::new(None),
        }
    }

    /// Address this broker is reachable at (`host:port`).
    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    /// Send a request and wait for its response, bounded by the configured
    /// I/O timeout on every step.
    pub async fn exchange(&self, req: &Request) -> Result<Response> {
        match self.do_exchange(req, true).await? {
            Some(resp) => Ok(resp),
            None => Err(Error::UnexpectedResponse),
        }
    }

    /// Send a request without waiting for a response (fire-and-forget,
    /// e.g. produce with `ACKS_NONE`).
    pub async fn send(&self, req: &Request) -> Result<()> {
        self.do_exchange(req, false).await.map(|_| ())
    }

    /// Dial one connection and return it to the pool. Used to verify
    /// reachability of bootstrap brokers before issuing metadata requests.
    pub async fn probe(&self) -> Result<()> {
        let pool = self.pool().await;
        let (conn, _permit) = pool.acquire().await?;
        pool.release(conn).await;
        Ok(())
    }

    /// Tear down the connection pool, closing all idle connections.
    /// Idempotent: safe with no pool created and safe to call repeatedly.
    /// A subsequent exchange recreates the pool from scratch.
    pub async fn close(&self) {
        let pool = self.pool.lock().await.take();
        if let Some(pool) = pool {
            pool.drain().await;
            debug!(addr = %self.config.addr, "broker pool closed");
        }
    }

    /// Get the pool, creating it under the lock on first use. Concurrent
    /// first calls observe the same instance — exactly one factory wins.
    async fn pool(&self) -> Arc<ConnectionPool> {
        let mut slot = self.pool.lock().await;
        match &*slot {
            Some(pool) => Arc::clone(pool),
            None => {
                let pool = Arc::new(ConnectionPool::new(&self.config));
                *slot = Some(Arc::clone(&pool));
                pool
            }
        }
    }

    async fn do_exchange(&self, req: &Request, want_response: bool) -> Result<Option<Response>> {
        let pool = self.pool().await;
        let (mut conn, _permit) = pool.acquire().await?;
        let io_timeout = self.config.io_timeout;

        let frame = req.to_bytes()?;

        // Write deadline. A connection that failed mid-exchange is in an
        // unknown state and is dropped instead of recycled.
        match timeout(io_timeout, write_frame(&mut conn, &frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                drop(conn);
                return Err(Error::Connection(format!(
                    "write to {} failed: {}",
                    self.config.addr, e
                )));
            }
            Err(_) => {
                drop(conn);
                return Err(Error::Connection(format!(
                    "write to {} timed out",
                    self.config.addr
                )));
            }
        }

        if !want_response {
            pool.release(conn).await;
            return Ok(None);
        }

        // Read deadline.
        let payload = match timeout(io_timeout, read_frame(&mut conn)).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                drop(conn);
                return Err(e);
            }
            Err(_) => {
                drop(conn);
                return Err(Error::Connection(format!(
                    "read from {} timed out",
                    self.config.addr
                )));
            }
        };

        let resp = match Response::from_bytes(&payload) {
            Ok(resp) => resp,
            Err(e) => {
                // Undecodable payload means the stream is desynced.
                drop(conn);
                return Err(e.into());
            }
        };

        if resp.correlation_id() != req.correlation_id() {
            drop(conn);
            return Err(Error::Connection(format!(
                "correlation id mismatch from {}: sent {}, got {}",
                self.config.addr,
                req.correlation_id(),
                resp.correlation_id()
            )));
        }

        pool.release(conn).await;
        Ok(Some(resp))
    }
}

/// Bounded pool of connections to one address. The capacity semaphore
/// limits concurrently borrowed connections; idle connections are kept for
/// reuse and dropped wholesale on drain.
#[derive(Debug)]
struct ConnectionPool {
    addr: String,
    io_timeout: std::time::Duration,
    idle: Mutex<Vec<TcpStream>>,
    permits: Arc<Semaphore>,
}

impl ConnectionPool {
    fn new(config: &BrokerConfig) -> Self {
        Self {
            addr: config.addr.clone(),
            io_timeout: config.io_timeout,
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(config.pool_capacity)),
        }
    }

    /// Borrow a connection: wait for capacity, then reuse an idle
    /// connection or dial a new one. Waiting is bounded by the I/O timeout.
    async fn acquire(&self) -> Result<(TcpStream, OwnedSemaphorePermit)> {
        let permit = match timeout(self.io_timeout, Arc::clone(&self.permits).acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            // The semaphore is never closed while the pool is reachable.
            Ok(Err(_)) | Err(_) => return Err(Error::PoolExhausted(self.addr.clone())),
        };

        if let Some(conn) = self.idle.lock().await.pop() {
            return Ok((conn, permit));
        }

        match timeout(self.io_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(conn)) => Ok((conn, permit)),
            Ok(Err(e)) => Err(Error::Connection(format!(
                "dial {} failed: {}",
                self.addr, e
            ))),
            Err(_) => Err(Error::Connection(format!("dial {} timed out", self.addr))),
        }
    }

    /// Return a healthy connection for reuse.
    async fn release(&self, conn: TcpStream) {
        self.idle.lock().await.push(conn);
    }

    /// Drop all idle connections. Borrowed connections close when their
    /// borrowers drop them.
    async fn drain(&self) {
        self.idle.lock().await.clear();
    }
}

async fn write_frame(conn: &mut TcpStream, payload: &[u8]) -> std::io::Result<()> {
    let len = payload.len() as u32;
    conn.write_all(&len.to_be_bytes()).await?;
    conn.write_all(payload).await?;
    conn.flush().await
}

async fn read_frame(conn: &mut TcpStream) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    conn.read_exact(&mut len_buf)
        .await
        .map_err(|e| Error::Connection(format!("read length prefix failed: {}", e)))?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(braid_protocol::ProtocolError::MessageTooLarge(len, MAX_MESSAGE_SIZE).into());
    }

    let mut payload = vec![0u8; len];
    conn.read_exact(&mut payload)
        .await
        .map_err(|e| Error::Connection(format!("read payload failed: {}", e)))?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_protocol::{RequestBody, ResponseBody};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// Minimal broker that answers every topic-metadata request with an
    /// empty topology, echoing the correlation id. Counts accepted
    /// connections.
    async fn spawn_echo_broker() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accepted = Arc::new(AtomicUsize::new(0));
        let accepted_clone = Arc::clone(&accepted);

        tokio::spawn(async move {
            loop {
                let (mut conn, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                accepted_clone.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    loop {
                        let payload = match read_frame(&mut conn).await {
                            Ok(p) => p,
                            Err(_) => return,
                        };
                        let req = Request::from_bytes(&payload).unwrap();
                        let resp = Response::new(
                            req.correlation_id(),
                            ResponseBody::TopicMetadata(braid_protocol::MetadataResponse {
                                brokers: vec![],
                                topics: vec![],
                            }),
                        );
                        let bytes = resp.to_bytes().unwrap();
                        if write_frame(&mut conn, &bytes).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        (addr, accepted)
    }

    fn metadata_request(id: i32) -> Request {
        let mut req = Request::new("test", RequestBody::TopicMetadata { topics: vec![] });
        req.set_correlation_id(id);
        req
    }

    #[tokio::test]
    async fn test_exchange_round_trip() {
        let (addr, _) = spawn_echo_broker().await;
        let broker = Broker::new(BrokerConfig::new(addr));

        let resp = broker.exchange(&metadata_request(7)).await.unwrap();
        assert_eq!(resp.correlation_id(), 7);
    }

    #[tokio::test]
    async fn test_sequential_exchanges_reuse_one_connection() {
        let (addr, accepted) = spawn_echo_broker().await;
        let broker = Broker::new(BrokerConfig::new(addr));

        for id in 0..5 {
            broker.exchange(&metadata_request(id)).await.unwrap();
        }
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (addr, _) = spawn_echo_broker().await;
        let broker = Broker::new(BrokerConfig::new(addr));

        // No pool created yet: both calls are no-ops.
        broker.close().await;
        broker.close().await;

        broker.exchange(&metadata_request(1)).await.unwrap();
        broker.close().await;
        broker.close().await;
    }

    #[tokio::test]
    async fn test_exchange_after_close_recreates_pool() {
        let (addr, accepted) = spawn_echo_broker().await;
        let broker = Broker::new(BrokerConfig::new(addr));

        broker.exchange(&metadata_request(1)).await.unwrap();
        broker.close().await;
        broker.exchange(&metadata_request(2)).await.unwrap();

        // The pool was rebuilt, so a second connection was dialed.
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dial_failure_is_connectivity() {
        // Port 1 on loopback is never listening in the test environment.
        let broker = Broker::new(BrokerConfig::new("127.0.0.1:1"));
        let err = broker.exchange(&metadata_request(1)).await.unwrap_err();
        assert!(err.is_connectivity(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_peer_hangup_is_connectivity() {
        // A listener that accepts and immediately drops the connection.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let Ok((conn, _)) = listener.accept().await else {
                    return;
                };
                drop(conn);
            }
        });

        let broker = Broker::new(BrokerConfig::new(addr));
        let err = broker.exchange(&metadata_request(1)).await.unwrap_err();
        assert!(err.is_connectivity(), "got {:?}", err);
    }
}
