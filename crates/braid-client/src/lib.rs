//! Braid client core.
//!
//! The client-side of a braid cluster: topology discovery, pooled broker
//! connections, and a partitioning producer that survives leader failures.
//!
//! # Components
//!
//! - [`Broker`] — bounded, lazily-created connection pool to one broker
//!   node; one request/response exchange at a time per borrowed connection.
//! - [`Cluster`] — lazy pull-based caches for partition lists, partition
//!   leaders, and group coordinators, refreshed through any reachable
//!   broker and bootstrapped from a seed address list.
//! - [`Partitioner`] — deterministic keyed (murmur2) or random keyless
//!   partition selection with a call-local exclusion set.
//! - [`Producer`] — ties the three together: pick partition, resolve
//!   leader, send, and retry across sibling partitions on stale topology.
//!
//! # Example
//!
//! ```rust,ignore
//! use braid_client::{Producer, ProducerConfig};
//! use bytes::Bytes;
//!
//! # async fn example() -> braid_client::Result<()> {
//! let config = ProducerConfig::builder()
//!     .bootstrap_brokers(vec!["localhost:9092".to_string()])
//!     .client_id("orders-svc")
//!     .build();
//! let producer = Producer::new(config);
//! producer
//!     .produce("orders", Some(Bytes::from("user-42")), Bytes::from("payload"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod cluster;
pub mod config;
pub mod error;
pub mod partitioner;
pub mod producer;

pub use broker::Broker;
pub use cluster::Cluster;
pub use config::{BrokerConfig, ClientConfig, ProducerConfig, ProducerConfigBuilder};
pub use error::{Error, Result};
pub use partitioner::{Partitioner, Selection};
pub use producer::{Producer, ProducerStatsSnapshot};
