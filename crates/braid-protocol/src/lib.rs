//! Braid Wire Protocol
//!
//! This crate defines the wire protocol types shared between braid-client
//! and braid brokers. It provides serialization/deserialization for all
//! protocol messages; the client core treats it as an opaque codec.
//!
//! # Protocol Stability
//!
//! The enum variant order is significant for bincode serialization. Changes
//! to variant order will break wire compatibility with existing
//! clients/brokers.
//!
//! # Example
//!
//! ```rust,ignore
//! use braid_protocol::{Request, RequestBody};
//!
//! let request = Request::new("my-client", RequestBody::TopicMetadata {
//!     topics: vec!["events".to_string()],
//! });
//! let bytes = request.to_bytes()?;
//! ```

mod error;
mod messages;
mod metadata;

pub use error::{ProtocolError, Result};
pub use messages::{
    PartitionProduce, ProduceRequest, Record, Request, RequestBody, Response, ResponseBody,
    TopicProduce, ACKS_ALL, ACKS_LEADER, ACKS_NONE,
};
pub use metadata::{
    BrokerInfo, CoordinatorResponse, MetadataResponse, PartitionMetadata,
    PartitionProduceResponse, ProduceResponse, TopicMetadata, TopicProduceResponse, NO_LEADER,
};

/// Maximum message size (64 MiB) — prevents a malicious or desynced peer
/// from exhausting client memory.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;
