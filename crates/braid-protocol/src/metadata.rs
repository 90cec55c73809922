//! Cluster topology and produce-result payloads.

use serde::{Deserialize, Serialize};

/// Leader node id used when a partition currently has no leader.
pub const NO_LEADER: i32 = -1;

/// Broker/node descriptor for topology discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerInfo {
    /// Node id, stable across the broker's lifetime.
    pub node_id: i32,
    /// Host for client connections.
    pub host: String,
    /// Port for client connections.
    pub port: u16,
}

/// Topic topology for cluster discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMetadata {
    pub name: String,
    pub partitions: Vec<PartitionMetadata>,
}

/// Partition topology for cluster discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionMetadata {
    pub partition: i32,
    /// Leader node id, or [`NO_LEADER`] if the partition is offline.
    pub leader: i32,
}

/// Answer to a topic-metadata request. Describes every broker the
/// responding node knows about, plus the requested topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub brokers: Vec<BrokerInfo>,
    pub topics: Vec<TopicMetadata>,
}

/// Answer to a group-coordinator request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorResponse {
    pub coordinator_id: i32,
    pub host: String,
    pub port: u16,
}

/// Answer to a produce request, mirroring its topic/partition structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduceResponse {
    pub topics: Vec<TopicProduceResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicProduceResponse {
    pub name: String,
    pub partitions: Vec<PartitionProduceResponse>,
}

/// Per-partition acknowledgment. A non-zero `error_code` reports a
/// broker-side delivery problem for the records in that partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionProduceResponse {
    pub partition: i32,
    pub error_code: i16,
    pub base_offset: i64,
}
