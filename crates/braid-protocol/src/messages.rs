//! Request/response envelopes and produce message bodies.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::metadata::{CoordinatorResponse, MetadataResponse, ProduceResponse};

/// No acknowledgment: the broker sends no response at all.
pub const ACKS_NONE: i16 = 0;
/// Acknowledge once the partition leader has accepted the write.
pub const ACKS_LEADER: i16 = 1;
/// Acknowledge once all in-sync replicas have accepted the write.
pub const ACKS_ALL: i16 = -1;

/// A request envelope sent to a broker.
///
/// The correlation id is caller-assigned; the broker echoes it back in the
/// matching [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub correlation_id: i32,
    pub client_id: String,
    pub body: RequestBody,
}

/// Request bodies understood by brokers.
///
/// WARNING: variant order is wire format — do not reorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestBody {
    /// Topology for the named topics: broker descriptors, partition lists,
    /// and current partition leaders. Any broker can answer for the whole
    /// cluster.
    TopicMetadata { topics: Vec<String> },

    /// Which broker coordinates the named consumer group.
    GroupCoordinator { group: String },

    /// Append records to topic partitions.
    Produce(ProduceRequest),
}

impl Request {
    pub fn new(client_id: impl Into<String>, body: RequestBody) -> Self {
        Self {
            correlation_id: 0,
            client_id: client_id.into(),
            body,
        }
    }

    pub fn correlation_id(&self) -> i32 {
        self.correlation_id
    }

    pub fn set_correlation_id(&mut self, id: i32) {
        self.correlation_id = id;
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

/// A response envelope received from a broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Correlation id of the request this answers.
    pub correlation_id: i32,
    pub body: ResponseBody,
}

/// Response bodies.
///
/// WARNING: variant order is wire format — do not reorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseBody {
    TopicMetadata(MetadataResponse),
    GroupCoordinator(CoordinatorResponse),
    Produce(ProduceResponse),
}

impl Response {
    pub fn new(correlation_id: i32, body: ResponseBody) -> Self {
        Self {
            correlation_id,
            body,
        }
    }

    pub fn correlation_id(&self) -> i32 {
        self.correlation_id
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

/// A produce request: records grouped by topic and partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduceRequest {
    /// One of [`ACKS_NONE`], [`ACKS_LEADER`], [`ACKS_ALL`].
    pub required_acks: i16,
    /// How long the broker may wait for the required acknowledgments.
    pub timeout_ms: i32,
    pub topics: Vec<TopicProduce>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicProduce {
    pub name: String,
    pub partitions: Vec<PartitionProduce>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionProduce {
    pub partition: i32,
    pub records: Vec<Record>,
}

/// An opaque key/value record. Both sides are uninterpreted bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub key: Option<Bytes>,
    pub value: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_round_trip() {
        let mut req = Request::new(
            "test-client",
            RequestBody::GroupCoordinator {
                group: "g1".to_string(),
            },
        );
        assert_eq!(req.correlation_id(), 0);
        req.set_correlation_id(42);

        let bytes = req.to_bytes().unwrap();
        let decoded = Request::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.correlation_id(), 42);
        assert_eq!(decoded.client_id, "test-client");
    }

    #[test]
    fn test_produce_request_bytes_survive() {
        let req = Request::new(
            "p",
            RequestBody::Produce(ProduceRequest {
                required_acks: ACKS_LEADER,
                timeout_ms: 10_000,
                topics: vec![TopicProduce {
                    name: "events".to_string(),
                    partitions: vec![PartitionProduce {
                        partition: 3,
                        records: vec![Record {
                            key: Some(Bytes::from_static(b"k")),
                            value: Bytes::from_static(b"\x00\x01\xff"),
                        }],
                    }],
                }],
            }),
        );

        let decoded = Request::from_bytes(&req.to_bytes().unwrap()).unwrap();
        match decoded.body {
            RequestBody::Produce(p) => {
                assert_eq!(p.required_acks, ACKS_LEADER);
                let record = &p.topics[0].partitions[0].records[0];
                assert_eq!(record.value.as_ref(), b"\x00\x01\xff");
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let req = Request::new("c", RequestBody::TopicMetadata { topics: vec![] });
        let bytes = req.to_bytes().unwrap();
        assert!(Request::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
