//! Producer.
//!
//! For each record the producer selects a partition, resolves its leader,
//! and sends a single-record produce request. A failed leader lookup is
//! treated as transient: the partition is skipped and a sibling tried,
//! bounded by the partition count. A live connectivity failure against a
//! resolved leader is escalated instead of masked — the leader cache entry
//! is invalidated and the error returned immediately, so the next
//! `produce` call benefits from a refreshed leader.
//!
//! Per-record acknowledgment errors (non-zero codes in an otherwise
//! successful response) are logged at warn level and do not fail the call;
//! callers needing strict delivery confirmation must layer that on top.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use braid_protocol::{
    PartitionProduce, ProduceRequest, Record, RequestBody, ResponseBody, TopicProduce, ACKS_NONE,
};
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cluster::Cluster;
use crate::config::ProducerConfig;
use crate::error::{Error, Result};
use crate::partitioner::Partitioner;

/// Thread-safe producer; share via `Arc<Producer>` across tasks.
pub struct Producer {
    cluster: Arc<Cluster>,
    config: ProducerConfig,
    partitioners: RwLock<HashMap<String, Partitioner>>,
    stats: ProducerStats,
}

impl Producer {
    pub fn new(config: ProducerConfig) -> Self {
        let cluster = Arc::new(Cluster::new(config.client.clone()));
        Self {
            cluster,
            config,
            partitioners: RwLock::new(HashMap::new()),
            stats: ProducerStats::new(),
        }
    }

    /// The underlying metadata client, exposed for invalidation hooks and
    /// coordinator lookups.
    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    /// Send one record. Returns once the leader acknowledged the write at
    /// the configured level (or, with `ACKS_NONE`, once it was handed to
    /// the socket).
    pub async fn produce(&self, topic: &str, key: Option<Bytes>, value: Bytes) -> Result<()> {
        self.stats.records_sent.fetch_add(1, Ordering::Relaxed);

        let partitioner = self.partitioner_for(topic).await?;
        let mut selection = partitioner.selection();

        for _ in 0..selection.count() {
            let partition = match selection.pick(key.as_deref()) {
                Ok(p) => p,
                Err(_) => {
                    // Every partition excluded: the captured partition list
                    // is useless, force a full rebuild on the next call.
                    self.partitioners.write().await.remove(topic);
                    break;
                }
            };

            let leader = match self.cluster.leader(topic, partition).await {
                Ok(leader) => leader,
                Err(e) => {
                    debug!(topic, partition, error = %e, "leader lookup failed, skipping partition");
                    self.stats.partitions_skipped.fetch_add(1, Ordering::Relaxed);
                    selection.skip(partition);
                    continue;
                }
            };

            let req = self.cluster.next_request(RequestBody::Produce(ProduceRequest {
                required_acks: self.config.required_acks,
                timeout_ms: self.config.produce_timeout.as_millis() as i32,
                topics: vec![TopicProduce {
                    name: topic.to_string(),
                    partitions: vec![PartitionProduce {
                        partition,
                        records: vec![Record {
                            key: key.clone(),
                            value: value.clone(),
                        }],
                    }],
                }],
            }));

            if self.config.required_acks == ACKS_NONE {
                return match leader.send(&req).await {
                    Ok(()) => {
                        self.stats.records_delivered.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }
                    Err(e) => self.escalate(topic, partition, &mut selection, e).await,
                };
            }

            match leader.exchange(&req).await {
                Ok(resp) => {
                    let ResponseBody::Produce(ack) = resp.body else {
                        return Err(Error::UnexpectedResponse);
                    };
                    for t in &ack.topics {
                        for p in &t.partitions {
                            if p.error_code != 0 {
                                warn!(
                                    topic = %t.name,
                                    partition = p.partition,
                                    code = p.error_code,
                                    "produce acknowledged with error code"
                                );
                            }
                        }
                    }
                    self.stats.records_delivered.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(e) => return self.escalate(topic, partition, &mut selection, e).await,
            }
        }

        warn!(topic, "no usable partition found");
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        Err(Error::ProduceFailed(topic.to_string()))
    }

    /// Handle a send failure against a resolved leader. A connectivity
    /// failure invalidates the cached leader; either way the error is
    /// returned to the caller — this call does not keep retrying after a
    /// confirmed broker failure.
    async fn escalate(
        &self,
        topic: &str,
        partition: i32,
        selection: &mut crate::partitioner::Selection,
        e: Error,
    ) -> Result<()> {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        if e.is_connectivity() {
            selection.skip(partition);
            self.cluster.leader_is_down(topic, partition).await;
        }
        Err(e)
    }

    /// Producer statistics snapshot.
    pub fn stats(&self) -> ProducerStatsSnapshot {
        ProducerStatsSnapshot {
            records_sent: self.stats.records_sent.load(Ordering::Relaxed),
            records_delivered: self.stats.records_delivered.load(Ordering::Relaxed),
            partitions_skipped: self.stats.partitions_skipped.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
        }
    }

    /// Close the underlying metadata client and every pooled broker.
    pub async fn close(&self) {
        self.cluster.close().await;
    }

    /// Cached partitioner for a topic, built from the cluster's partition
    /// list on first use.
    async fn partitioner_for(&self, topic: &str) -> Result<Partitioner> {
        if let Some(p) = self.partitioners.read().await.get(topic) {
            return Ok(p.clone());
        }
        let partitions = self.cluster.partitions(topic).await?;
        let mut cache = self.partitioners.write().await;
        // Another call may have built one while we fetched; keep the first.
        Ok(cache
            .entry(topic.to_string())
            .or_insert_with(|| Partitioner::new(partitions))
            .clone())
    }
}

struct ProducerStats {
    records_sent: AtomicU64,
    records_delivered: AtomicU64,
    partitions_skipped: AtomicU64,
    errors: AtomicU64,
}

impl ProducerStats {
    fn new() -> Self {
        Self {
            records_sent: AtomicU64::new(0),
            records_delivered: AtomicU64::new(0),
            partitions_skipped: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }
}

/// Point-in-time view of producer counters.
#[derive(Debug, Clone)]
pub struct ProducerStatsSnapshot {
    pub records_sent: u64,
    pub records_delivered: u64,
    pub partitions_skipped: u64,
    pub errors: u64,
}

impl ProducerStatsSnapshot {
    /// Fraction of sent records that were delivered.
    pub fn success_rate(&self) -> f64 {
        if self.records_sent == 0 {
            1.0
        } else {
            self.records_delivered as f64 / self.records_sent as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot_success_rate() {
        let stats = ProducerStatsSnapshot {
            records_sent: 100,
            records_delivered: 90,
            partitions_skipped: 4,
            errors: 10,
        };
        assert!((stats.success_rate() - 0.9).abs() < 0.001);

        let empty = ProducerStatsSnapshot {
            records_sent: 0,
            records_delivered: 0,
            partitions_skipped: 0,
            errors: 0,
        };
        assert!((empty.success_rate() - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_produce_without_brokers_fails_resolution() {
        let producer = Producer::new(ProducerConfig::with_brokers(vec![]));
        let err = producer
            .produce("t", None, Bytes::from_static(b"v"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoBrokerFound), "got {:?}", err);
    }
}
