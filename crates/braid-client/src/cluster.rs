//! Cluster metadata client.
//!
//! [`Cluster`] owns the registry of known brokers plus the topology caches:
//! topic → partition list, (topic, partition) → leader, and consumer
//! group → coordinator. Caches are lazy and pull-based: absence triggers a
//! refresh, presence is trusted until explicitly invalidated via
//! [`Cluster::leader_is_down`] / [`Cluster::coordinator_is_down`]. There is
//! no background refresh and no entry expiry.
//!
//! Every resolution follows the same two-phase pattern: check the cache; on
//! miss, refresh through any reachable broker; check again; on still-miss,
//! fail with a specific error. Bootstrapping from a single seed broker is
//! sufficient because every broker can answer metadata requests for the
//! whole cluster.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

use braid_protocol::{Request, RequestBody, ResponseBody};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::broker::Broker;
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// The four topology maps, guarded together by one mutex. Entries in the
/// leader and coordinator maps always alias handles present in the node
/// registry; the registry is the sole owner and the only place that closes
/// brokers.
#[derive(Default)]
struct ClusterState {
    brokers: HashMap<i32, Arc<Broker>>,
    topic_partitions: HashMap<String, Vec<i32>>,
    leaders: HashMap<(String, i32), Arc<Broker>>,
    coordinators: HashMap<String, Arc<Broker>>,
}

/// Cluster metadata client.
pub struct Cluster {
    config: ClientConfig,
    state: Mutex<ClusterState>,
    correlation: AtomicI32,
    metadata_fetches: AtomicU64,
    coordinator_fetches: AtomicU64,
}

impl Cluster {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ClusterState::default()),
            correlation: AtomicI32::new(0),
            metadata_fetches: AtomicU64::new(0),
            coordinator_fetches: AtomicU64::new(0),
        }
    }

    /// Build a request envelope with a fresh correlation id and the
    /// configured client id.
    pub fn next_request(&self, body: RequestBody) -> Request {
        let mut req = Request::new(self.config.client_id.clone(), body);
        req.set_correlation_id(self.correlation.fetch_add(1, Ordering::Relaxed) + 1);
        req
    }

    /// Partition ids of a topic, in broker-reported order.
    pub async fn partitions(&self, topic: &str) -> Result<Vec<i32>> {
        if let Some(partitions) = self.state.lock().await.topic_partitions.get(topic) {
            return Ok(partitions.clone());
        }
        self.refresh_topic_metadata(topic).await?;
        match self.state.lock().await.topic_partitions.get(topic) {
            Some(partitions) => Ok(partitions.clone()),
            None => Err(Error::TopicNotFound(topic.to_string())),
        }
    }

    /// Current believed leader for a partition.
    pub async fn leader(&self, topic: &str, partition: i32) -> Result<Arc<Broker>> {
        let key = (topic.to_string(), partition);
        if let Some(leader) = self.state.lock().await.leaders.get(&key) {
            return Ok(Arc::clone(leader));
        }
        self.refresh_topic_metadata(topic).await?;
        match self.state.lock().await.leaders.get(&key) {
            Some(leader) => Ok(Arc::clone(leader)),
            None => Err(Error::LeaderNotFound {
                topic: topic.to_string(),
                partition,
            }),
        }
    }

    /// Current believed coordinator for a consumer group. The topic is
    /// used to repopulate the node registry when the reported coordinator
    /// id is not yet known.
    pub async fn coordinator(&self, topic: &str, group: &str) -> Result<Arc<Broker>> {
        if let Some(coord) = self.state.lock().await.coordinators.get(group) {
            return Ok(Arc::clone(coord));
        }
        self.refresh_group_coordinator(topic, group).await?;
        match self.state.lock().await.coordinators.get(group) {
            Some(coord) => Ok(Arc::clone(coord)),
            None => Err(Error::CoordinatorNotFound(group.to_string())),
        }
    }

    /// Drop the cached leader for a partition so the next resolution
    /// forces a fresh metadata fetch. The broker handle itself stays open:
    /// it may still lead other partitions.
    pub async fn leader_is_down(&self, topic: &str, partition: i32) {
        let removed = self
            .state
            .lock()
            .await
            .leaders
            .remove(&(topic.to_string(), partition));
        if removed.is_some() {
            debug!(topic, partition, "leader cache entry invalidated");
        }
    }

    /// Drop the cached coordinator for a group. The broker handle stays
    /// open.
    pub async fn coordinator_is_down(&self, group: &str) {
        if self.state.lock().await.coordinators.remove(group).is_some() {
            debug!(group, "coordinator cache entry invalidated");
        }
    }

    /// Number of topic-metadata fetches issued so far.
    pub fn metadata_fetches(&self) -> u64 {
        self.metadata_fetches.load(Ordering::Relaxed)
    }

    /// Number of group-coordinator fetches issued so far.
    pub fn coordinator_fetches(&self) -> u64 {
        self.coordinator_fetches.load(Ordering::Relaxed)
    }

    /// Close every broker in the node registry and clear all caches.
    pub async fn close(&self) {
        let brokers: Vec<Arc<Broker>> = {
            let mut state = self.state.lock().await;
            state.topic_partitions.clear();
            state.leaders.clear();
            state.coordinators.clear();
            state.brokers.drain().map(|(_, b)| b).collect()
        };
        for broker in brokers {
            broker.close().await;
        }
    }

    /// Fetch topic metadata through any reachable broker and fold it into
    /// the caches: register newly discovered nodes, record the topic's
    /// partition list, and record a leader for every partition whose
    /// leader node is known.
    async fn refresh_topic_metadata(&self, topic: &str) -> Result<()> {
        let (broker, bootstrap) = self.any_broker().await?;
        let req = self.next_request(RequestBody::TopicMetadata {
            topics: vec![topic.to_string()],
        });
        self.metadata_fetches.fetch_add(1, Ordering::Relaxed);
        let result = broker.exchange(&req).await;
        if bootstrap {
            // A broker dialed solely for this call is never cached.
            broker.close().await;
        }
        let resp = result?;
        let ResponseBody::TopicMetadata(meta) = resp.body else {
            return Err(Error::UnexpectedResponse);
        };

        let mut state = self.state.lock().await;
        for descriptor in &meta.brokers {
            if descriptor.host.is_empty() {
                // A partially-populated topology is still useful.
                warn!(node_id = descriptor.node_id, "skipping broker descriptor with empty host");
                continue;
            }
            state.brokers.entry(descriptor.node_id).or_insert_with(|| {
                let mut cfg = self.config.broker_template.clone();
                cfg.addr = format!("{}:{}", descriptor.host, descriptor.port);
                debug!(node_id = descriptor.node_id, addr = %cfg.addr, "registered broker");
                Arc::new(Broker::new(cfg))
            });
        }

        let Some(topic_meta) = meta.topics.iter().find(|t| t.name == topic) else {
            return Err(Error::TopicNotFound(topic.to_string()));
        };

        let mut partitions = Vec::with_capacity(topic_meta.partitions.len());
        for p in &topic_meta.partitions {
            partitions.push(p.partition);
            if let Some(leader) = state.brokers.get(&p.leader) {
                let leader = Arc::clone(leader);
                state.leaders.insert((topic.to_string(), p.partition), leader);
            }
        }
        state.topic_partitions.insert(topic.to_string(), partitions);
        Ok(())
    }

    /// Ask any reachable broker for the group's coordinator. If the
    /// reported node id is unknown, refresh topic metadata once to
    /// repopulate the registry and re-check.
    async fn refresh_group_coordinator(&self, topic: &str, group: &str) -> Result<()> {
        let (broker, bootstrap) = self.any_broker().await?;
        let req = self.next_request(RequestBody::GroupCoordinator {
            group: group.to_string(),
        });
        self.coordinator_fetches.fetch_add(1, Ordering::Relaxed);
        let result = broker.exchange(&req).await;
        if bootstrap {
            broker.close().await;
        }
        let resp = result?;
        let ResponseBody::GroupCoordinator(coord) = resp.body else {
            return Err(Error::UnexpectedResponse);
        };

        {
            let mut state = self.state.lock().await;
            if let Some(b) = state.brokers.get(&coord.coordinator_id) {
                let b = Arc::clone(b);
                state.coordinators.insert(group.to_string(), b);
                return Ok(());
            }
        }

        self.refresh_topic_metadata(topic).await?;

        let mut state = self.state.lock().await;
        if let Some(b) = state.brokers.get(&coord.coordinator_id) {
            let b = Arc::clone(b);
            state.coordinators.insert(group.to_string(), b);
            return Ok(());
        }
        Err(Error::CoordinatorNotFound(group.to_string()))
    }

    /// Obtain some broker to talk to. Prefers a known broker — the one
    /// with the lowest node id, a deterministic stand-in for "arbitrary" —
    /// and falls back to dialing the seed list in order. The returned flag
    /// is true for a bootstrap broker the caller must close after one use.
    async fn any_broker(&self) -> Result<(Arc<Broker>, bool)> {
        {
            let state = self.state.lock().await;
            if let Some((_, broker)) = state.brokers.iter().min_by_key(|(id, _)| **id) {
                return Ok((Arc::clone(broker), false));
            }
        }
        let broker = self.bootstrap_broker().await?;
        Ok((broker, true))
    }

    /// Dial seed addresses in order; the first reachable one wins.
    async fn bootstrap_broker(&self) -> Result<Arc<Broker>> {
        for addr in &self.config.bootstrap_brokers {
            let mut cfg = self.config.broker_template.clone();
            cfg.addr = addr.clone();
            let broker = Arc::new(Broker::new(cfg));
            match broker.probe().await {
                Ok(()) => {
                    debug!(%addr, "bootstrap broker reachable");
                    return Ok(broker);
                }
                Err(e) => {
                    warn!(%addr, error = %e, "bootstrap broker unreachable");
                    broker.close().await;
                }
            }
        }
        Err(Error::NoBrokerFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;

    fn test_config() -> ClientConfig {
        ClientConfig {
            bootstrap_brokers: vec![],
            broker_template: BrokerConfig::new(""),
            client_id: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_correlation_ids_are_unique_and_increasing() {
        let cluster = Cluster::new(test_config());
        let a = cluster.next_request(RequestBody::TopicMetadata { topics: vec![] });
        let b = cluster.next_request(RequestBody::TopicMetadata { topics: vec![] });
        assert!(b.correlation_id() > a.correlation_id());
    }

    #[tokio::test]
    async fn test_no_seeds_fails_with_no_broker_found() {
        let cluster = Cluster::new(test_config());
        let err = cluster.partitions("t").await.unwrap_err();
        assert!(matches!(err, Error::NoBrokerFound), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_invalidation_is_noop_when_absent() {
        let cluster = Cluster::new(test_config());
        cluster.leader_is_down("t", 0).await;
        cluster.coordinator_is_down("g").await;
    }
}
