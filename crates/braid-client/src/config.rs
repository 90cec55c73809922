//! Configuration surfaces for brokers, the metadata client, and the producer.

use std::time::Duration;

use braid_protocol::ACKS_LEADER;

/// Default broker I/O timeout (dial, write, read, pool acquisition).
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection pool capacity per broker.
pub const DEFAULT_POOL_CAPACITY: usize = 10;
/// Default broker-side produce timeout.
pub const DEFAULT_PRODUCE_TIMEOUT: Duration = Duration::from_secs(10);
/// Default grace period before a recently-failed leader should be retried.
pub const DEFAULT_LEADER_RECOVERY_GRACE: Duration = Duration::from_secs(60);

/// Configuration for a single broker connection pool.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker address (`host:port`).
    pub addr: String,
    /// Deadline applied to every dial, write, read, and pool acquisition.
    pub io_timeout: Duration,
    /// Maximum number of concurrently borrowed connections.
    pub pool_capacity: usize,
}

impl BrokerConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            io_timeout: DEFAULT_IO_TIMEOUT,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

/// Configuration for the cluster metadata client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Seed broker addresses dialed in order when no broker is known yet.
    pub bootstrap_brokers: Vec<String>,
    /// Template applied to every broker discovered through metadata; its
    /// `addr` is replaced per node.
    pub broker_template: BrokerConfig,
    /// Identifier carried in every request envelope.
    pub client_id: String,
}

impl ClientConfig {
    pub fn new(bootstrap_brokers: Vec<String>) -> Self {
        Self {
            bootstrap_brokers,
            broker_template: BrokerConfig::new(""),
            client_id: "braid".to_string(),
        }
    }
}

/// Producer configuration.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub client: ClientConfig,
    /// Acknowledgment level put on every produce request.
    pub required_acks: i16,
    /// Broker-side wait bound for the required acknowledgments.
    pub produce_timeout: Duration,
    /// Reserved hook for a backoff policy at the leader-invalidation
    /// boundary: how long a just-failed leader should be left alone before
    /// reselection. Not enforced by the core retry loop.
    pub leader_recovery_grace: Duration,
}

impl ProducerConfig {
    /// Defaults for the given seed brokers: leader acks, 10s produce
    /// timeout, 30s broker I/O timeout, pool capacity 10.
    pub fn with_brokers(bootstrap_brokers: Vec<String>) -> Self {
        Self {
            client: ClientConfig::new(bootstrap_brokers),
            required_acks: ACKS_LEADER,
            produce_timeout: DEFAULT_PRODUCE_TIMEOUT,
            leader_recovery_grace: DEFAULT_LEADER_RECOVERY_GRACE,
        }
    }

    /// Create a new builder.
    pub fn builder() -> ProducerConfigBuilder {
        ProducerConfigBuilder::default()
    }
}

/// Builder for [`ProducerConfig`].
pub struct ProducerConfigBuilder {
    config: ProducerConfig,
}

impl Default for ProducerConfigBuilder {
    fn default() -> Self {
        Self {
            config: ProducerConfig::with_brokers(Vec::new()),
        }
    }
}

impl ProducerConfigBuilder {
    /// Set seed broker addresses.
    pub fn bootstrap_brokers(mut self, brokers: Vec<String>) -> Self {
        self.config.client.bootstrap_brokers = brokers;
        self
    }

    /// Set the client identifier.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.config.client.client_id = id.into();
        self
    }

    /// Set the broker I/O timeout.
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.client.broker_template.io_timeout = timeout;
        self
    }

    /// Set the per-broker connection pool capacity.
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.config.client.broker_template.pool_capacity = capacity;
        self
    }

    /// Set the required acknowledgment level.
    pub fn required_acks(mut self, acks: i16) -> Self {
        self.config.required_acks = acks;
        self
    }

    /// Set the produce timeout.
    pub fn produce_timeout(mut self, timeout: Duration) -> Self {
        self.config.produce_timeout = timeout;
        self
    }

    /// Set the leader recovery grace period.
    pub fn leader_recovery_grace(mut self, grace: Duration) -> Self {
        self.config.leader_recovery_grace = grace;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProducerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_config_defaults() {
        let config = BrokerConfig::new("localhost:9092");
        assert_eq!(config.addr, "localhost:9092");
        assert_eq!(config.io_timeout, Duration::from_secs(30));
        assert_eq!(config.pool_capacity, 10);
    }

    #[test]
    fn test_producer_config_defaults() {
        let config = ProducerConfig::with_brokers(vec!["a:1".to_string()]);
        assert_eq!(config.required_acks, ACKS_LEADER);
        assert_eq!(config.produce_timeout, Duration::from_secs(10));
        assert_eq!(config.leader_recovery_grace, Duration::from_secs(60));
        assert_eq!(config.client.bootstrap_brokers, vec!["a:1".to_string()]);
    }

    #[test]
    fn test_producer_config_builder() {
        let config = ProducerConfig::builder()
            .bootstrap_brokers(vec!["a:1".to_string(), "b:2".to_string()])
            .client_id("svc-42")
            .io_timeout(Duration::from_secs(5))
            .pool_capacity(2)
            .required_acks(braid_protocol::ACKS_ALL)
            .produce_timeout(Duration::from_millis(500))
            .build();

        assert_eq!(config.client.bootstrap_brokers.len(), 2);
        assert_eq!(config.client.client_id, "svc-42");
        assert_eq!(config.client.broker_template.io_timeout, Duration::from_secs(5));
        assert_eq!(config.client.broker_template.pool_capacity, 2);
        assert_eq!(config.required_acks, braid_protocol::ACKS_ALL);
        assert_eq!(config.produce_timeout, Duration::from_millis(500));
    }
}
