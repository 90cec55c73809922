use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] braid_protocol::ProtocolError),

    #[error("connection pool exhausted for {0}")]
    PoolExhausted(String),

    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("leader not found for {topic}/{partition}")]
    LeaderNotFound { topic: String, partition: i32 },

    #[error("coordinator not found for group {0}")]
    CoordinatorNotFound(String),

    #[error("no broker found")]
    NoBrokerFound,

    #[error("no valid partition")]
    NoValidPartition,

    #[error("produce failed for topic {0}")]
    ProduceFailed(String),

    #[error("unexpected response")]
    UnexpectedResponse,
}

impl Error {
    /// Whether this error reports a broker connectivity failure: dial,
    /// write, read, deadline, or pool-acquisition trouble. Connectivity
    /// failures drive leader invalidation in the producer; resolution
    /// errors do not.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::PoolExhausted(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(Error::Connection("dial refused".into()).is_connectivity());
        assert!(Error::Connection("read deadline expired".into()).is_connectivity());
        assert!(Error::PoolExhausted("b:9092".into()).is_connectivity());

        assert!(!Error::TopicNotFound("t".into()).is_connectivity());
        assert!(!Error::LeaderNotFound {
            topic: "t".into(),
            partition: 0
        }
        .is_connectivity());
        assert!(!Error::NoValidPartition.is_connectivity());
        assert!(!Error::UnexpectedResponse.is_connectivity());
    }
}
