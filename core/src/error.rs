//! Error taxonomy for the routing engine and its collaborators.
//!
//! Route-set errors ([`RouterError::MultiplePrimaries`],
//! [`RouterError::NoPrimaryRoute`]) and an unavailable keystore are fatal to
//! a dispatch and surfaced through the completion continuation before any
//! outbound I/O. Per-route failures (transport errors, timeouts, a malformed
//! `pathTransform` expression) follow the route they belong to: on the
//! primary they produce a synthetic 500 while still completing the dispatch,
//! on secondary routes they are attached to the route record. Persistence
//! and event errors are logged and never surfaced to the client.

use thiserror::Error;

/// Errors from the keystore collaborator.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// The keystore could not be acquired. Fatal to the dispatch.
    #[error("keystore unavailable: {0}")]
    Unavailable(String),
    /// A route referenced a CA entry the keystore does not hold.
    #[error("no CA entry named {0} in keystore")]
    MissingCa(String),
}

/// Errors from the transaction persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying store rejected the write.
    #[error("transaction store error: {0}")]
    Database(String),
}

/// Errors from the event sink collaborator.
#[derive(Debug, Error)]
pub enum EventError {
    /// The underlying store rejected the write.
    #[error("event store error: {0}")]
    Database(String),
}

/// Errors from the message-bus producer pool.
#[derive(Debug, Error)]
pub enum BusError {
    /// A producer for the requested key could not be created.
    #[error("failed to create producer: {0}")]
    ProducerCreation(String),
    /// The publish itself failed.
    #[error("publish to {topic} failed: {reason}")]
    PublishFailed {
        /// Topic the publish was addressed to.
        topic: String,
        /// Broker-reported reason.
        reason: String,
    },
}

/// Errors raised by the dispatch engine.
#[derive(Debug, Error)]
pub enum RouterError {
    /// More than one enabled route on the channel is marked primary.
    /// Rejected before any outbound I/O.
    #[error("channel {channel} has multiple primary routes")]
    MultiplePrimaries {
        /// Offending channel name.
        channel: String,
    },

    /// No enabled route on the channel is marked primary, so no response
    /// could ever be returned to the client.
    #[error("channel {channel} has no primary route")]
    NoPrimaryRoute {
        /// Offending channel name.
        channel: String,
    },

    /// A route's `pathTransform` expression could not be parsed or compiled.
    /// Fails that route only; sibling routes are still dispatched.
    #[error("invalid path transform expression: {expression}")]
    InvalidPathTransform {
        /// The expression as configured.
        expression: String,
    },

    /// The keystore could not be acquired; no routes are attempted.
    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    /// Network, TLS, or protocol failure on a transport.
    #[error("{message}")]
    Transport {
        /// Transport-reported failure.
        message: String,
    },

    /// The route's timeout fired before the transport completed.
    #[error("Request took longer than {0}ms")]
    Timeout(u64),

    /// Bus publish failure.
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl RouterError {
    /// Build a transport error from any message.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_is_exact() {
        assert_eq!(
            RouterError::Timeout(1500).to_string(),
            "Request took longer than 1500ms"
        );
    }

    #[test]
    fn multiple_primaries_names_the_condition() {
        let err = RouterError::MultiplePrimaries {
            channel: "labs".to_string(),
        };
        assert!(err.to_string().contains("multiple primary routes"));
    }
}
