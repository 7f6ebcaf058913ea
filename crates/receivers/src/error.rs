use thiserror::Error;

/// Failures a receiver can hit while starting up or running.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("invalid receiver config: {0}")]
    Config(String),

    #[error("failed to publish trigger event: {0}")]
    Publish(String),

    #[error("webhook transport error: {0}")]
    Transport(String),

    #[error("queue source error: {0}")]
    Queue(String),
}
