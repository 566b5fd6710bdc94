/// Errors that can occur while transforming payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// The key is empty; XOR with nothing would leave the payload unchanged.
    #[error("transform key must not be empty")]
    EmptyKey,
}

pub type Result<T> = std::result::Result<T, TransformError>;
