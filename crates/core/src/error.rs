/// Errors raised at the input boundary of the core crate.
///
/// The extraction pass itself never fails; only turning raw JSON into
/// typed graphs can.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
