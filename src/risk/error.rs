use thiserror::Error;

/// Risk configuration rejected at construction.
#[derive(Debug, Error, PartialEq)]
pub enum RiskConfigError {
    #[error("max gross exposure must be positive")]
    NonPositiveGrossExposure,
    #[error("token bucket capacity must be at least 1")]
    NonPositiveBucketCapacity,
    #[error("token refill interval must be positive")]
    NonPositiveRefillInterval,
}
