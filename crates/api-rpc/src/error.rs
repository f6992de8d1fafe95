//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use slowpoke_core::domain::DomainError;
use slowpoke_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const CONFLICT: i32 = 4002;
    pub const REJECTED: i32 = 4003;
    pub const TIMEOUT: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Domain(e) => domain_error(e),
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::InvalidState(msg) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
        AppError::Config(msg) | AppError::Internal(msg) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>)
        }
    }
}

fn domain_error(err: DomainError) -> ErrorObjectOwned {
    let code = match &err {
        DomainError::InvalidConfiguration(_) => code::VALIDATION_ERROR,
        DomainError::Rejected { .. } => code::REJECTED,
        DomainError::EnqueueTimeout { .. } => code::TIMEOUT,
        DomainError::QueueClosed => code::CONFLICT,
        DomainError::WorkerDied { .. } => code::INTERNAL_ERROR,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_configuration_is_validation_error() {
        let err = to_rpc_error(AppError::Domain(DomainError::InvalidConfiguration(
            "service time must be non-negative, got -1".to_string(),
        )));
        assert_eq!(err.code(), code::VALIDATION_ERROR);
        assert!(err.message().contains("non-negative"));
    }

    #[test]
    fn test_queue_closed_is_conflict() {
        let err = to_rpc_error(AppError::Domain(DomainError::QueueClosed));
        assert_eq!(err.code(), code::CONFLICT);
    }
}
