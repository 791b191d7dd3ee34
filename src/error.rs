//! Central error handling for the compute pipeline builders
//!
//! Provides a unified ComputeError enum with consistent categorization
//! across construction, kernel compilation, dispatch recording and read-back.

/// Centralized error type for all pipeline operations
#[derive(thiserror::Error, Debug)]
pub enum ComputeError {
    #[error("Construction error: {0}")]
    Construction(String),

    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Dispatch size error: {0}")]
    DispatchSize(String),

    #[error("Readback error: {0}")]
    Readback(String),

    #[error("Device error: {0}")]
    Device(String),
}

impl ComputeError {
    /// Convenience constructors for common error types
    pub fn construction<T: ToString>(msg: T) -> Self {
        ComputeError::Construction(msg.to_string())
    }

    pub fn compile<T: ToString>(msg: T) -> Self {
        ComputeError::Compile(msg.to_string())
    }

    pub fn dispatch_size<T: ToString>(msg: T) -> Self {
        ComputeError::DispatchSize(msg.to_string())
    }

    pub fn readback<T: ToString>(msg: T) -> Self {
        ComputeError::Readback(msg.to_string())
    }

    pub fn device<T: ToString>(msg: T) -> Self {
        ComputeError::Device(msg.to_string())
    }
}

/// Result type alias for pipeline operations
pub type ComputeResult<T> = Result<T, ComputeError>;
