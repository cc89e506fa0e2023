use std::io::ErrorKind;

use log::error;
use serde::Serialize;

use super::{GatewayError, UpstreamError};

const RATE_LIMIT_MESSAGE: &str = "429 Too Many Requests";
const UNKNOWN_ERROR_MESSAGE: &str = "Unhandled error. Please check the server logs for details.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    AddressFormatError,
    NetworkMismatchError,
    ArraySizeError,
    NotReadyError,
    UpstreamProtocolError,
    UpstreamResponseError,
    UpstreamNetworkError,
    RateLimitError,
    GenericError,
    UnknownError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub message: String,
    pub http_status: u16,
    pub retryable: bool,
}

impl ClassifiedError {
    fn new(category: ErrorCategory, message: impl Into<String>, http_status: u16) -> Self {
        Self {
            category,
            message: message.into(),
            http_status,
            retryable: false,
        }
    }

    fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

/// Maps an error to what the caller is told about it.
pub fn classify(err: &GatewayError) -> ClassifiedError {
    match err {
        GatewayError::AddressFormat(e) => ClassifiedError::new(ErrorCategory::AddressFormatError, e.to_string(), 422),
        GatewayError::InvalidBulkItem { .. } => {
            ClassifiedError::new(ErrorCategory::AddressFormatError, err.to_string(), 400)
        },
        GatewayError::NetworkMismatch { .. } => {
            ClassifiedError::new(ErrorCategory::NetworkMismatchError, err.to_string(), 400)
        },
        GatewayError::ArraySize { .. } => ClassifiedError::new(ErrorCategory::ArraySizeError, err.to_string(), 400),
        GatewayError::InvalidInput(message) => ClassifiedError::new(ErrorCategory::GenericError, message.clone(), 400),
        GatewayError::NotReady => ClassifiedError::new(ErrorCategory::NotReadyError, err.to_string(), 503).retryable(),
        GatewayError::Upstream(upstream) => classify_upstream(upstream),
    }
}

fn classify_upstream(err: &UpstreamError) -> ClassifiedError {
    match err {
        UpstreamError::Rpc { message, .. } if !message.is_empty() => {
            ClassifiedError::new(ErrorCategory::UpstreamProtocolError, message.clone(), 400)
        },
        UpstreamError::Response { status, body } => {
            let status = *status;
            let message = if body.trim().is_empty() {
                format!("Upstream responded with status {status}")
            } else {
                body.clone()
            };
            let classified = ClassifiedError::new(ErrorCategory::UpstreamResponseError, message, status);
            if status == 503 { classified.retryable() } else { classified }
        },
        UpstreamError::Io(e) if is_network_failure(e) => {
            ClassifiedError::new(ErrorCategory::UpstreamNetworkError, e.to_string(), 503).retryable()
        },
        UpstreamError::Io(e) => plain_message(&e.to_string()),
        UpstreamError::Relayed(message) | UpstreamError::Malformed(message) => plain_message(message),
        UpstreamError::Rpc { .. } | UpstreamError::Unrecognized(_) => {
            error!(error:? = err; "Unhandled upstream error");
            ClassifiedError::new(ErrorCategory::UnknownError, UNKNOWN_ERROR_MESSAGE, 500)
        },
    }
}

fn plain_message(message: &str) -> ClassifiedError {
    if is_rate_limited(message) {
        return ClassifiedError::new(ErrorCategory::RateLimitError, RATE_LIMIT_MESSAGE, 429).retryable();
    }
    if message.trim().is_empty() {
        error!("Upstream failed without a message");
        return ClassifiedError::new(ErrorCategory::UnknownError, UNKNOWN_ERROR_MESSAGE, 500);
    }
    ClassifiedError::new(ErrorCategory::GenericError, message, 422)
}

fn is_network_failure(e: &std::io::Error) -> bool {
    if matches!(
        e.kind(),
        ErrorKind::NetworkUnreachable
            | ErrorKind::HostUnreachable
            | ErrorKind::NotFound
            | ErrorKind::AddrNotAvailable
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
            | ErrorKind::TimedOut
    ) {
        return true;
    }
    let message = e.to_string();
    ["ENOTFOUND", "ENETUNREACH", "EAI_AGAIN", "failed to lookup address", "ECONNABORTED", "ECONNREFUSED"]
        .iter()
        .any(|needle| message.contains(needle))
}

fn is_rate_limited(message: &str) -> bool {
    message.contains(RATE_LIMIT_MESSAGE) || message.to_lowercase().contains("too many requests")
}
