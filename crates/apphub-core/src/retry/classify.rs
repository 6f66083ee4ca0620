//! Classify HTTP status and curl errors into retry fault kinds.

use super::error::TransferError;
use super::policy::FaultKind;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> FaultKind {
    match code {
        404 | 410 => FaultKind::NotFound,
        401 | 403 => FaultKind::Auth,
        429 | 503 => FaultKind::Throttled,
        500..=599 => FaultKind::Http5xx(code as u16),
        _ => FaultKind::Other,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> FaultKind {
    if e.is_operation_timedout() {
        return FaultKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return FaultKind::Connection;
    }
    FaultKind::Other
}

/// Classify a transfer error into a `FaultKind`.
pub fn classify(e: &TransferError) -> FaultKind {
    match e {
        TransferError::Curl(ce) => classify_curl_error(ce),
        TransferError::Http(code) => classify_http_status(*code),
        TransferError::Missing => FaultKind::NotFound,
        TransferError::Protocol(_) | TransferError::Storage(_) => FaultKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), FaultKind::Throttled);
        assert_eq!(classify_http_status(503), FaultKind::Throttled);
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(matches!(classify_http_status(500), FaultKind::Http5xx(500)));
        assert!(matches!(classify_http_status(502), FaultKind::Http5xx(502)));
    }

    #[test]
    fn http_4xx_split() {
        assert_eq!(classify_http_status(404), FaultKind::NotFound);
        assert_eq!(classify_http_status(403), FaultKind::Auth);
        assert_eq!(classify_http_status(400), FaultKind::Other);
    }

    #[test]
    fn missing_object_is_not_found() {
        assert_eq!(classify(&TransferError::Missing), FaultKind::NotFound);
    }
}
