use crate::config::ConfigError;

/// Unified application error type combining configuration, network, parsing
/// and display errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("unable to update display")]
    Display,

    // Network errors
    #[error("DNS query failed")]
    DnsQuery,
    #[error("network connection failed")]
    Connection,
    #[error("HTTP request failed")]
    HttpRequest,
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("socket read error")]
    SocketRead,
    #[error("request timed out")]
    RequestTimeout,
    #[error("response larger than {0} bytes")]
    ResponseTooLarge(usize),
    #[error("not a plain http:// URL")]
    BadUrl,

    // Payload errors
    #[error("JSON parse failed")]
    JsonParse,
    #[error("unsupported image: {0}")]
    Image(&'static str),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
