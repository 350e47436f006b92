use thiserror::Error;

/// Error taxonomy for the service boundary.
///
/// Handlers match on the kind and always reply with a structured payload;
/// none of these variants is allowed to surface as an unhandled 500.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller-side problem: empty query text, bad file extension, wrong row
    /// count, malformed user fields. Reported with a descriptive message.
    #[error("{0}")]
    InvalidInput(String),

    /// The embedder or the ticket store failed or timed out.
    #[error("{0}")]
    BackingStore(String),

    /// SMTP delivery failed. Logged only, never surfaced to the caller.
    #[error("{0}")]
    Transport(String),
}

impl ApiError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ApiError::InvalidInput(msg.into())
    }

    pub fn backing_store(msg: impl Into<String>) -> Self {
        ApiError::BackingStore(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;

    #[test]
    fn messages_pass_through_unchanged() {
        let e = ApiError::invalid_input("Adresse email invalide");
        assert_eq!(e.to_string(), "Adresse email invalide");
        let e = ApiError::backing_store("store indisponible");
        assert_eq!(e.to_string(), "store indisponible");
    }
}
