use thiserror::Error;

pub const TIMEOUT_MESSAGE: &str =
    "Scraping timed out. Google Maps might be slow or blocked.";
pub const SELECTOR_MESSAGE: &str =
    "Could not find expected elements on the page. Selectors might need updating.";
pub const GENERIC_MESSAGE: &str =
    "An unexpected error occurred during scraping or calculation.";

/// Request-level failures. Card- and field-level selector misses never reach
/// this type; they degrade into partial records inside the extractor.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Rejected before any browser session is created.
    #[error("{0}")]
    Validation(String),

    /// The page never settled within the navigation budget.
    #[error("navigation did not settle within {0}s")]
    NavigationTimeout(u64),

    /// Anything else that aborted the session. The browser process is
    /// already gone by the time this surfaces (closed on drop).
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl AuditError {
    /// Message safe to hand back to the caller. Unexpected failures are
    /// classified by their error text: timeout-shaped and selector-shaped
    /// causes get specific guidance, everything else a generic message.
    pub fn user_message(&self) -> String {
        match self {
            AuditError::Validation(message) => message.clone(),
            AuditError::NavigationTimeout(_) => TIMEOUT_MESSAGE.to_string(),
            AuditError::Unexpected(source) => {
                let text = format!("{source:#}").to_lowercase();
                if text.contains("timeout") || text.contains("timed out") {
                    TIMEOUT_MESSAGE.to_string()
                } else if text.contains("selector") {
                    SELECTOR_MESSAGE.to_string()
                } else {
                    GENERIC_MESSAGE.to_string()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_text_maps_to_timeout_message() {
        let err = AuditError::Unexpected(anyhow::anyhow!("navigation timed out after 60s"));
        assert_eq!(err.user_message(), TIMEOUT_MESSAGE);
    }

    #[test]
    fn selector_text_maps_to_selector_message() {
        let err = AuditError::Unexpected(anyhow::anyhow!("could not parse selector `div.Nv2PK`"));
        assert_eq!(err.user_message(), SELECTOR_MESSAGE);
    }

    #[test]
    fn unknown_text_maps_to_generic_message() {
        let err = AuditError::Unexpected(anyhow::anyhow!("websocket closed"));
        assert_eq!(err.user_message(), GENERIC_MESSAGE);
    }

    #[test]
    fn validation_message_passes_through() {
        let err = AuditError::Validation("All fields are required.".to_string());
        assert_eq!(err.user_message(), "All fields are required.");
    }
}
