use std::collections::HashMap;

use serde::{Deserialize, Serialize};

mod metric;
pub use metric::Metric;

/// OTLP collector receiving the metrics emitted through [`crate::metric`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub endpoint: String,
    pub token: Option<String>,
}

impl Configuration {
    fn headers(&self) -> HashMap<String, String> {
        self.token
            .iter()
            .map(|token| ("Authorization".to_string(), format!("Basic {}", token)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::service::monitoring::Configuration;

    #[test]
    fn token_is_sent_as_basic_authorization() {
        let configuration = Configuration {
            endpoint: "http://localhost:4318".to_string(),
            token: Some("Y2VsbGFy".to_string()),
        };

        let headers = configuration.headers();
        assert_eq!(headers.get("Authorization").map(String::as_str), Some("Basic Y2VsbGFy"));
    }

    #[test]
    fn no_token_sends_no_header() {
        let configuration = Configuration {
            endpoint: "http://localhost:4318".to_string(),
            token: None,
        };

        assert!(configuration.headers().is_empty());
    }
}
