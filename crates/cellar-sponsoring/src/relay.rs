use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cellar_ledger::transaction::TransactionData;
use cellar_ledger::types::{Address, Digest};
use cellar_ledger::Network;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::{Error, RelayConfiguration, SponsoredTransaction};

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return Error::Unavailable("relay timed out".to_string());
        }

        Error::Unavailable(value.without_url().to_string())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SponsorRequest<'a> {
    network: &'a str,
    transaction_block_kind_bytes: String,
    sender: String,

    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    allowed_move_call_targets: &'a [String],

    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    allowed_addresses: &'a [String],
}

#[derive(Deserialize)]
struct SponsorResponse {
    data: SponsorData,
}

#[derive(Deserialize)]
struct SponsorData {
    bytes: String,
    digest: String,

    #[serde(default)]
    signature: Option<String>,
}

#[derive(Deserialize)]
struct RelayErrors {
    errors: Vec<RelayErrorMessage>,
}

#[derive(Deserialize)]
struct RelayErrorMessage {
    message: String,
}

#[derive(Clone)]
pub struct RelaySponsoring {
    configuration: RelayConfiguration,
    headers: HeaderMap,
    client: Client,
}

impl RelaySponsoring {
    pub fn new(configuration: RelayConfiguration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(configuration.timeout))
            .build()
            .map_err(|_| Error::Configuration("cannot build relay client".to_string()))?;

        let headers = configuration
            .headers
            .iter()
            .filter_map(|(k, v)| {
                let name = HeaderName::from_bytes(k.as_bytes()).ok()?;
                let value = HeaderValue::from_str(v).ok()?;
                Some((name, value))
            })
            .collect::<HeaderMap>();

        Ok(Self { configuration, headers, client })
    }

    pub async fn sponsor(&self, transaction_kind_bytes: &[u8], sender: Address, network: Network) -> Result<SponsoredTransaction, Error> {
        let url = self.url()?;
        let headers = self.headers()?;

        let body = SponsorRequest {
            network: network.as_str(),
            transaction_block_kind_bytes: STANDARD.encode(transaction_kind_bytes),
            sender: sender.to_hex(),
            allowed_move_call_targets: &self.configuration.allowed_move_call_targets,
            allowed_addresses: &self.configuration.allowed_addresses,
        };
        let body = serde_json::to_string(&body).map_err(|e| Error::InvalidRequest(e.to_string()))?;

        let response = self.client.post(url).headers(headers).body(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Configuration(format!("relay refused the credential with {}", status)));
            },
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                return Err(Error::Unavailable(Self::relay_message(status, &text)));
            },
            status if status.is_client_error() => return Err(Error::Declined(Self::relay_message(status, &text))),
            status if !status.is_success() => return Err(Error::Unavailable(format!("relay answered {}", status))),
            _ => (),
        }

        let response = serde_json::from_str::<SponsorResponse>(&text).map_err(|e| Error::Unavailable(format!("malformed relay response: {}", e)))?;

        Self::verify(response.data, transaction_kind_bytes, sender)
    }

    fn url(&self) -> Result<Url, Error> {
        let endpoint = self.configuration.endpoint.trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(Error::Configuration("relay endpoint is missing".to_string()));
        }

        Url::parse(&format!("{}/transaction-blocks/sponsor", endpoint)).map_err(|_| Error::Configuration("relay endpoint is not a valid url".to_string()))
    }

    fn headers(&self) -> Result<HeaderMap, Error> {
        if self.configuration.api_key.is_empty() {
            return Err(Error::Configuration("relay credential is missing".to_string()));
        }

        let mut headers = self.headers.clone();
        let authorization = HeaderValue::from_str(&format!("Bearer {}", self.configuration.api_key.expose()))
            .map_err(|_| Error::Configuration("relay credential is not a valid header value".to_string()))?;

        headers.insert(AUTHORIZATION, authorization);
        headers.insert(reqwest::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    fn relay_message(status: StatusCode, text: &str) -> String {
        let messages = serde_json::from_str::<RelayErrors>(text)
            .map(|x| x.errors.into_iter().map(|x| x.message).collect::<Vec<_>>())
            .unwrap_or_default();

        if messages.is_empty() {
            format!("relay answered {}", status)
        } else {
            messages.join("; ")
        }
    }

    /// The relay must return the transaction we asked for, for the sender we asked for
    fn verify(data: SponsorData, transaction_kind_bytes: &[u8], sender: Address) -> Result<SponsoredTransaction, Error> {
        let transaction = TransactionData::from_base64(&data.bytes).map_err(|_| Error::Unavailable("relay returned undecodable bytes".to_string()))?;
        let digest = transaction.digest().map_err(|_| Error::Unavailable("relay returned undecodable bytes".to_string()))?;

        let announced: Digest = data.digest.parse().map_err(|_| Error::Unavailable("relay returned an invalid digest".to_string()))?;
        if announced != digest {
            return Err(Error::Unavailable(format!("relay digest {} does not match transaction {}", announced, digest)));
        }

        if transaction.sender() != sender {
            return Err(Error::Unavailable(format!("relay changed the sender to {}", transaction.sender())));
        }

        let kind = transaction.kind().to_bytes().map_err(|_| Error::Unavailable("relay returned undecodable bytes".to_string()))?;
        if kind != transaction_kind_bytes {
            return Err(Error::Unavailable("relay altered the transaction".to_string()));
        }

        Ok(SponsoredTransaction {
            bytes: data.bytes,
            digest,
            sponsor_signature: data.signature,
        })
    }
}
