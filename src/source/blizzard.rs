//! Battle.net game data API client.
//!
//! Authenticates with the OAuth2 client-credentials flow and reads the
//! auction listings of one connected realm and auction house per request.

use async_trait::async_trait;
use serde::Deserialize;
use snafu::prelude::*;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::BlizzardConfig;
use crate::error::{
    ClientBuildSnafu, DecodeSnafu, FetchError, RequestSnafu, StatusSnafu, TokenSnafu,
};
use crate::model::RawListing;

use super::AuctionSource;

/// Tokens are refreshed this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct AuctionsResponse {
    #[serde(default)]
    auctions: Vec<ApiAuction>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    id: i64,
}

/// Commodity listings carry no bid, and some listings no buyout.
#[derive(Debug, Deserialize)]
struct ApiAuction {
    item: ApiItem,
    #[serde(default)]
    bid: i64,
    #[serde(default)]
    buyout: i64,
    #[serde(default)]
    quantity: i64,
    #[serde(default)]
    time_left: String,
}

impl From<ApiAuction> for RawListing {
    fn from(auction: ApiAuction) -> Self {
        RawListing {
            item_id: auction.item.id,
            bid: auction.bid,
            buyout: auction.buyout,
            quantity: auction.quantity,
            time_left: auction.time_left,
        }
    }
}

/// HTTP client for the auction API.
pub struct BlizzardClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    oauth_url: String,
    api_url: String,
    namespace: String,
    locale: String,
    token: Mutex<Option<AccessToken>>,
}

impl std::fmt::Debug for BlizzardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlizzardClient<{}, {}>", self.api_url, self.namespace)
    }
}

impl BlizzardClient {
    pub fn new(config: &BlizzardConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            oauth_url: config.oauth_url(),
            api_url: config.api_url().trim_end_matches('/').to_string(),
            namespace: config.namespace(),
            locale: config.locale.clone(),
            token: Mutex::new(None),
        })
    }

    /// Return a cached token, requesting a new one when it is about to expire.
    async fn access_token(&self) -> Result<String, FetchError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.value.clone());
        }

        let response: TokenResponse = self
            .http
            .post(&self.oauth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context(TokenSnafu)?
            .error_for_status()
            .context(TokenSnafu)?
            .json()
            .await
            .context(TokenSnafu)?;

        if response.expires_in == 0 {
            warn!("Access token expires immediately; a new one is requested per call");
        } else {
            debug!(expires_in = response.expires_in, "Obtained access token");
        }

        let token = AccessToken {
            value: response.access_token,
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        };
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

#[async_trait]
impl AuctionSource for BlizzardClient {
    async fn get_auctions(
        &self,
        realm_id: i32,
        auction_house_id: i32,
    ) -> Result<Vec<RawListing>, FetchError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/data/wow/connected-realm/{realm_id}/auctions/{auction_house_id}",
            self.api_url
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("namespace", self.namespace.as_str()),
                ("locale", self.locale.as_str()),
            ])
            .send()
            .await
            .context(RequestSnafu { url: url.clone() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return StatusSnafu {
                url,
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let body: AuctionsResponse = response.json().await.context(DecodeSnafu { url })?;
        Ok(body.auctions.into_iter().map(RawListing::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> BlizzardConfig {
        BlizzardConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            region: "us".to_string(),
            namespace: None,
            locale: "en_US".to_string(),
            oauth_url: Some(format!("{}/token", server.uri())),
            api_url: Some(server.uri()),
            request_timeout_secs: 5,
        }
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-123",
                "token_type": "bearer",
                "expires_in": 86399
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_auctions_decodes_listings() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/data/wow/connected-realm/5820/auctions/2"))
            .and(query_param("namespace", "dynamic-classic1x-us"))
            .and(query_param("locale", "en_US"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "auctions": [
                    {
                        "id": 1,
                        "item": { "id": 2589 },
                        "bid": 150,
                        "buyout": 300,
                        "quantity": 3,
                        "time_left": "LONG"
                    },
                    {
                        "id": 2,
                        "item": { "id": 2592 },
                        "quantity": 1,
                        "time_left": "SHORT"
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = BlizzardClient::new(&config(&server)).unwrap();
        let listings = client.get_auctions(5820, 2).await.unwrap();

        assert_eq!(
            listings,
            vec![
                RawListing {
                    item_id: 2589,
                    bid: 150,
                    buyout: 300,
                    quantity: 3,
                    time_left: "LONG".to_string(),
                },
                RawListing {
                    item_id: 2592,
                    bid: 0,
                    buyout: 0,
                    quantity: 1,
                    time_left: "SHORT".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_token_is_reused_between_requests() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auctions": [] })))
            .expect(2)
            .mount(&server)
            .await;

        let client = BlizzardClient::new(&config(&server)).unwrap();
        assert!(client.get_auctions(1, 2).await.unwrap().is_empty());
        assert!(client.get_auctions(1, 6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = BlizzardClient::new(&config(&server)).unwrap();
        let err = client.get_auctions(5820, 2).await.unwrap_err();

        match err {
            FetchError::Status { status, body, url } => {
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
                assert!(url.ends_with("/data/wow/connected-realm/5820/auctions/2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_credentials_fail_before_fetch() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auctions": [] })))
            .expect(0)
            .mount(&server)
            .await;

        let client = BlizzardClient::new(&config(&server)).unwrap();
        let err = client.get_auctions(1, 2).await.unwrap_err();
        assert!(matches!(err, FetchError::Token { .. }));
    }

    #[tokio::test]
    async fn test_token_without_expiry_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-123",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auctions": [] })))
            .expect(0)
            .mount(&server)
            .await;

        let client = BlizzardClient::new(&config(&server)).unwrap();
        let err = client.get_auctions(1, 2).await.unwrap_err();
        assert!(matches!(err, FetchError::Token { .. }));
    }
}
