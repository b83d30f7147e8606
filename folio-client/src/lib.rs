//! # Folio Client SDK
//!
//! A typed Rust client for the currency API.

use chrono::NaiveDate;
use folio_types::{
    BatchConvertRequest, BatchConvertResponse, ConvertRequest, ConvertResponse,
    CreateCurrencyRequest, CreateExchangeRateRequest, Currency, ExchangeRate, ExchangeRateId,
    ExchangeRatePrice, HealthResponse, PriceRangeQuery, RefreshSummary, RouteQuery, RouteResponse,
};
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Currency API client.
pub struct FolioClient {
    base_url: String,
    http: Client,
}

impl FolioClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Health and routing readiness.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get("/health").await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_currencies(&self) -> Result<Vec<Currency>, ClientError> {
        self.get("/api/currencies").await
    }

    pub async fn create_currency(&self, code: &str) -> Result<Currency, ClientError> {
        let req = CreateCurrencyRequest {
            code: code.to_string(),
        };
        self.post("/api/currencies", &req).await
    }

    pub async fn list_exchange_rates(&self) -> Result<Vec<ExchangeRate>, ClientError> {
        self.get("/api/exchangerates").await
    }

    /// Registers the directed exchange rate `base -> quote`.
    pub async fn create_exchange_rate(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<ExchangeRate, ClientError> {
        let req = CreateExchangeRateRequest {
            base_currency_code: base.to_string(),
            quote_currency_code: quote.to_string(),
        };
        self.post("/api/exchangerates", &req).await
    }

    /// Price history of one exchange rate, optionally bounded (inclusive).
    pub async fn list_prices(
        &self,
        id: ExchangeRateId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ExchangeRatePrice>, ClientError> {
        let req = self
            .http
            .get(self.url(&format!("/api/exchangerates/{}/prices", id)))
            .query(&PriceRangeQuery { from, to });
        self.send(req).await
    }

    /// Triggers a rate refresh on the server.
    pub async fn refresh(&self) -> Result<RefreshSummary, ClientError> {
        self.send(self.http.post(self.url("/api/exchangerates/refresh")))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Routing & conversion
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn route(&self, from: &str, to: &str) -> Result<RouteResponse, ClientError> {
        let req = self
            .http
            .get(self.url("/api/currencies/route"))
            .query(&RouteQuery {
                from: from.to_string(),
                to: to.to_string(),
            });
        self.send(req).await
    }

    /// Converts `amount`; a `None` date means today on the server.
    pub async fn convert(
        &self,
        amount: Decimal,
        source: &str,
        target: &str,
        date: Option<NaiveDate>,
    ) -> Result<ConvertResponse, ClientError> {
        let req = ConvertRequest {
            amount,
            source: source.to_string(),
            target: target.to_string(),
            date,
        };
        self.post("/api/currencies/convert", &req).await
    }

    pub async fn convert_batch(
        &self,
        conversions: Vec<ConvertRequest>,
    ) -> Result<BatchConvertResponse, ClientError> {
        self.post(
            "/api/currencies/convert/batch",
            &BatchConvertRequest { conversions },
        )
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.http.get(self.url(path))).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_client_creation() {
        let client = FolioClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = FolioClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_convert_sends_request_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/currencies/convert")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"amount":"100","source":"EUR","target":"AED","date":"1999-01-04"}"#.into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"amount":"432.98775","source":"EUR","target":"AED","date":"1999-01-04"}"#,
            )
            .create_async()
            .await;

        let client = FolioClient::new(server.url());
        let converted = client
            .convert(dec!(100), "EUR", "AED", NaiveDate::from_ymd_opt(1999, 1, 4))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(converted.amount, dec!(432.98775));
    }

    #[tokio::test]
    async fn test_route_uses_query_string() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/currencies/route")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("from".into(), "EUR".into()),
                mockito::Matcher::UrlEncoded("to".into(), "AED".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"source":"EUR","target":"AED","hops":2,"route":["EUR","USD","AED"]}"#)
            .create_async()
            .await;

        let client = FolioClient::new(server.url());
        let route = client.route("EUR", "AED").await.unwrap();

        mock.assert_async().await;
        assert_eq!(route.route, vec!["EUR", "USD", "AED"]);
    }

    #[tokio::test]
    async fn test_api_error_carries_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/currencies/convert")
            .with_status(503)
            .with_body(r#"{"error":"Currency routing table is not ready yet","code":503}"#)
            .create_async()
            .await;

        let client = FolioClient::new(server.url());
        let err = client
            .convert(dec!(1), "EUR", "USD", None)
            .await
            .unwrap_err();

        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 503);
                assert!(message.contains("not ready"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }
}
