use crate::config::toml_config::SourceConfig;
use crate::domain::model::{Listing, Product, DEFAULT_CURRENCY};
use crate::utils::error::{EtlError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// Only the fields the index needs.
const LISTING_SEARCH_QUERY: &str = r#"
query ListingSearchQuery($searchParameters: [SearchParameter!]) {
  clientCompatibleListings(searchParameters: $searchParameters) {
    __typename
    ... on ListingSuccess {
      data {
        id
        title
        params {
          key
          value {
            __typename
            ... on PriceParam {
              value
              currency
            }
          }
        }
        location {
          city { name }
          region { name }
        }
      }
      metadata {
        total_elements
      }
    }
    ... on ListingError {
      error { code detail }
    }
  }
}
"#;

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'static str,
    variables: SearchVariables<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchVariables<'a> {
    search_parameters: Vec<SearchParameter<'a>>,
}

#[derive(Debug, Serialize)]
struct SearchParameter<'a> {
    key: &'a str,
    value: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(rename = "clientCompatibleListings")]
    listings: Option<ListingsResult>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum ListingsResult {
    ListingSuccess {
        #[serde(default)]
        data: Option<Vec<RawListing>>,
        #[serde(default)]
        metadata: Option<Metadata>,
    },
    ListingError {
        #[serde(default)]
        error: Option<ApiErrorDetail>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    total_elements: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Value,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawListing {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    params: Option<Vec<RawParam>>,
    #[serde(default)]
    location: Option<RawLocation>,
}

#[derive(Debug, Deserialize)]
struct RawParam {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    #[serde(default)]
    city: Option<Named>,
    #[serde(default)]
    region: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    name: Option<String>,
}

/// One page of search results, already reduced to listings with a price.
#[derive(Debug, Default)]
pub struct ListingPage {
    pub listings: Vec<Listing>,
    pub total: usize,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl RawListing {
    /// 從 params 中取出第一個有效的 PriceParam
    fn price(&self) -> Option<(i64, String)> {
        let params = self.params.as_ref()?;
        params
            .iter()
            .filter(|param| param.key.as_deref() == Some("price"))
            .filter_map(|param| param.value.as_ref())
            .filter(|value| value.get("__typename").and_then(Value::as_str) == Some("PriceParam"))
            .find_map(|value| {
                let amount = match value.get("value")? {
                    Value::Number(n) => n.as_f64()?,
                    Value::String(s) => s.trim().parse::<f64>().ok()?,
                    _ => return None,
                };
                let currency = value
                    .get("currency")
                    .and_then(Value::as_str)
                    .filter(|c| !c.is_empty())
                    .unwrap_or(DEFAULT_CURRENCY)
                    .to_string();
                Some((amount.trunc() as i64, currency))
            })
    }

    fn into_listing(self) -> Option<Listing> {
        let (price, currency) = self.price()?;
        let (city, region) = match self.location {
            Some(location) => (
                location.city.and_then(|c| c.name).unwrap_or_default(),
                location.region.and_then(|r| r.name).unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };

        Some(Listing {
            id: value_to_string(&self.id),
            title: self.title.unwrap_or_default(),
            price,
            currency,
            city,
            region,
        })
    }
}

impl GraphQlResponse {
    fn into_page(self) -> Result<ListingPage> {
        let listings = self.data.and_then(|d| d.listings);

        match listings {
            Some(ListingsResult::ListingSuccess { data, metadata }) => {
                let raw = data.unwrap_or_default();
                let raw_count = raw.len();
                let listings: Vec<Listing> =
                    raw.into_iter().filter_map(RawListing::into_listing).collect();
                if listings.len() < raw_count {
                    tracing::debug!(
                        "Skipped {} listings without a price",
                        raw_count - listings.len()
                    );
                }
                Ok(ListingPage {
                    listings,
                    total: metadata.and_then(|m| m.total_elements).unwrap_or(0),
                })
            }
            Some(ListingsResult::ListingError { error }) => {
                let (code, detail) = match error {
                    Some(e) => (value_to_string(&e.code), e.detail.unwrap_or_default()),
                    None => (String::new(), String::new()),
                };
                tracing::error!("OLX API error: {} - {}", code, detail);
                Err(EtlError::GraphQlError { code, detail })
            }
            Some(ListingsResult::Unknown) => {
                tracing::warn!("Unexpected listing result type, treating as empty");
                Ok(ListingPage::default())
            }
            None => match self.errors.and_then(|errors| errors.into_iter().next()) {
                Some(first) => Err(EtlError::GraphQlError {
                    code: "GRAPHQL".to_string(),
                    detail: first.message.unwrap_or_default(),
                }),
                None => Ok(ListingPage::default()),
            },
        }
    }
}

/// Client for the OLX GraphQL listing search.
pub struct OlxClient {
    client: Client,
    config: SourceConfig,
}

impl OlxClient {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        // 2^(attempt+1) 倍基礎延遲：預設 2s, 4s
        let factor = 1u64 << (attempt + 1).min(16);
        Duration::from_millis(self.config.retry_delay_ms.saturating_mul(factor))
    }

    async fn request_page(&self, query: &str, offset: usize) -> Result<ListingPage> {
        let body = GraphQlRequest {
            query: LISTING_SEARCH_QUERY,
            variables: SearchVariables {
                search_parameters: vec![
                    SearchParameter {
                        key: "offset",
                        value: offset.to_string(),
                    },
                    SearchParameter {
                        key: "limit",
                        value: self.config.page_size.to_string(),
                    },
                    SearchParameter {
                        key: "query",
                        value: query.to_string(),
                    },
                ],
            },
        };

        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let is_last = attempt + 1 == attempts;

            match self.client.post(&self.config.endpoint).json(&body).send().await {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    last_error = Some(EtlError::RateLimited { attempts });
                    if !is_last {
                        let wait = Duration::from_secs(self.config.rate_limit_wait_seconds);
                        tracing::warn!("Rate limited, waiting {:?}...", wait);
                        tokio::time::sleep(wait).await;
                    }
                    continue;
                }
                Ok(response) if response.status().is_success() => {
                    let bytes = response.bytes().await?;
                    let payload: GraphQlResponse = serde_json::from_slice(&bytes)?;
                    return payload.into_page();
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    tracing::error!("HTTP error {} from {}", status, self.config.endpoint);
                    last_error = Some(EtlError::HttpStatus {
                        status,
                        url: self.config.endpoint.clone(),
                    });
                }
                Err(e) => {
                    tracing::error!("Request error: {}", e);
                    last_error = Some(EtlError::ApiError(e));
                }
            }

            if !is_last {
                let wait = self.retry_delay(attempt);
                tracing::info!("Retrying in {:?}...", wait);
                tokio::time::sleep(wait).await;
            }
        }

        Err(last_error.unwrap_or(EtlError::RateLimited { attempts }))
    }

    /// Walk every result page for the product's query.
    pub async fn fetch_all(&self, product: &Product) -> Result<Vec<Listing>> {
        tracing::info!("Fetching listings for: {}", product.name);

        let first = self.request_page(&product.query, 0).await?;
        let total = first.total;
        tracing::info!("Total listings found: {}", total);

        if total == 0 {
            return Ok(Vec::new());
        }

        let limit = self
            .config
            .max_listings
            .map(|max| max.min(total))
            .unwrap_or(total);
        let page_size = self.config.page_size.max(1);

        let mut listings = first.listings;
        let mut offset = page_size;
        while offset < limit {
            tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
            let page = self.request_page(&product.query, offset).await?;
            listings.extend(page.listings);
            offset += page_size;
            tracing::debug!("Fetched {}/{} listings", listings.len(), total);
        }

        // 置頂廣告可能在多頁重複出現
        let mut seen = HashSet::new();
        let before = listings.len();
        listings.retain(|l| l.id.is_empty() || seen.insert(l.id.clone()));
        if listings.len() < before {
            tracing::debug!("Dropped {} duplicate listings", before - listings.len());
        }

        if let Some(max) = self.config.max_listings {
            listings.truncate(max);
        }

        tracing::info!("Collected {} listings with valid prices", listings.len());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn listing(id: u64, price: Value) -> Value {
        json!({
            "id": id,
            "title": format!("Listing {}", id),
            "params": [
                {"key": "state", "value": {"__typename": "GenericParam"}},
                {"key": "price", "value": {"__typename": "PriceParam", "value": price, "currency": "RON"}}
            ],
            "location": {"city": {"name": "Cluj-Napoca"}, "region": {"name": "Cluj"}}
        })
    }

    fn success(data: Vec<Value>, total: usize) -> Value {
        json!({
            "data": {
                "clientCompatibleListings": {
                    "__typename": "ListingSuccess",
                    "data": data,
                    "metadata": {"total_elements": total}
                }
            }
        })
    }

    fn source(endpoint: String, page_size: usize) -> SourceConfig {
        SourceConfig {
            endpoint,
            page_size,
            retry_delay_ms: 0,
            rate_limit_wait_seconds: 0,
            request_delay_ms: 0,
            ..SourceConfig::default()
        }
    }

    fn product() -> Product {
        Product {
            slug: "aeron".to_string(),
            name: "Herman Miller Aeron".to_string(),
            query: "herman miller aeron".to_string(),
            emoji: String::new(),
        }
    }

    #[test]
    fn test_price_extraction() {
        let raw: RawListing = serde_json::from_value(listing(1, json!(4500.9))).unwrap();
        let parsed = raw.into_listing().unwrap();
        assert_eq!(parsed.id, "1");
        assert_eq!(parsed.price, 4500);
        assert_eq!(parsed.currency, "RON");
        assert_eq!(parsed.city, "Cluj-Napoca");
        assert_eq!(parsed.region, "Cluj");
    }

    #[test]
    fn test_listing_without_price_is_skipped() {
        let raw: RawListing = serde_json::from_value(json!({
            "id": "abc",
            "title": "Schimb",
            "params": [{"key": "price", "value": {"__typename": "GenericParam"}}]
        }))
        .unwrap();
        assert!(raw.into_listing().is_none());

        let null_price: RawListing = serde_json::from_value(listing(2, Value::Null)).unwrap();
        assert!(null_price.into_listing().is_none());
    }

    #[test]
    fn test_null_leaf_fields_do_not_fail_page() {
        let response: GraphQlResponse = serde_json::from_value(json!({
            "data": {
                "clientCompatibleListings": {
                    "__typename": "ListingSuccess",
                    "data": [
                        {
                            "id": 7,
                            "title": null,
                            "params": [
                                {"key": null, "value": null},
                                {"key": "price", "value": {"__typename": "PriceParam", "value": 1200, "currency": null}}
                            ],
                            "location": {"city": {"name": null}, "region": null}
                        },
                        listing(8, json!(1300))
                    ],
                    "metadata": {"total_elements": null}
                }
            }
        }))
        .unwrap();

        let page = response.into_page().unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.listings.len(), 2);
        assert_eq!(page.listings[0].price, 1200);
        assert_eq!(page.listings[0].currency, "RON");
        assert_eq!(page.listings[0].city, "");
        assert_eq!(page.listings[0].region, "");
        assert_eq!(page.listings[0].title, "");
        assert_eq!(page.listings[1].city, "Cluj-Napoca");
    }

    #[test]
    fn test_listing_error_becomes_graphql_error() {
        let response: GraphQlResponse = serde_json::from_value(json!({
            "data": {
                "clientCompatibleListings": {
                    "__typename": "ListingError",
                    "error": {"code": 400, "detail": "bad query"}
                }
            }
        }))
        .unwrap();

        match response.into_page() {
            Err(EtlError::GraphQlError { code, detail }) => {
                assert_eq!(code, "400");
                assert_eq!(detail, "bad query");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_paginates() {
        let server = MockServer::start();

        let first = server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .body_contains(r#"{"key":"offset","value":"0"}"#);
            then.status(200).json_body(success(
                vec![listing(1, json!(1000)), listing(2, json!(2000))],
                3,
            ));
        });
        let second = server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .body_contains(r#"{"key":"offset","value":"2"}"#);
            then.status(200)
                .json_body(success(vec![listing(3, json!(3000))], 3));
        });

        let client = OlxClient::new(source(server.url("/graphql"), 2)).unwrap();
        let listings = client.fetch_all(&product()).await.unwrap();

        first.assert();
        second.assert();
        let prices: Vec<i64> = listings.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![1000, 2000, 3000]);
    }

    #[tokio::test]
    async fn test_fetch_all_sends_query_and_limit() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .body_contains(r#"{"key":"limit","value":"50"}"#)
                .body_contains(r#"{"key":"query","value":"herman miller aeron"}"#);
            then.status(200).json_body(success(vec![], 0));
        });

        let client = OlxClient::new(source(server.url("/graphql"), 50)).unwrap();
        let listings = client.fetch_all(&product()).await.unwrap();

        mock.assert();
        assert!(listings.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_promoted_listings_are_dropped() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .body_contains(r#"{"key":"offset","value":"0"}"#);
            then.status(200)
                .json_body(success(vec![listing(7, json!(900)), listing(8, json!(950))], 4));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .body_contains(r#"{"key":"offset","value":"2"}"#);
            then.status(200)
                .json_body(success(vec![listing(7, json!(900)), listing(9, json!(990))], 4));
        });

        let client = OlxClient::new(source(server.url("/graphql"), 2)).unwrap();
        let listings = client.fetch_all(&product()).await.unwrap();

        let ids: Vec<&str> = listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "8", "9"]);
    }

    #[tokio::test]
    async fn test_max_listings_caps_paging() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(POST).path("/graphql");
            then.status(200).json_body(success(
                vec![listing(1, json!(10)), listing(2, json!(20))],
                500,
            ));
        });

        let mut config = source(server.url("/graphql"), 2);
        config.max_listings = Some(2);
        let client = OlxClient::new(config).unwrap();
        let listings = client.fetch_all(&product()).await.unwrap();

        first.assert_hits(1);
        assert_eq!(listings.len(), 2);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_returned() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/graphql");
            then.status(503);
        });

        let client = OlxClient::new(source(server.url("/graphql"), 50)).unwrap();
        let err = client.fetch_all(&product()).await.unwrap_err();

        mock.assert_hits(3);
        assert!(matches!(err, EtlError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_attempts() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/graphql");
            then.status(429);
        });

        let client = OlxClient::new(source(server.url("/graphql"), 50)).unwrap();
        let err = client.fetch_all(&product()).await.unwrap_err();

        mock.assert_hits(3);
        assert!(matches!(err, EtlError::RateLimited { attempts: 3 }));
    }
}
