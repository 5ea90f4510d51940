use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::{Backend, ChangeSink, Query, RealtimeClient, Row, Subscription};
use crate::auth::TokenSource;
use crate::config::BackendConfig;
use crate::constants::DEFAULT_SCHEMA;
use crate::error::BackendError;
use crate::models::{OperationFilter, Table};

/// The hosted database's REST interface, with change subscriptions
/// delegated to the realtime socket.
pub struct RestBackend {
    http: reqwest::Client,
    rest_url: String,
    anon_key: String,
    schema: String,
    tokens: TokenSource,
    realtime: RealtimeClient,
}

impl RestBackend {
    pub fn new(config: &BackendConfig, tokens: TokenSource) -> Self {
        Self {
            http: reqwest::Client::new(),
            rest_url: config.rest_url(),
            anon_key: config.anon_key.clone(),
            schema: config.schema.clone(),
            realtime: RealtimeClient::new(config, tokens.clone()),
            tokens,
        }
    }

    /// Backend that acts with the public key only.
    pub fn anonymous(config: &BackendConfig) -> Self {
        Self::new(config, TokenSource::anonymous(config.anon_key.clone()))
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        let mut request = self
            .http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.tokens.bearer());
        if self.schema != DEFAULT_SCHEMA {
            request = request
                .header("Accept-Profile", &self.schema)
                .header("Content-Profile", &self.schema);
        }
        request
    }

    async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::AuthExpired);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn rows(response: Response) -> Result<Vec<Row>, BackendError> {
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
pub(crate) fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl Backend for RestBackend {
    async fn fetch(&self, table: Table, query: &Query) -> Result<Vec<Row>, BackendError> {
        let mut params = vec![("select", "*".to_string())];
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order", format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        let response = Self::send(self.request(Method::GET, table).query(&params)).await?;
        let rows = Self::rows(response).await?;
        debug!(table = %table, rows = rows.len(), "fetched");
        Ok(rows)
    }

    async fn fetch_by_id(&self, table: Table, id: &str) -> Result<Option<Row>, BackendError> {
        let request = self
            .request(Method::GET, table)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]);
        let rows = Self::rows(Self::send(request).await?).await?;
        Ok(rows.into_iter().next())
    }

    async fn update(&self, table: Table, id: &str, patch: &Row) -> Result<(), BackendError> {
        let request = self
            .request(Method::PATCH, table)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(patch);
        let rows = Self::rows(Self::send(request).await?).await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound {
                table,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), BackendError> {
        let request = self
            .request(Method::DELETE, table)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        let rows = Self::rows(Self::send(request).await?).await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound {
                table,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn count(&self, table: Table) -> Result<u64, BackendError> {
        let request = self
            .request(Method::HEAD, table)
            .query(&[("select", "id")])
            .header("Prefer", "count=exact");
        let response = Self::send(request).await?;
        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| BackendError::Rejected {
                status: response.status().as_u16(),
                message: "count response had no Content-Range total".to_string(),
            })
    }

    async fn subscribe(
        &self,
        table: Table,
        filter: OperationFilter,
        sink: ChangeSink,
    ) -> Result<Subscription, BackendError> {
        self.realtime.subscribe(table, filter, sink).await
    }

    async fn unsubscribe(&self, subscription: Subscription) -> Result<(), BackendError> {
        self.realtime.unsubscribe(subscription).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }
}
