use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{ClientError, TokenSource};

/// Where the token goes on the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenHeader {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// `<name>: <token>`.
    Named(String),
}

impl TokenHeader {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// `"bearer"` / empty selects [`TokenHeader::Bearer`], anything else is a header name.
    pub fn from_config(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("bearer") {
            Self::Bearer
        } else {
            Self::Named(value.to_string())
        }
    }
}

/// One entry of the `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
}

/// The `{ data, errors }` response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQLError>>,
}

impl<T> GraphQLResponse<T> {
    /// Errors win over partial data.
    pub fn into_result(self) -> Result<T, ClientError> {
        match self.errors {
            Some(errors) if !errors.is_empty() => return Err(ClientError::GraphQL(errors)),
            _ => {}
        }
        self.data.ok_or(ClientError::MissingData)
    }
}

#[derive(Serialize)]
struct GraphQLRequest<'a, V: Serialize> {
    query: &'a str,
    variables: &'a V,
}

/// Sends GraphQL operations to one endpoint.
pub struct GraphQLClient {
    http: reqwest::Client,
    endpoint: String,
    token_source: Arc<dyn TokenSource>,
    header: TokenHeader,
}

impl GraphQLClient {
    pub fn new(
        endpoint: impl Into<String>,
        token_source: Arc<dyn TokenSource>,
        header: TokenHeader,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token_source,
            header,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build a request with the token header.
    async fn authed(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        match (self.token_source.token().await?, &self.header) {
            (Some(token), TokenHeader::Bearer) => Ok(builder.bearer_auth(token)),
            (Some(token), TokenHeader::Named(name)) => Ok(builder.header(name.as_str(), token)),
            (None, _) => Ok(builder),
        }
    }

    /// Run one operation and decode its `data` into `R`.
    pub async fn execute<V, R>(&self, query: &str, variables: &V) -> Result<R, ClientError>
    where
        V: Serialize,
        R: DeserializeOwned,
    {
        let req = self
            .http
            .post(&self.endpoint)
            .json(&GraphQLRequest { query, variables });
        let req = self.authed(req).await?;
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = code, endpoint = %self.endpoint, "graphql request failed");
            return Err(ClientError::Server { status: code, message: body });
        }

        let envelope: GraphQLResponse<R> = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(format!("response body: {}", e)))?;
        debug!(
            errors = envelope.errors.as_ref().map_or(0, Vec::len),
            "graphql response"
        );
        envelope.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_header_from_config() {
        assert_eq!(TokenHeader::from_config(""), TokenHeader::Bearer);
        assert_eq!(TokenHeader::from_config("Bearer"), TokenHeader::Bearer);
        assert_eq!(
            TokenHeader::from_config("X-Shop-Token"),
            TokenHeader::named("X-Shop-Token")
        );
    }

    #[test]
    fn envelope_with_data() {
        let resp: GraphQLResponse<Value> =
            serde_json::from_value(json!({ "data": { "ok": true } })).unwrap();
        assert_eq!(resp.into_result().unwrap(), json!({ "ok": true }));
    }

    #[test]
    fn errors_win_over_partial_data() {
        let resp: GraphQLResponse<Value> = serde_json::from_value(json!({
            "data": { "ok": true },
            "errors": [{ "message": "throttled", "path": ["products"] }],
        }))
        .unwrap();
        match resp.into_result() {
            Err(ClientError::GraphQL(errors)) => {
                assert_eq!(errors[0].message, "throttled");
                assert_eq!(errors[0].path, Some(vec![json!("products")]));
            }
            other => panic!("expected graphql error, got {other:?}"),
        }
    }

    #[test]
    fn null_errors_field_is_ignored() {
        let resp: GraphQLResponse<Value> =
            serde_json::from_value(json!({ "data": 1, "errors": null })).unwrap();
        assert_eq!(resp.into_result().unwrap(), json!(1));
    }

    #[test]
    fn null_data_without_errors_is_missing() {
        let resp: GraphQLResponse<Value> =
            serde_json::from_value(json!({ "data": null })).unwrap();
        assert!(matches!(resp.into_result(), Err(ClientError::MissingData)));
    }

    #[test]
    fn request_body_shape() {
        let vars = json!({ "first": 3 });
        let body = serde_json::to_value(GraphQLRequest {
            query: "{ x }",
            variables: &vars,
        })
        .unwrap();
        assert_eq!(body, json!({ "query": "{ x }", "variables": { "first": 3 } }));
    }
}
