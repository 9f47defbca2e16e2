//! Thin GraphQL client for the commerce backend.
//!
//! Every request is a `POST` of `{ query, variables }` to one endpoint.
//! Authentication is a token placed in either the `Authorization: Bearer`
//! header or a configured header name, supplied by a pluggable
//! [`TokenSource`].
//!
//! # Usage
//!
//! ```ignore
//! use shopfront_commerce::{GraphQLClient, StaticToken, Storefront, TokenHeader};
//!
//! let client = GraphQLClient::new(
//!     "https://shop.example/api/graphql",
//!     Arc::new(StaticToken::new("public-token")),
//!     TokenHeader::named("X-Storefront-Access-Token"),
//! );
//! let storefront = Storefront::new(client);
//! let products = storefront.products(10).await?;
//! ```

pub mod graphql;
pub mod storefront;

pub use graphql::{GraphQLClient, GraphQLError, GraphQLResponse, TokenHeader};
pub use storefront::{Cart, CartLine, Money, Product, Storefront, StorefrontApi, UserError};

// ── Error ───────────────────────────────────────────────────────────

/// Commerce client error.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("auth: {0}")]
    Auth(String),

    #[error("decode: {0}")]
    Decode(String),

    #[error("graphql: {}", join_messages(.0))]
    GraphQL(Vec<GraphQLError>),

    #[error("response carried neither data nor errors")]
    MissingData,

    /// The mutation ran but the backend refused the input.
    #[error("rejected: {}", join_user_errors(.0))]
    Rejected(Vec<UserError>),
}

fn join_messages(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

// ── TokenSource ─────────────────────────────────────────────────────

/// Pluggable token provider. Called before every request.
///
/// Returns `Ok(None)` to send the request without a token header.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, ClientError>;
}

/// Anonymous requests.
pub struct NoAuth;

#[async_trait::async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>, ClientError> {
        Ok(None)
    }
}

/// A token obtained out of band (storefront access tokens are long-lived).
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, ClientError> {
        if self.0.is_empty() {
            return Err(ClientError::Auth("empty static token".into()));
        }
        Ok(Some(self.0.clone()))
    }
}
