//! Typed storefront operations on top of [`GraphQLClient`].

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::graphql::GraphQLClient;
use crate::ClientError;

// ── Models ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    /// Decimal string, as the backend sends it.
    pub amount: String,
    pub currency_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    pub price: Money,
    /// Default variant; what `add_cart_line` takes.
    pub variant_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: String,
    pub merchandise_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: String,
    pub total_quantity: u32,
    #[serde(default)]
    pub lines: Vec<CartLine>,
}

/// Input validation failure reported inside a mutation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

// ── Operations ──────────────────────────────────────────────────────

const PRODUCTS: &str = "query Products($first: Int!) { \
    products(first: $first) { id title price { amount currencyCode } variantId } }";

const CART_FIELDS: &str = "cart { id totalQuantity lines { id merchandiseId quantity } } \
    userErrors { field message }";

#[derive(Deserialize)]
struct ProductsData {
    products: Vec<Product>,
}

/// `{ cart, userErrors }` returned by every cart mutation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartPayload {
    cart: Option<Cart>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

impl CartPayload {
    fn into_cart(self) -> Result<Cart, ClientError> {
        if !self.user_errors.is_empty() {
            return Err(ClientError::Rejected(self.user_errors));
        }
        self.cart.ok_or(ClientError::MissingData)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartCreateData {
    cart_create: CartPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLinesAddData {
    cart_lines_add: CartPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLinesRemoveData {
    cart_lines_remove: CartPayload,
}

/// The storefront calls native handlers make.
///
/// Handlers hold an `Arc<dyn StorefrontApi>` so tests can swap in a fake.
#[async_trait::async_trait]
pub trait StorefrontApi: Send + Sync + 'static {
    async fn products(&self, first: u32) -> Result<Vec<Product>, ClientError>;
    async fn create_cart(&self) -> Result<Cart, ClientError>;
    async fn add_cart_line(
        &self,
        cart_id: &str,
        variant_id: &str,
        quantity: u32,
    ) -> Result<Cart, ClientError>;
    async fn remove_cart_line(&self, cart_id: &str, line_id: &str) -> Result<Cart, ClientError>;
}

/// [`StorefrontApi`] over GraphQL.
pub struct Storefront {
    client: GraphQLClient,
}

impl Storefront {
    pub fn new(client: GraphQLClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GraphQLClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl StorefrontApi for Storefront {
    async fn products(&self, first: u32) -> Result<Vec<Product>, ClientError> {
        let data: ProductsData = self
            .client
            .execute(PRODUCTS, &json!({ "first": first }))
            .await?;
        debug!(count = data.products.len(), "products loaded");
        Ok(data.products)
    }

    async fn create_cart(&self) -> Result<Cart, ClientError> {
        let query = format!("mutation CartCreate {{ cartCreate {{ {CART_FIELDS} }} }}");
        let data: CartCreateData = self.client.execute(&query, &json!({})).await?;
        data.cart_create.into_cart()
    }

    async fn add_cart_line(
        &self,
        cart_id: &str,
        variant_id: &str,
        quantity: u32,
    ) -> Result<Cart, ClientError> {
        let query = format!(
            "mutation CartLinesAdd($cartId: ID!, $lines: [CartLineInput!]!) \
             {{ cartLinesAdd(cartId: $cartId, lines: $lines) {{ {CART_FIELDS} }} }}"
        );
        let variables = json!({
            "cartId": cart_id,
            "lines": [{ "merchandiseId": variant_id, "quantity": quantity }],
        });
        let data: CartLinesAddData = self.client.execute(&query, &variables).await?;
        data.cart_lines_add.into_cart()
    }

    async fn remove_cart_line(&self, cart_id: &str, line_id: &str) -> Result<Cart, ClientError> {
        let query = format!(
            "mutation CartLinesRemove($cartId: ID!, $lineIds: [ID!]!) \
             {{ cartLinesRemove(cartId: $cartId, lineIds: $lineIds) {{ {CART_FIELDS} }} }}"
        );
        let variables = json!({ "cartId": cart_id, "lineIds": [line_id] });
        let data: CartLinesRemoveData = self.client.execute(&query, &variables).await?;
        data.cart_lines_remove.into_cart()
    }
}
