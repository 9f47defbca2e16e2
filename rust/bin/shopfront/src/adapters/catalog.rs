use std::sync::{Mutex, PoisonError};

use shopfront_commerce::{Cart, CartLine, ClientError, Money, Product, StorefrontApi, UserError};

/// In-process storefront used when no backend endpoint is configured.
///
/// Serves a fixed catalog and keeps carts in memory.
pub struct OfflineStorefront {
    products: Vec<Product>,
    carts: Mutex<Vec<Cart>>,
}

impl OfflineStorefront {
    pub fn new() -> Self {
        let product = |id: &str, title: &str, amount: &str| Product {
            id: id.to_string(),
            title: title.to_string(),
            price: Money {
                amount: amount.to_string(),
                currency_code: "EUR".to_string(),
            },
            variant_id: format!("{id}-default"),
        };
        Self {
            products: vec![
                product("mug", "Enamel Mug", "12.00"),
                product("tee", "Logo Tee", "24.00"),
                product("tote", "Canvas Tote", "18.50"),
            ],
            carts: Mutex::new(Vec::new()),
        }
    }

    fn with_cart<F>(&self, cart_id: &str, f: F) -> Result<Cart, ClientError>
    where
        F: FnOnce(&mut Cart) -> Result<(), ClientError>,
    {
        let mut carts = self.carts.lock().unwrap_or_else(PoisonError::into_inner);
        let cart = carts
            .iter_mut()
            .find(|c| c.id == cart_id)
            .ok_or_else(|| rejected("cart not found"))?;
        f(cart)?;
        cart.total_quantity = cart.lines.iter().map(|l| l.quantity).sum();
        Ok(cart.clone())
    }
}

impl Default for OfflineStorefront {
    fn default() -> Self {
        Self::new()
    }
}

fn rejected(message: &str) -> ClientError {
    ClientError::Rejected(vec![UserError {
        field: None,
        message: message.to_string(),
    }])
}

#[async_trait::async_trait]
impl StorefrontApi for OfflineStorefront {
    async fn products(&self, first: u32) -> Result<Vec<Product>, ClientError> {
        Ok(self.products.iter().take(first as usize).cloned().collect())
    }

    async fn create_cart(&self) -> Result<Cart, ClientError> {
        let mut carts = self.carts.lock().unwrap_or_else(PoisonError::into_inner);
        let cart = Cart {
            id: format!("offline-cart-{}", carts.len() + 1),
            total_quantity: 0,
            lines: Vec::new(),
        };
        carts.push(cart.clone());
        Ok(cart)
    }

    async fn add_cart_line(
        &self,
        cart_id: &str,
        variant_id: &str,
        quantity: u32,
    ) -> Result<Cart, ClientError> {
        if quantity == 0 {
            return Err(rejected("quantity must be positive"));
        }
        if !self.products.iter().any(|p| p.variant_id == variant_id) {
            return Err(rejected("unknown merchandise"));
        }
        self.with_cart(cart_id, |cart| {
            match cart.lines.iter_mut().find(|l| l.merchandise_id == variant_id) {
                Some(line) => line.quantity += quantity,
                None => {
                    let id = format!("{}-line-{}", cart.id, cart.lines.len() + 1);
                    cart.lines.push(CartLine {
                        id,
                        merchandise_id: variant_id.to_string(),
                        quantity,
                    });
                }
            }
            Ok(())
        })
    }

    async fn remove_cart_line(&self, cart_id: &str, line_id: &str) -> Result<Cart, ClientError> {
        self.with_cart(cart_id, |cart| {
            let before = cart.lines.len();
            cart.lines.retain(|l| l.id != line_id);
            if cart.lines.len() == before {
                return Err(rejected("line not found"));
            }
            Ok(())
        })
    }
}
