use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Decimal string, e.g. `"24.00"`.
    pub amount: String,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentStatus {
    Approved,
    Declined { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentOutcome {
    pub reference: String,
    #[serde(flatten)]
    pub status: PaymentStatus,
}

/// The request could not be processed at all.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn start_payment(&self, request: &PaymentRequest) -> Result<PaymentOutcome, PaymentError>;
}

/// Approves any positive amount; declines zero.
#[derive(Default)]
pub struct DummyPayments {
    next_ref: AtomicU64,
}

impl DummyPayments {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PaymentGateway for DummyPayments {
    async fn start_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentOutcome, PaymentError> {
        let amount: f64 = request
            .amount
            .trim()
            .parse()
            .map_err(|_| PaymentError::InvalidAmount(request.amount.clone()))?;
        if amount < 0.0 || !amount.is_finite() {
            return Err(PaymentError::InvalidAmount(request.amount.clone()));
        }

        let reference = format!("dummy-{}", self.next_ref.fetch_add(1, Ordering::Relaxed) + 1);
        let status = if amount == 0.0 {
            PaymentStatus::Declined {
                reason: "nothing to charge".to_string(),
            }
        } else {
            PaymentStatus::Approved
        };
        info!(
            %reference,
            amount = %request.amount,
            currency = %request.currency,
            ?status,
            "payment"
        );
        Ok(PaymentOutcome { reference, status })
    }
}
