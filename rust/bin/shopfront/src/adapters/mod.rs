//! Stand-ins for third-party SDKs.
//!
//! Each adapter is a trait plus a local implementation that only honors the
//! call contract. Real providers plug in behind the same traits.

mod analytics;
mod catalog;
mod payment;

pub use analytics::{Analytics, MemoryAnalytics, TracingAnalytics};
pub use catalog::OfflineStorefront;
pub use payment::{
    DummyPayments, PaymentError, PaymentGateway, PaymentOutcome, PaymentRequest, PaymentStatus,
};
