//! Payment gateway integration.
//!
//! The gateway mints order ids for credit purchases and later signs the
//! verification callback; dropgate only ever calls its order-creation
//! endpoint.

mod client;
mod types;

pub use client::{GatewayClient, GatewayError};
pub use types::{CreateOrderRequest, GatewayOrder};
