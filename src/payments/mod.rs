//! Payment fulfilment module.
//!
//! # Data Flow
//! ```text
//! webhook (http::webhook)
//!     → processor.rs (paid? already fulfilled? order or top-up)
//!     → reseller::ResellerClient
//!     → store.rs (OrderRecord / TopupRecord)
//! ```

pub mod processor;
pub mod store;
pub mod types;

pub use processor::{process_payment, Fulfilment, FulfilmentError};
pub use store::{InMemoryOrderStore, OrderRecord, OrderStore, StoreError, TopupRecord, TransactionKind};
pub use types::PaymentEvent;
