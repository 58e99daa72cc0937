//! Push delivery worker for WPNS apps.
//!
//! A `Delivery` sends one notification, classifies the provider's answer,
//! reports the outcome to its batch and keeps the worker's safe mode up to
//! date. `AppWorker` and `AppRunner` run deliveries one app at a time.

pub mod classifier;
pub mod delivery;
pub mod error;
pub mod ingest;
pub mod outcome;
pub mod payload;
pub mod reporter;
pub mod runner;
pub mod safe_mode;
pub mod transport;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use delivery::{Delivery, DeliverySettings};
pub use error::{DeliveryError, RunnerError, TransportError};
pub use outcome::Outcome;
pub use reporter::{BatchReporter, InMemoryBatch, LoggingReporter};
pub use safe_mode::SafeModeState;
pub use transport::{HttpResponse, ReqwestTransport, Transport};
