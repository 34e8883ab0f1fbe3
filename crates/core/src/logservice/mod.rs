//! Destination log service abstraction.
//!
//! This module provides a `LogService` trait for the management and write calls the
//! migration makes, plus an HTTP implementation of the Aliyun Log Service API.

mod proto;
mod signer;
mod sls;
mod types;

pub use sls::SlsClient;
pub use types::*;
