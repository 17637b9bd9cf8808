//! Dataset download with a patient retry policy

pub mod client;
pub mod retry;

pub use client::{HttpClient, HttpResponse, ReqwestClient, TransportError};
pub use retry::{RetryPolicy, RetryingFetcher};
