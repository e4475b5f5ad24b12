//! HTTP client for the CityStamp backend collaborators.

mod http;

pub use http::{ApiClient, ApiConfig, ApiError};
