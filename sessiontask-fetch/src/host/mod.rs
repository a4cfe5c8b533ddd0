//! Host APIs for performing task requests.
//!
//! - [`http`] - reqwest-backed transport

pub mod http;

pub use http::HttpTransport;
