//! AWT tracking API
//!
//! ## Protocol
//!
//! 1. `POST /token` with API key, username and password
//! 2. Read the bearer token from the response
//! 3. `GET /api/v1/tracking-data?start_date=..&end_date=..` with the token
//!    and the API key as headers
//!
//! No token is reused between fetches.

mod client;
mod error;

pub use client::{date_range_query, extract_token, AwtClient, TrackingSource, TOKEN_FIELDS};
pub use error::ApiError;
