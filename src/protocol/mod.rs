//! Gateway wire protocol: envelopes, records, typed mapping.

pub mod envelope;
pub mod mapper;
pub mod models;
