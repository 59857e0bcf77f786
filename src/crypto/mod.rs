//! Cryptographic primitives for webhook authentication.

pub mod signature;
