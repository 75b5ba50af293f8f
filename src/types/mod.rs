//! Types and functions that are used across multiple components of this crate.
//!
//! Types specific to a single component live in the "types" submodule of that component, e.g.,
//! [`crate::binary_agreement::types`].

pub mod crypto_primitives;

pub mod data_types;

pub mod protocol_key;

pub mod quorum;
