//! Types and traits that are used across multiple components of Converge-rs.
//!
//! Other types, specific to single components, can be found in the modules of those
//! components, e.g., [`crate::consensus`].

pub mod data_types;

pub mod crypto_primitives;
