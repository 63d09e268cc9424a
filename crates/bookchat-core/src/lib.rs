//! Bookchat Core crate - configuration, errors and shared types.
//!
//! Every other crate depends on this one: the chat request and response
//! shapes, stored record types, the layered configuration and the common
//! error enum live here.


pub mod config;
pub mod error;
pub mod types;
