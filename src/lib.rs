//! Filter expressions and style rules for map features.
//!
//! The [`dsl`] module is the engine: it compiles expression text such as
//! `kind == "park" and area > 1000` into a reusable [`dsl::Predicate`].
//! The rest of the crate is its callers: a predicate cache, the style rule
//! cascade, GeoJSON input/output and the command-line front end.

pub mod app;
pub mod cache;
pub mod config;
pub mod dsl;
pub mod features;
pub mod sinks;
pub mod style;

pub use cache::PredicateCache;
pub use dsl::{FilterError, Predicate, StructuredFilter, adapt, compile};
