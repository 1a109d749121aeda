//! Service implementations.
//!
//! Services hold the settlement flows; routes only parse, validate and
//! shape responses.

pub mod split_service;

pub use split_service::{CreateSplitInput, CreatedSplit, SplitService};
