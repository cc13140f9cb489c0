//! Oracle reply validation
//!
//! Fence stripping, JSON repair, and extraction from mixed content. Shape
//! checks on the parsed value belong to each caller.

mod json_repair;

pub use json_repair::{JsonRepairer, RepairOutcome, extract_json_from_response};
