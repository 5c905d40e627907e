//! Core data types shared across Tessera crates

pub mod escrow;
pub mod ids;
pub mod reputation;
