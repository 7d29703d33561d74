//! Property-based tests for the USFM parser and the edit operations
//!
//! These check invariants that hold for ANY input, complementing the fixture
//! sweeps with inputs nobody thought to write down.

mod generators;
mod invariants;
