//! Optimization passes for the IR.
//!
//! Passes are free functions over a mutable module, returning whether they
//! changed anything. Configuration is passed by reference; no global state.

pub mod outlining;
