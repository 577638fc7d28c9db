//! A compact SSA intermediate representation for a JavaScript VM, together
//! with an instruction-outlining optimizer.
//!
//! Outlining is the dual of inlining: recurring straight-line instruction
//! sequences scattered across functions are extracted into a single shared
//! function, and each occurrence is replaced by a call. The entry point is
//! [`passes::outlining::run`].
//!
//! Module map:
//! - `ir` — the data model (instructions, blocks, functions, modules) and the
//!   builder used to construct and rewrite it.
//! - `analysis` — per-range services the outliner consumes: canonical
//!   instruction numbering and escape analysis.
//! - `support` — the generic repeated-substring finder and the outliner
//!   driver types (candidates, descriptors, cost model, overlap pruning).
//! - `passes` — the outlining pass itself.

pub mod analysis;
pub mod ir;
pub mod passes;
pub mod support;
