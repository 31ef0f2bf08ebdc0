//! Workflow-to-template extraction.
//!
//! Turns a ComfyUI editor snapshot (the visual graph plus its compiled
//! execution graph) into a set of user-editable parameter definitions,
//! rewriting every claimed execution-graph input into a placeholder that
//! an external substitution engine resolves at generation time.

pub mod annotate;
pub mod assembly;
pub mod classify;
pub mod error;
pub mod extract;
pub mod graph;
pub mod naming;
pub mod params;
pub mod placeholder;
pub mod rules;
