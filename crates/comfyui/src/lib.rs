//! ComfyUI editor-surface integration for the templater.
//!
//! Provides snapshot sources (file and HTTP), a REST wrapper for reading
//! the installed checkpoint list, and the one-shot "fetch then extract"
//! entry point.

pub mod api;
pub mod builder;
pub mod source;
