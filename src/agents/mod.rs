//! Agent System
//!
//! Agents wrap a single model interaction: build the prompt, call the model
//! client and turn the reply into typed results.
//!
//! ```text
//! dataset id ──► Profiler ──► Summary Pack
//!                                  │
//!                                  ▼
//!                        ┌──────────────────┐
//!                        │ Suggestion Agent │ ──► Model Client
//!                        └──────────────────┘
//!                                  │
//!                                  ▼
//!                        validated chart suggestions
//! ```

pub mod suggestions;

pub use suggestions::{SuggestionAgent, SuggestionError};
