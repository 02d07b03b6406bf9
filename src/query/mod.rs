//! Query understanding.
//!
//! Turns raw user input into a retrieval plan: intent detection
//! (identifier, pasted title, topic), concept extraction into core and
//! modifier groups, and per-tier boolean string construction.

mod builder;
mod concepts;
mod intent;

pub use builder::build_plan;
pub use concepts::{expand_variants, extract_concepts, ConceptGroups};
pub use intent::detect_intent;
