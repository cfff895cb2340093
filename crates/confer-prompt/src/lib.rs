//! Prompt templating for Confer.
//!
//! Fills `{{ name }}` placeholders in prompt templates from the business
//! profile, and ships the built-in prompt cards the generator starts
//! chats from.

pub mod cards;
pub mod template;

pub use cards::{find_card, PromptCard, BUILTIN_CARDS};
pub use template::{interpolate, interpolate_with_query, USER_QUERY_KEY};
