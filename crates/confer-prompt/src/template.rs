//! Prompt template interpolation.
//!
//! Templates carry `{{ name }}` placeholders that are filled from the
//! business profile right before a prompt goes to the assistant. The
//! reserved name `user_query` is filled with the literal user input
//! instead of a profile lookup.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use confer_core::types::BusinessProfile;

/// Placeholder name reserved for the literal user input.
pub const USER_QUERY_KEY: &str = "user_query";

// Matches `{{ name }}`; whitespace around the name is insignificant.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("Invalid placeholder regex")
});

/// Replaces every occurrence of every known placeholder with its profile
/// value.
///
/// Placeholders whose name is not a profile key stay byte-for-byte
/// unchanged, as does the reserved `user_query`, which only
/// [`interpolate_with_query`] fills. Never fails; an empty template is a
/// no-op.
pub fn interpolate(template: &str, profile: &BusinessProfile) -> String {
    replace_placeholders(template, profile, None)
}

/// Like [`interpolate`], additionally replacing `user_query` with the
/// literal user input.
///
/// `user_query` is reserved: it never comes from a profile lookup, even
/// when the profile carries a key of that name.
pub fn interpolate_with_query(
    template: &str,
    profile: &BusinessProfile,
    user_query: &str,
) -> String {
    replace_placeholders(template, profile, Some(user_query))
}

fn replace_placeholders(
    template: &str,
    profile: &BusinessProfile,
    user_query: Option<&str>,
) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            if name == USER_QUERY_KEY {
                return match user_query {
                    Some(query) => query.to_string(),
                    None => caps[0].to_string(),
                };
            }
            match profile.get(name) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
