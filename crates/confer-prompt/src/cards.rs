//! Built-in prompt cards for the business-plan generator.
//!
//! A card couples the labels a chat surface shows with the template behind
//! it. Starting a chat from a card records the card's labels as session
//! metadata; the template is re-resolved from `theme_id` on every send.

use confer_core::types::SessionMeta;

/// A preset prompt: display labels plus the template they stand for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromptCard {
    pub card_title: &'static str,
    pub theme: &'static str,
    pub theme_id: &'static str,
    pub template: &'static str,
}

impl PromptCard {
    /// Session metadata recorded when a chat starts from this card.
    pub fn meta(&self) -> SessionMeta {
        SessionMeta::new(
            Some(self.theme.to_string()),
            Some(self.card_title.to_string()),
            Some(self.theme_id.to_string()),
        )
    }
}

/// Cards shipped with the generator, in display order.
pub const BUILTIN_CARDS: &[PromptCard] = &[
    PromptCard {
        card_title: "Business plan",
        theme: "planning",
        theme_id: "business-plan",
        template: "You are a business planning assistant for {{company_name}}, \
a company in the {{industry}} industry, active for {{years_active}} years \
with a focus on {{focus}}.\n\nDraft a concise, practical business plan that \
answers the request below. Ground every section in the profile above.\n\n\
{{user_query}}",
    },
    PromptCard {
        card_title: "Marketing push",
        theme: "marketing",
        theme_id: "marketing-push",
        template: "You advise {{company_name}} on marketing in the \
{{industry}} industry.\n\nPropose a focused campaign for the request below: \
audience, channels, message, and a two-week rollout.\n\n{{user_query}}",
    },
    PromptCard {
        card_title: "Growth review",
        theme: "growth",
        theme_id: "growth-review",
        template: "You are reviewing growth options for {{company_name}}, \
whose current focus is {{focus}}.\n\nFor the request below, weigh keeping \
the current focus against the alternative it implies, and recommend one.\n\n\
{{user_query}}",
    },
    PromptCard {
        card_title: "Finance check",
        theme: "finance",
        theme_id: "finance-check",
        template: "You are a financial sparring partner for {{company_name}}, \
trading for {{years_active}} years.\n\nAnswer the request below with rough \
numbers and the assumptions behind them.\n\n{{user_query}}",
    },
];

/// Looks up a built-in card by its theme id.
pub fn find_card(theme_id: &str) -> Option<&'static PromptCard> {
    BUILTIN_CARDS.iter().find(|card| card.theme_id == theme_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::interpolate_with_query;
    use confer_core::types::BusinessProfile;

    fn full_profile() -> BusinessProfile {
        [
            ("company_name", "Acme Logistics"),
            ("industry", "freight"),
            ("years_active", "12"),
            ("focus", "regional delivery"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_builtin_cards_present() {
        assert!(!BUILTIN_CARDS.is_empty());
    }

    #[test]
    fn test_theme_ids_are_unique() {
        for (i, card) in BUILTIN_CARDS.iter().enumerate() {
            for other in &BUILTIN_CARDS[i + 1..] {
                assert_ne!(card.theme_id, other.theme_id);
            }
        }
    }

    #[test]
    fn test_find_card_known_and_unknown() {
        let card = find_card("business-plan").unwrap();
        assert_eq!(card.card_title, "Business plan");
        assert!(find_card("no-such-theme").is_none());
    }

    #[test]
    fn test_every_template_takes_the_user_query() {
        for card in BUILTIN_CARDS {
            assert!(
                card.template.contains("{{user_query}}"),
                "card {} drops the user query",
                card.theme_id
            );
        }
    }

    #[test]
    fn test_meta_carries_all_labels() {
        let card = find_card("marketing-push").unwrap();
        let meta = card.meta();
        assert_eq!(meta.card_theme.as_deref(), Some("marketing"));
        assert_eq!(meta.card_title.as_deref(), Some("Marketing push"));
        assert_eq!(meta.theme_id.as_deref(), Some("marketing-push"));
    }

    #[test]
    fn test_full_profile_fills_every_placeholder() {
        let profile = full_profile();
        for card in BUILTIN_CARDS {
            let out = interpolate_with_query(card.template, &profile, "the request");
            assert!(
                !out.contains("{{"),
                "card {} left a placeholder: {}",
                card.theme_id,
                out
            );
            assert!(out.contains("the request"));
        }
    }
}
