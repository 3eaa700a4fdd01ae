//! Pairing of Phase-2 content items with Phase-1 outline modules
//!
//! Generation calls do not share identifiers, so content is matched back to
//! the outline by title. Strategies run tier by tier across the whole batch:
//! every module gets its chance at an exact match before any normalized
//! matching happens, so a looser tier never steals an item a stricter tier
//! would have paired. Each item is claimed at most once.

use crate::models::{ContentBatchItem, MatchTier};
use tracing::debug;

/// One title-matching rule, in the order rules are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Byte-for-byte title equality
    ExactTitle,
    /// Equality after lowercasing and collapsing whitespace
    NormalizedTitle,
    /// i-th module with i-th item; only when the batch counts agree
    Positional,
}

impl MatchStrategy {
    pub const ORDERED: [MatchStrategy; 3] = [
        MatchStrategy::ExactTitle,
        MatchStrategy::NormalizedTitle,
        MatchStrategy::Positional,
    ];

    pub fn tier(&self) -> MatchTier {
        match self {
            MatchStrategy::ExactTitle => MatchTier::Exact,
            MatchStrategy::NormalizedTitle => MatchTier::Normalized,
            MatchStrategy::Positional => MatchTier::Positional,
        }
    }
}

/// Audit record for one outline module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleResolution {
    /// Index into the batch's items
    pub item: Option<usize>,
    pub tier: Option<MatchTier>,
}

impl ModuleResolution {
    pub fn is_resolved(&self) -> bool {
        self.item.is_some()
    }
}

/// Lowercase, trim, and collapse internal whitespace runs
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve every outline title against the batch's items
///
/// Returns one resolution per title, in title order.
pub fn reconcile(titles: &[&str], items: &[ContentBatchItem]) -> Vec<ModuleResolution> {
    let mut resolutions = vec![ModuleResolution { item: None, tier: None }; titles.len()];
    let mut claimed = vec![false; items.len()];

    for strategy in MatchStrategy::ORDERED {
        if strategy == MatchStrategy::Positional && items.len() != titles.len() {
            debug!(
                modules = titles.len(),
                items = items.len(),
                "Skipping positional pairing: batch counts differ"
            );
            continue;
        }

        for (index, title) in titles.iter().enumerate() {
            if resolutions[index].is_resolved() {
                continue;
            }

            let found = match strategy {
                MatchStrategy::ExactTitle => items.iter().enumerate().position(|(i, item)| {
                    !claimed[i] && item.module_title.as_deref() == Some(*title)
                }),
                MatchStrategy::NormalizedTitle => {
                    let wanted = normalize_title(title);
                    items.iter().enumerate().position(|(i, item)| {
                        !claimed[i]
                            && item
                                .module_title
                                .as_deref()
                                .is_some_and(|t| normalize_title(t) == wanted)
                    })
                }
                MatchStrategy::Positional => (!claimed[index]).then_some(index),
            };

            if let Some(item) = found {
                claimed[item] = true;
                resolutions[index] = ModuleResolution {
                    item: Some(item),
                    tier: Some(strategy.tier()),
                };
            }
        }
    }

    resolutions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentSection;

    fn item(title: Option<&str>) -> ContentBatchItem {
        ContentBatchItem {
            module_title: title.map(str::to_string),
            sections: vec![ContentSection::text("body")],
        }
    }

    fn tiers(resolutions: &[ModuleResolution]) -> Vec<Option<MatchTier>> {
        resolutions.iter().map(|r| r.tier).collect()
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Intro   to\tReact "), "intro to react");
    }

    #[test]
    fn test_case_permuted_titles_resolve_by_normalized_tier() {
        let titles = ["Intro to A", "A Hooks", "A State", "A Routing", "A Testing"];
        let items: Vec<_> = titles
            .iter()
            .rev()
            .map(|t| item(Some(format!(" {} ", t.to_lowercase()).as_str())))
            .collect();

        let resolutions = reconcile(&titles, &items);
        assert!(resolutions.iter().all(|r| r.tier == Some(MatchTier::Normalized)));
        // Reversed order: module 0 pairs with the last item
        assert_eq!(resolutions[0].item, Some(4));
    }

    #[test]
    fn test_unrelated_titles_with_equal_count_pair_positionally() {
        let titles = ["One", "Two", "Three"];
        let items = vec![item(Some("x")), item(None), item(Some("z"))];

        let resolutions = reconcile(&titles, &items);
        assert_eq!(tiers(&resolutions), vec![Some(MatchTier::Positional); 3]);
        assert_eq!(resolutions[1].item, Some(1));
    }

    #[test]
    fn test_zero_items_leave_everything_unresolved() {
        let resolutions = reconcile(&["A", "B"], &[]);
        assert!(resolutions.iter().all(|r| !r.is_resolved() && r.tier.is_none()));
    }

    #[test]
    fn test_count_mismatch_disables_positional() {
        let titles = ["Alpha", "Beta", "Gamma"];
        let items = vec![item(Some("alpha")), item(Some("unrelated"))];

        let resolutions = reconcile(&titles, &items);
        assert_eq!(
            tiers(&resolutions),
            vec![Some(MatchTier::Normalized), None, None]
        );
    }

    #[test]
    fn test_exact_tier_wins_before_normalized_steals() {
        // Module 0 would normalized-match item 1, which module 1 matches exactly
        let titles = ["setup", "Setup"];
        let items = vec![item(Some("Other")), item(Some("Setup")), item(Some("SETUP"))];

        let resolutions = reconcile(&titles, &items);
        assert_eq!(resolutions[1], ModuleResolution { item: Some(1), tier: Some(MatchTier::Exact) });
        assert_eq!(resolutions[0], ModuleResolution { item: Some(2), tier: Some(MatchTier::Normalized) });
    }

    #[test]
    fn test_items_claimed_once() {
        let titles = ["Same", "Same"];
        let items = vec![item(Some("Same"))];

        let resolutions = reconcile(&titles, &items);
        assert_eq!(resolutions[0].item, Some(0));
        assert!(!resolutions[1].is_resolved());
    }

    #[test]
    fn test_positional_skips_claimed_slots() {
        let titles = ["A", "B"];
        // Item 0 is claimed by module 1 via exact match; module 0's slot is taken
        let items = vec![item(Some("B")), item(Some("zzz"))];

        let resolutions = reconcile(&titles, &items);
        assert_eq!(resolutions[1], ModuleResolution { item: Some(0), tier: Some(MatchTier::Exact) });
        assert!(!resolutions[0].is_resolved());
    }
}
