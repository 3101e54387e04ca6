//! The rule-versus-deal predicate.
//!
//! Pure and total. Every clause either passes or vetoes; unset criteria
//! never veto, so a rule with no criteria matches every deal. Clause
//! order matters only for exclusions, which veto before anything else
//! gets a say.

use crate::deal::Deal;
use crate::rule::AlertRule;

/// Evaluate one rule against one deal.
///
/// Keyword clauses are case-insensitive substring matches over the deal's
/// title and description, with keyword whitespace trimmed. Price bounds,
/// condition minimum, score minimum, and radius are all inclusive.
pub fn rule_matches(rule: &AlertRule, deal: &Deal) -> bool {
    let haystack = format!("{} {}", deal.title, deal.description).to_lowercase();

    // Exclusions dominate: any hit rejects no matter what else matches.
    if keyword_hit(&rule.exclude_keywords, &haystack) {
        return false;
    }

    // Keywords OR together; at least one must hit when any are usable.
    let keywords = usable_keywords(&rule.keywords);
    if !keywords.is_empty() && !keywords.iter().any(|k| haystack.contains(k.as_str())) {
        return false;
    }

    if !rule.categories.is_empty() {
        let category = deal.category.trim();
        let hit = rule
            .categories
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case(category));
        if !hit {
            return false;
        }
    }

    if let Some(min) = rule.min_condition {
        if deal.condition < min {
            return false;
        }
    }

    if let Some(min) = rule.min_price {
        if deal.price < min {
            return false;
        }
    }
    if let Some(max) = rule.max_price {
        if deal.price > max {
            return false;
        }
    }

    if let Some(min) = rule.min_deal_score {
        if deal.deal_score < min {
            return false;
        }
    }

    // Radius only applies when the scan computed a distance for this deal;
    // without one the clause is advisory and skipped.
    if let (Some(radius), Some(distance)) = (rule.radius_km, deal.distance_km) {
        if distance > radius {
            return false;
        }
    }

    true
}

/// True when any usable keyword in `keywords` occurs in `haystack`
/// (which the caller has already lowercased).
fn keyword_hit(keywords: &[String], haystack: &str) -> bool {
    usable_keywords(keywords)
        .iter()
        .any(|k| haystack.contains(k.as_str()))
}

/// Trim and lowercase keywords, dropping entries that end up blank. A list
/// of only-blank entries therefore behaves like no keyword criterion at all.
fn usable_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelKind;
    use crate::deal::Condition;
    use chrono::Utc;

    fn deal() -> Deal {
        Deal {
            id: "fb-1".into(),
            title: "Gaming laptop deal".into(),
            description: "RTX 3060, barely used".into(),
            price: 750.0,
            condition: Condition::Good,
            category: "electronics".into(),
            deal_score: 0.8,
            latitude: None,
            longitude: None,
            distance_km: None,
            listed_at: Utc::now(),
        }
    }

    fn rule() -> AlertRule {
        AlertRule {
            id: 1,
            user_id: 1,
            name: "test".into(),
            keywords: vec![],
            exclude_keywords: vec![],
            categories: vec![],
            min_condition: None,
            min_price: None,
            max_price: None,
            min_deal_score: None,
            location: None,
            radius_km: None,
            channels: vec![ChannelKind::Email],
            enabled: true,
            last_triggered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    // -- catch-all ------------------------------------------------------------

    #[test]
    fn catch_all_matches_any_deal() {
        assert!(rule_matches(&rule(), &deal()));
    }

    #[test]
    fn blank_keyword_entries_behave_like_catch_all() {
        let mut r = rule();
        r.keywords = vec!["   ".into(), "".into()];
        assert!(rule_matches(&r, &deal()));
    }

    // -- exclusions -----------------------------------------------------------

    #[test]
    fn exclude_keyword_vetoes() {
        let mut r = rule();
        r.exclude_keywords = vec!["broken".into()];
        let mut d = deal();
        d.description = "screen broken, for parts".into();
        assert!(!rule_matches(&r, &d));
    }

    #[test]
    fn exclusion_dominates_matching_keyword() {
        let mut r = rule();
        r.keywords = vec!["laptop".into()];
        r.exclude_keywords = vec!["gaming".into()];
        // Title contains both the wanted and the excluded keyword.
        assert!(!rule_matches(&r, &deal()));
    }

    #[test]
    fn exclusion_is_case_insensitive() {
        let mut r = rule();
        r.exclude_keywords = vec!["GAMING".into()];
        assert!(!rule_matches(&r, &deal()));
    }

    // -- keywords -------------------------------------------------------------

    #[test]
    fn keywords_or_together() {
        let mut r = rule();
        r.keywords = vec!["desktop".into(), "laptop".into()];
        assert!(rule_matches(&r, &deal()));
    }

    #[test]
    fn no_keyword_hit_rejects() {
        let mut r = rule();
        r.keywords = vec!["bicycle".into(), "kayak".into()];
        assert!(!rule_matches(&r, &deal()));
    }

    #[test]
    fn keyword_matches_case_insensitively() {
        let mut r = rule();
        r.keywords = vec!["LAPTOP".into()];
        assert!(rule_matches(&r, &deal()));
    }

    #[test]
    fn keyword_whitespace_trimmed() {
        let mut r = rule();
        r.keywords = vec!["  laptop  ".into()];
        assert!(rule_matches(&r, &deal()));
    }

    #[test]
    fn keyword_found_in_description() {
        let mut r = rule();
        r.keywords = vec!["rtx".into()];
        assert!(rule_matches(&r, &deal()));
    }

    // -- categories -----------------------------------------------------------

    #[test]
    fn category_membership_required_when_set() {
        let mut r = rule();
        r.categories = vec!["furniture".into()];
        assert!(!rule_matches(&r, &deal()));
        r.categories = vec!["furniture".into(), "electronics".into()];
        assert!(rule_matches(&r, &deal()));
    }

    #[test]
    fn category_compare_is_case_insensitive() {
        let mut r = rule();
        r.categories = vec!["Electronics".into()];
        assert!(rule_matches(&r, &deal()));
    }

    // -- condition ------------------------------------------------------------

    #[test]
    fn condition_minimum_is_inclusive() {
        let mut r = rule();
        r.min_condition = Some(Condition::Good);
        assert!(rule_matches(&r, &deal()));
    }

    #[test]
    fn condition_below_minimum_rejects() {
        let mut r = rule();
        r.min_condition = Some(Condition::Great);
        assert!(!rule_matches(&r, &deal()));
    }

    // -- price ----------------------------------------------------------------

    #[test]
    fn price_bounds_are_inclusive() {
        let mut r = rule();
        r.min_price = Some(750.0);
        r.max_price = Some(750.0);
        assert!(rule_matches(&r, &deal()));
    }

    #[test]
    fn price_above_max_rejects() {
        let mut r = rule();
        r.max_price = Some(700.0);
        assert!(!rule_matches(&r, &deal()));
    }

    #[test]
    fn price_below_min_rejects() {
        let mut r = rule();
        r.min_price = Some(800.0);
        assert!(!rule_matches(&r, &deal()));
    }

    #[test]
    fn single_sided_price_bound() {
        let mut r = rule();
        r.max_price = Some(800.0);
        assert!(rule_matches(&r, &deal()));
    }

    // -- deal score -----------------------------------------------------------

    #[test]
    fn score_minimum_is_inclusive() {
        let mut r = rule();
        r.min_deal_score = Some(0.8);
        assert!(rule_matches(&r, &deal()));
    }

    #[test]
    fn score_below_minimum_rejects() {
        let mut r = rule();
        r.min_deal_score = Some(0.9);
        assert!(!rule_matches(&r, &deal()));
    }

    // -- radius ---------------------------------------------------------------

    #[test]
    fn radius_skipped_without_distance() {
        let mut r = rule();
        r.radius_km = Some(10.0);
        // Deal has no computed distance, so the clause cannot veto.
        assert!(rule_matches(&r, &deal()));
    }

    #[test]
    fn radius_enforced_when_distance_present() {
        let mut r = rule();
        r.radius_km = Some(10.0);
        let mut d = deal();
        d.distance_km = Some(25.0);
        assert!(!rule_matches(&r, &d));
        d.distance_km = Some(10.0);
        assert!(rule_matches(&r, &d));
    }

    // -- combined -------------------------------------------------------------

    #[test]
    fn laptop_rule_scenario() {
        let mut r = rule();
        r.keywords = vec!["laptop".into()];
        r.max_price = Some(800.0);
        r.min_deal_score = Some(0.7);
        assert!(rule_matches(&r, &deal()));

        let mut expensive = deal();
        expensive.price = 900.0;
        assert!(!rule_matches(&r, &expensive));
    }
}
