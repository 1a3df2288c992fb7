//! Leaf matching primitives: literal, set, range, and any.
//!
//! These are total over every `at` in `[0, input.len()]` and never touch the
//! diagnostic log.

use crate::annotation::ParseResult;
use crate::rules::{Rule, RuleElem};

/// Input must begin with the literal element sequence at the offset.
pub(crate) fn match_literal<T: RuleElem>(
    rule: &Rule<T>,
    items: &[T],
    input: &[T],
    at: usize,
) -> ParseResult {
    if at > input.len() {
        return ParseResult::failure();
    }
    if input[at..].starts_with(items) {
        ParseResult::success(items.len(), rule.produce(at, items.len(), Vec::new()))
    } else {
        ParseResult::failure()
    }
}

/// Single-element membership test.
pub(crate) fn match_set<T: RuleElem>(
    rule: &Rule<T>,
    items: &[T],
    input: &[T],
    at: usize,
) -> ParseResult {
    if at < input.len() && items.contains(&input[at]) {
        ParseResult::success(1, rule.produce(at, 1, Vec::new()))
    } else {
        ParseResult::failure()
    }
}

/// Single element within inclusive `[min, max]` bounds.
pub(crate) fn match_range<T: RuleElem>(
    rule: &Rule<T>,
    min: &T,
    max: &T,
    input: &[T],
    at: usize,
) -> ParseResult {
    if at < input.len() && input[at] >= *min && input[at] <= *max {
        ParseResult::success(1, rule.produce(at, 1, Vec::new()))
    } else {
        ParseResult::failure()
    }
}

/// A fixed run of elements, any content.
pub(crate) fn match_any<T: RuleElem>(
    rule: &Rule<T>,
    count: usize,
    input: &[T],
    at: usize,
) -> ParseResult {
    if at + count <= input.len() {
        ParseResult::success(count, rule.produce(at, count, Vec::new()))
    } else {
        ParseResult::failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Range;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn literal_matches_prefix_only() {
        let rule = Rule::text("ab");
        let input = chars("abc");
        let hit = match_literal(&rule, &chars("ab"), &input, 0);
        assert!(hit.matched);
        assert_eq!(hit.length, 2);
        assert_eq!(hit.annotations[0].range, Range::new(0, 2));

        assert!(!match_literal(&rule, &chars("ab"), &input, 1).matched);
        assert!(!match_literal(&rule, &chars("ab"), &input, 3).matched);
    }

    #[test]
    fn literal_is_total_past_end() {
        let rule = Rule::text("x");
        // at == input.len() is legal and fails cleanly
        let result = match_literal(&rule, &chars("x"), &chars("y"), 1);
        assert!(!result.matched);
        assert_eq!(result.length, 0);
    }

    #[test]
    fn set_matches_single_member() {
        let rule = Rule::chars("+-");
        let input = chars("-a");
        assert!(match_set(&rule, &chars("+-"), &input, 0).matched);
        assert!(!match_set(&rule, &chars("+-"), &input, 1).matched);
        assert!(!match_set(&rule, &chars("+-"), &input, 2).matched);
    }

    #[test]
    fn range_is_inclusive() {
        let rule = Rule::range('a', 'z');
        assert!(match_range(&rule, &'a', &'z', &chars("a"), 0).matched);
        assert!(match_range(&rule, &'a', &'z', &chars("z"), 0).matched);
        assert!(!match_range(&rule, &'a', &'z', &chars("A"), 0).matched);
    }

    #[test]
    fn any_consumes_exactly_one() {
        let rule = Rule::<char>::any();
        let input = chars("q");
        let hit = match_any(&rule, 1, &input, 0);
        assert!(hit.matched);
        assert_eq!(hit.length, 1);
        assert!(!match_any(&rule, 1, &input, 1).matched);
    }
}
