// Rule graph invariants: registration, lookup, resolution, replacement.

use weft::annotation::Range;
use weft::errors::ErrorKind;
use weft::graph::RuleGraph;
use weft::log::DiagnosticLog;
use weft::rules::{OutputPolicy, Rule};

fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}

#[test]
fn register_assigns_sequential_ids_and_rejects_duplicates() {
    let mut g: RuleGraph<char> = RuleGraph::new();
    let a = g.register(Rule::text("a").named("alpha")).unwrap();
    let b = g.register(Rule::text("b").named("beta")).unwrap();
    assert!(a < b);
    assert_eq!(g.find("alpha"), Some(a));
    assert_eq!(g.find("missing"), None);

    let err = g.register(Rule::text("x").named("alpha")).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateRule { .. }));
}

#[test]
fn find_or_register_reuses_existing_names() {
    let mut g: RuleGraph<char> = RuleGraph::new();
    let first = g.register(Rule::text("a").named("alpha")).unwrap();
    let again = g.find_or_register(Rule::text("zzz").named("alpha")).unwrap();
    assert_eq!(first, again);
    assert_eq!(g.len(), 1);
}

#[test]
fn registering_a_composition_hoists_inline_sub_rules() {
    let mut g: RuleGraph<char> = RuleGraph::new();
    let seq = g
        .register(
            Rule::sequence(vec![Rule::text("a").into(), Rule::text("b").into()]).named("pair"),
        )
        .unwrap();
    // two sub-rules plus the composition itself
    assert_eq!(g.len(), 3);
    assert_eq!(g.find("pair"), Some(seq));
}

#[test]
fn resolve_fails_on_dangling_names() {
    let mut g: RuleGraph<char> = RuleGraph::new();
    g.register(Rule::sequence(vec!["ghost".into()]).named("haunted"))
        .unwrap();
    assert_eq!(g.unresolved_names(), vec!["ghost".to_string()]);

    let err = g.resolve().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnresolvedReference { name } if name == "ghost"));
}

#[test]
fn forward_references_resolve_after_all_registrations() {
    let mut g: RuleGraph<char> = RuleGraph::new();
    g.register(Rule::sequence(vec!["later".into()]).named("early"))
        .unwrap();
    g.register(Rule::text("ok").named("later")).unwrap();
    g.resolve().unwrap();
    g.set_root("early").unwrap();

    let mut log = DiagnosticLog::new();
    let result = g.parse(&chars("ok"), 0, &mut log).unwrap();
    assert!(result.matched);
    assert_eq!(result.length, 2);
}

#[test]
fn replace_preserves_self_cycles() {
    // list matches one or more 'x' through direct self-recursion
    let mut g: RuleGraph<char> = RuleGraph::new();
    let original = g
        .register(
            Rule::sequence(vec![
                Rule::text("x").into(),
                Rule::optional(Rule::reference("list")).into(),
            ])
            .named("list")
            .with_policy(OutputPolicy::Emit),
        )
        .unwrap();
    g.resolve().unwrap();
    g.set_root("list").unwrap();

    let mut log = DiagnosticLog::new();
    let before = g.parse(&chars("xxx"), 0, &mut log).unwrap();
    assert!(before.matched);
    assert_eq!(before.length, 3);

    // the replacement references its own name, just like the original
    let replaced = g
        .replace(
            "list",
            Rule::sequence(vec![
                Rule::text("y").into(),
                Rule::optional(Rule::reference("list")).into(),
            ])
            .with_policy(OutputPolicy::Emit),
        )
        .unwrap();
    assert_eq!(replaced, original);
    assert_eq!(g.find("list"), Some(original));
    g.resolve().unwrap();

    // the self-reference lands on the replacement, not the stale rule
    let after = g.parse(&chars("yyy"), 0, &mut log).unwrap();
    assert!(after.matched);
    assert_eq!(after.length, 3);
    assert!(!g.parse(&chars("xxx"), 0, &mut log).unwrap().matched);

    // the root id was stable through the replacement
    assert_eq!(g.root(), Some(original));
}

#[test]
fn replace_rejects_unknown_and_colliding_names() {
    let mut g: RuleGraph<char> = RuleGraph::new();
    g.register(Rule::text("a").named("alpha")).unwrap();
    g.register(Rule::text("b").named("beta")).unwrap();

    let missing = g.replace("ghost", Rule::text("x")).unwrap_err();
    assert!(matches!(missing.kind, ErrorKind::UnknownRule { .. }));

    let collision = g
        .replace("alpha", Rule::text("x").named("beta"))
        .unwrap_err();
    assert!(matches!(collision.kind, ErrorKind::DuplicateRule { .. }));
}

#[test]
fn match_length_never_exceeds_remaining_input() {
    let mut g: RuleGraph<char> = RuleGraph::new();
    g.register(Rule::zero_or_more(Rule::range('a', 'z')).named("letters"))
        .unwrap();
    g.set_root("letters").unwrap();

    let input = chars("abc");
    let mut log = DiagnosticLog::new();
    for start in 0..=input.len() {
        let result = g.parse(&input, start, &mut log).unwrap();
        assert!(result.length <= input.len() - start);
    }
}

#[test]
fn recursion_limit_faults_instead_of_overflowing() {
    // infinite left recursion: loop = loop
    let mut g: RuleGraph<char> = RuleGraph::new();
    g.register(Rule::sequence(vec!["loop".into()]).named("loop"))
        .unwrap();
    g.resolve().unwrap();
    g.set_root("loop").unwrap();

    let mut log = DiagnosticLog::new();
    let err = g.parse(&chars("a"), 0, &mut log).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RecursionLimit { .. }));
}

#[test]
fn failed_parses_produce_no_annotations() {
    let mut g: RuleGraph<char> = RuleGraph::new();
    g.register(
        Rule::sequence(vec![Rule::text("ab").into(), Rule::text("cd").into()]).named("pair"),
    )
    .unwrap();
    g.set_root("pair").unwrap();

    let mut log = DiagnosticLog::new();
    let result = g.parse(&chars("abXX"), 0, &mut log).unwrap();
    assert!(!result.matched);
    assert_eq!(result.length, 0);
    assert!(result.annotations.is_empty());
}

#[test]
fn annotations_nest_within_parent_ranges() {
    let mut g: RuleGraph<char> = RuleGraph::new();
    g.register(Rule::one_or_more(Rule::range('0', '9')).named("digits"))
        .unwrap();
    g.register(
        Rule::sequence(vec!["digits".into(), Rule::text(".").into(), "digits".into()])
            .named("decimal")
            .with_policy(OutputPolicy::Emit),
    )
    .unwrap();
    g.resolve().unwrap();
    g.set_root("decimal").unwrap();

    let mut log = DiagnosticLog::new();
    let result = g.parse(&chars("31.42"), 0, &mut log).unwrap();
    assert!(result.matched);

    let root = &result.annotations[0];
    assert_eq!(root.range, Range::new(0, 5));
    for child in &root.children {
        assert!(root.range.contains(&child.range));
    }
}
