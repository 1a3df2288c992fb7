//! The rule graph: an owning registry of named rules.
//!
//! Rules live in an id-indexed arena; names map to ids. Composition rules
//! reference each other through `RuleRef` slots, so cyclic and self-recursive
//! grammars need no cyclic ownership. Forward references are written as
//! symbolic names and fixed up by [`RuleGraph::resolve`]; already-registered
//! rules can be patched in place with [`RuleGraph::replace`], which keeps the
//! original id so every resolved reference lands on the replacement.
//!
//! A graph is mutated while it is being built and must be treated as read-only
//! once parsing begins: parse calls take `&self` and can safely be repeated or
//! shared as long as no replacement happens concurrently.

use std::collections::HashMap;

use crate::annotation::{ParseResult, Range};
use crate::errors::{engine_error, ErrorKind, WeftError};
use crate::log::DiagnosticLog;
use crate::rules::{compose, evaluation, lookahead, primitives, report, skip};
use crate::rules::{Rule, RuleElem, RuleId, RuleKind, RuleRef};

/// Hard ceiling on match recursion, so a pathological grammar faults instead
/// of overflowing the stack. Each depth level costs several stack frames
/// (dispatch, family matcher, reference hop), so the ceiling must stay well
/// inside a default 2 MiB thread stack.
pub(crate) const MAX_MATCH_DEPTH: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct RuleGraph<T> {
    rules: Vec<Rule<T>>,
    names: HashMap<String, RuleId>,
    root: Option<RuleId>,
}

impl<T: RuleElem> RuleGraph<T> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            names: HashMap::new(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Registers a rule and all of its inline sub-rules, assigning the next
    /// sequential id. Fails on a duplicate top-level name.
    pub fn register(&mut self, rule: Rule<T>) -> Result<RuleId, WeftError> {
        if !rule.name.is_empty() && self.names.contains_key(&rule.name) {
            return Err(engine_error(
                ErrorKind::DuplicateRule {
                    name: rule.name.clone(),
                },
                Range::default(),
            ));
        }
        self.insert(rule)
    }

    /// Like [`register`](Self::register), but a rule whose name is already
    /// present is substituted by the registered instance instead of failing.
    /// This de-duplicates shared sub-rules when wiring compositions.
    pub fn find_or_register(&mut self, rule: Rule<T>) -> Result<RuleId, WeftError> {
        if !rule.name.is_empty() {
            if let Some(&id) = self.names.get(&rule.name) {
                return Ok(id);
            }
        }
        self.insert(rule)
    }

    fn insert(&mut self, mut rule: Rule<T>) -> Result<RuleId, WeftError> {
        self.hoist_sub_rules(&mut rule)?;
        let id = RuleId(self.rules.len());
        if rule.name.is_empty() {
            rule.name = format!("{}@{}", rule.kind.kind_name(), id.0);
        }
        if self.names.contains_key(&rule.name) {
            return Err(engine_error(
                ErrorKind::DuplicateRule { name: rule.name },
                Range::default(),
            ));
        }
        rule.id = Some(id);
        self.names.insert(rule.name.clone(), id);
        self.rules.push(rule);
        Ok(id)
    }

    /// Walks a rule's slots, registering inline sub-rules (re-using
    /// already-registered rules of the same name) and validating resolved ids.
    fn hoist_sub_rules(&mut self, rule: &mut Rule<T>) -> Result<(), WeftError> {
        for slot in rule.kind.refs_mut() {
            match slot {
                RuleRef::Inline(_) => {
                    let taken = std::mem::replace(slot, RuleRef::Id(RuleId::UNREGISTERED));
                    let inner = match taken {
                        RuleRef::Inline(boxed) => *boxed,
                        _ => unreachable!("slot was just matched as inline"),
                    };
                    let id = self.find_or_register(inner)?;
                    *slot = RuleRef::Id(id);
                }
                RuleRef::Id(id) => {
                    if id.0 >= self.rules.len() {
                        return Err(engine_error(
                            ErrorKind::InvalidRule {
                                message: format!("sub-rule id {} is not registered", id),
                            },
                            Range::default(),
                        ));
                    }
                }
                RuleRef::Name(_) => {}
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn find(&self, name: &str) -> Option<RuleId> {
        self.names.get(name).copied()
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule<T>> {
        self.rules.get(id.0)
    }

    pub fn get_mut(&mut self, id: RuleId) -> Option<&mut Rule<T>> {
        self.rules.get_mut(id.0)
    }

    /// Display name of a rule, `"#n"` when the id is unknown.
    pub fn name_of(&self, id: RuleId) -> String {
        self.get(id)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn precedence_of(&self, id: RuleId) -> i32 {
        self.get(id).map(|r| r.precedence).unwrap_or(0)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule<T>> {
        self.rules.iter()
    }

    // ------------------------------------------------------------------
    // Root
    // ------------------------------------------------------------------

    pub fn root(&self) -> Option<RuleId> {
        self.root
    }

    pub fn set_root(&mut self, name: &str) -> Result<(), WeftError> {
        let id = self.find(name).ok_or_else(|| {
            engine_error(
                ErrorKind::UnknownRule {
                    name: name.to_string(),
                },
                Range::default(),
            )
        })?;
        self.root = Some(id);
        Ok(())
    }

    pub fn set_root_id(&mut self, id: RuleId) {
        self.root = Some(id);
    }

    // ------------------------------------------------------------------
    // Replacement and resolution
    // ------------------------------------------------------------------

    /// Patches the rule registered under `name` in place, keeping its id.
    ///
    /// The name slot is re-pointed before the replacement's own sub-rules are
    /// hoisted, so a replacement that references `name` (directly
    /// self-recursive rules included) resolves onto its own new slot rather
    /// than the stale original. Because the id is stable, every reference
    /// already resolved elsewhere in the graph now reaches the replacement,
    /// and a root pointing at the original keeps working.
    pub fn replace(&mut self, name: &str, mut replacement: Rule<T>) -> Result<RuleId, WeftError> {
        let old_id = self.find(name).ok_or_else(|| {
            engine_error(
                ErrorKind::UnknownRule {
                    name: name.to_string(),
                },
                Range::default(),
            )
        })?;

        if replacement.name.is_empty() {
            replacement.name = name.to_string();
        }
        if replacement.name != name {
            if self.names.contains_key(&replacement.name) {
                return Err(engine_error(
                    ErrorKind::DuplicateRule {
                        name: replacement.name,
                    },
                    Range::default(),
                ));
            }
            self.names.remove(name);
        }
        self.names.insert(replacement.name.clone(), old_id);

        self.hoist_sub_rules(&mut replacement)?;
        replacement.id = Some(old_id);
        self.rules[old_id.0] = replacement;
        Ok(old_id)
    }

    /// Rewrites every symbolic `Name` slot to a resolved id. Call after all
    /// rules are registered; fails on the first dangling reference.
    pub fn resolve(&mut self) -> Result<(), WeftError> {
        let Self { rules, names, .. } = self;
        for rule in rules.iter_mut() {
            for slot in rule.kind.refs_mut() {
                if let RuleRef::Name(name) = slot {
                    match names.get(name.as_str()) {
                        Some(&id) => *slot = RuleRef::Id(id),
                        None => {
                            return Err(engine_error(
                                ErrorKind::UnresolvedReference { name: name.clone() },
                                Range::default(),
                            ))
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Every symbolic name that does not resolve, without failing. Used by the
    /// script compiler to report all problems at once and to detect token
    /// references.
    pub fn unresolved_names(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for rule in &self.rules {
            for slot in rule.kind.refs() {
                if let RuleRef::Name(name) = slot {
                    if !self.names.contains_key(name) && !missing.contains(name) {
                        missing.push(name.clone());
                    }
                }
            }
        }
        missing
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    /// Matches the root rule at `start`. The graph must not be mutated while
    /// parse calls are in flight.
    pub fn parse(
        &self,
        input: &[T],
        start: usize,
        log: &mut DiagnosticLog,
    ) -> Result<ParseResult, WeftError> {
        let root = self.root.ok_or_else(|| {
            engine_error(
                ErrorKind::InvalidRule {
                    message: "graph has no root rule".to_string(),
                },
                Range::default(),
            )
        })?;
        self.parse_rule(root, input, start, log)
    }

    /// Matches a specific registered rule at `start`.
    pub fn parse_rule(
        &self,
        id: RuleId,
        input: &[T],
        start: usize,
        log: &mut DiagnosticLog,
    ) -> Result<ParseResult, WeftError> {
        let rule = self.get(id).ok_or_else(|| {
            engine_error(
                ErrorKind::InvalidRule {
                    message: format!("rule id {} is not registered", id),
                },
                Range::default(),
            )
        })?;
        self.eval(rule, input, start, log, 0)
    }

    /// Matches a rule that is not registered in this graph. Its name
    /// references still resolve against this graph's registry.
    pub fn parse_with(
        &self,
        rule: &Rule<T>,
        input: &[T],
        start: usize,
        log: &mut DiagnosticLog,
    ) -> Result<ParseResult, WeftError> {
        self.eval(rule, input, start, log, 0)
    }

    pub(crate) fn eval(
        &self,
        rule: &Rule<T>,
        input: &[T],
        at: usize,
        log: &mut DiagnosticLog,
        depth: usize,
    ) -> Result<ParseResult, WeftError> {
        if depth > MAX_MATCH_DEPTH {
            return Err(engine_error(
                ErrorKind::RecursionLimit {
                    rule: rule.describe(),
                },
                Range::new(at, 0),
            ));
        }

        match &rule.kind {
            RuleKind::Literal(items) => Ok(primitives::match_literal(rule, items, input, at)),
            RuleKind::Set(items) => Ok(primitives::match_set(rule, items, input, at)),
            RuleKind::Range { min, max } => Ok(primitives::match_range(rule, min, max, input, at)),
            RuleKind::Any { count } => Ok(primitives::match_any(rule, *count, input, at)),
            RuleKind::Sequence(subs) => {
                compose::match_sequence(self, rule, subs, input, at, log, depth)
            }
            RuleKind::OneOf(options) => {
                compose::match_one_of(self, rule, options, input, at, log, depth)
            }
            RuleKind::Count { sub, min, max } => {
                compose::match_count(self, rule, sub, *min, *max, input, at, log, depth)
            }
            RuleKind::Not(sub) => lookahead::match_not(self, sub, input, at, log, depth),
            RuleKind::Condition(sub) => {
                lookahead::match_condition(self, sub, input, at, log, depth)
            }
            RuleKind::Reference(target) => {
                lookahead::match_reference(self, rule, target, input, at, log, depth)
            }
            RuleKind::Evaluation(candidates) => {
                evaluation::match_evaluation(self, rule, candidates, input, at, log, depth)
            }
            RuleKind::Skip { trigger, policy } => {
                skip::match_skip(self, rule, trigger, *policy, input, at, log, depth)
            }
            RuleKind::Report { severity, message } => {
                Ok(report::match_report(rule, *severity, message, at, log))
            }
            RuleKind::Fatal { message, guard } => {
                report::match_fatal(self, rule, message, guard.as_ref(), input, at, log, depth)
            }
        }
    }

    pub(crate) fn eval_ref(
        &self,
        slot: &RuleRef<T>,
        input: &[T],
        at: usize,
        log: &mut DiagnosticLog,
        depth: usize,
    ) -> Result<ParseResult, WeftError> {
        match slot {
            RuleRef::Inline(rule) => self.eval(rule, input, at, log, depth),
            RuleRef::Id(id) => {
                let rule = self.get(*id).ok_or_else(|| {
                    engine_error(
                        ErrorKind::InvalidRule {
                            message: format!("dangling sub-rule id {}", id),
                        },
                        Range::new(at, 0),
                    )
                })?;
                self.eval(rule, input, at, log, depth)
            }
            RuleRef::Name(name) => {
                let id = self.find(name).ok_or_else(|| {
                    engine_error(
                        ErrorKind::UnresolvedReference { name: name.clone() },
                        Range::new(at, 0),
                    )
                })?;
                let rule = self
                    .get(id)
                    .expect("name map entries always point at registered rules");
                self.eval(rule, input, at, log, depth)
            }
        }
    }
}
