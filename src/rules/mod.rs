//! Rule types: the composable matching primitives of the engine.
//!
//! A `Rule` is a node that attempts to match a prefix of an input array at an
//! offset and returns a `ParseResult`. Polymorphism is a closed sum type
//! (`RuleKind`) dispatched by pattern matching, not a trait hierarchy.
//! Composition rules hold `RuleRef` slots instead of owning pointers across
//! the graph: an inline boxed rule before registration, a symbolic name for
//! forward references, or a resolved `RuleId` into the graph's arena.
//!
//! The matching engine itself lives in the per-family submodules and is
//! driven from [`RuleGraph::eval`](crate::graph::RuleGraph).

pub mod compose;
pub mod evaluation;
pub mod lookahead;
pub mod primitives;
pub mod report;
pub mod skip;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::annotation::{Annotation, Range};
use crate::log::Severity;

/// Stable integer identity of a registered rule within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub usize);

impl RuleId {
    /// Sentinel for rules that have not been registered in a graph yet.
    pub const UNREGISTERED: RuleId = RuleId(usize::MAX);
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::UNREGISTERED {
            write!(f, "#?")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Element types a rule graph can match over. Tokenizers use `char`, grammar
/// parsers use `usize` token ids.
pub trait RuleElem: Clone + PartialEq + PartialOrd + fmt::Debug {}

impl<T: Clone + PartialEq + PartialOrd + fmt::Debug> RuleElem for T {}

/// Governs what a successful match emits.
///
/// The four values mirror the script prefixes: no prefix, `-r`, `-c`, `-a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputPolicy {
    /// Emit an annotation for this rule, with sub-match annotations as children.
    Emit,
    /// Emit an annotation for this rule only; children are pruned.
    Root,
    /// Transparent: surface the sub-match annotations directly to the parent.
    Children,
    /// Emit nothing (whitespace, separators).
    Void,
}

/// How a skip rule treats the trigger and end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipPolicy {
    /// Fail if the trigger is never found; consumed length excludes the trigger.
    Find,
    /// Stop in front of the trigger; end of input is an ordinary stop.
    StopAt,
    /// Consume through the trigger; end of input is an ordinary stop.
    StopAfter,
}

/// A slot pointing at another rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleRef<T> {
    /// An owned sub-rule not yet hoisted into a graph.
    Inline(Box<Rule<T>>),
    /// A symbolic reference, resolved once the graph is fully built.
    Name(String),
    /// A resolved reference into the graph's arena.
    Id(RuleId),
}

impl<T> From<Rule<T>> for RuleRef<T> {
    fn from(rule: Rule<T>) -> Self {
        RuleRef::Inline(Box::new(rule))
    }
}

impl<T> From<&str> for RuleRef<T> {
    fn from(name: &str) -> Self {
        RuleRef::Name(name.to_string())
    }
}

impl<T> From<String> for RuleRef<T> {
    fn from(name: String) -> Self {
        RuleRef::Name(name)
    }
}

impl<T> From<RuleId> for RuleRef<T> {
    fn from(id: RuleId) -> Self {
        RuleRef::Id(id)
    }
}

/// The closed set of rule variants.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind<T> {
    /// Input must begin with this exact element sequence at the offset.
    Literal(Vec<T>),
    /// The current element must be a member of the set.
    Set(Vec<T>),
    /// The current element must lie within the inclusive bounds.
    Range { min: T, max: T },
    /// Consume a fixed run of elements, any content.
    Any { count: usize },
    /// Every sub-rule must match contiguously, in order.
    Sequence(Vec<RuleRef<T>>),
    /// First matching option wins; order is the ambiguity resolution.
    OneOf(Vec<RuleRef<T>>),
    /// Greedy repetition of one sub-rule. `max == 0` means unbounded.
    Count {
        sub: RuleRef<T>,
        min: usize,
        max: usize,
    },
    /// Look-ahead: succeeds when the sub-rule fails. Never consumes.
    Not(RuleRef<T>),
    /// Look-ahead: succeeds when the sub-rule succeeds. Never consumes.
    Condition(RuleRef<T>),
    /// Delegates to another rule; output policy decides whether the result is
    /// wrapped (standalone named reference) or passed through (inlined).
    Reference(RuleRef<T>),
    /// Precedence climbing over competing binary-operation rules.
    Evaluation(Vec<RuleRef<T>>),
    /// Scan forward one element at a time until the trigger matches.
    Skip {
        trigger: RuleRef<T>,
        policy: SkipPolicy,
    },
    /// Always matches with zero length and records a diagnostic; used as a
    /// recoverable-error marker branch inside grammars.
    Report {
        severity: Severity,
        message: String,
    },
    /// Grammar-authored abort. With a guard, only fires when the guard
    /// matches; otherwise it is an ordinary match failure.
    Fatal {
        message: String,
        guard: Option<RuleRef<T>>,
    },
}

impl<T> RuleKind<T> {
    /// Immutable views of every sub-rule slot this kind owns.
    pub fn refs(&self) -> Vec<&RuleRef<T>> {
        match self {
            RuleKind::Sequence(subs) | RuleKind::OneOf(subs) | RuleKind::Evaluation(subs) => {
                subs.iter().collect()
            }
            RuleKind::Count { sub, .. } => vec![sub],
            RuleKind::Not(sub) | RuleKind::Condition(sub) | RuleKind::Reference(sub) => vec![sub],
            RuleKind::Skip { trigger, .. } => vec![trigger],
            RuleKind::Fatal {
                guard: Some(guard), ..
            } => vec![guard],
            _ => Vec::new(),
        }
    }

    /// Mutable views of every sub-rule slot, for registration and resolution.
    pub fn refs_mut(&mut self) -> Vec<&mut RuleRef<T>> {
        match self {
            RuleKind::Sequence(subs) | RuleKind::OneOf(subs) | RuleKind::Evaluation(subs) => {
                subs.iter_mut().collect()
            }
            RuleKind::Count { sub, .. } => vec![sub],
            RuleKind::Not(sub) | RuleKind::Condition(sub) | RuleKind::Reference(sub) => vec![sub],
            RuleKind::Skip { trigger, .. } => vec![trigger],
            RuleKind::Fatal {
                guard: Some(guard), ..
            } => vec![guard],
            _ => Vec::new(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RuleKind::Literal(_) => "literal",
            RuleKind::Set(_) => "set",
            RuleKind::Range { .. } => "range",
            RuleKind::Any { .. } => "any",
            RuleKind::Sequence(_) => "sequence",
            RuleKind::OneOf(_) => "one_of",
            RuleKind::Count { .. } => "count",
            RuleKind::Not(_) => "not",
            RuleKind::Condition(_) => "condition",
            RuleKind::Reference(_) => "reference",
            RuleKind::Evaluation(_) => "evaluation",
            RuleKind::Skip { .. } => "skip",
            RuleKind::Report { .. } => "report",
            RuleKind::Fatal { .. } => "fatal",
        }
    }
}

/// A matching rule: identity, output policy, precedence, and variant data.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule<T> {
    /// Assigned at registration; `None` until then.
    pub id: Option<RuleId>,
    /// Unique within a graph. Empty for anonymous rules until registration
    /// generates one.
    pub name: String,
    /// Used only when the rule competes inside an evaluation.
    pub precedence: i32,
    pub policy: OutputPolicy,
    pub kind: RuleKind<T>,
}

impl<T> Rule<T> {
    fn with_kind(kind: RuleKind<T>, policy: OutputPolicy) -> Self {
        Self {
            id: None,
            name: String::new(),
            precedence: 0,
            policy,
            kind,
        }
    }

    // ------------------------------------------------------------------
    // Constructors, one per variant
    // ------------------------------------------------------------------

    pub fn literal(items: Vec<T>) -> Self {
        Self::with_kind(RuleKind::Literal(items), OutputPolicy::Emit)
    }

    pub fn set(items: Vec<T>) -> Self {
        Self::with_kind(RuleKind::Set(items), OutputPolicy::Emit)
    }

    pub fn range(min: T, max: T) -> Self {
        Self::with_kind(RuleKind::Range { min, max }, OutputPolicy::Emit)
    }

    pub fn any() -> Self {
        Self::with_kind(RuleKind::Any { count: 1 }, OutputPolicy::Emit)
    }

    /// Data-level variant of `any`: a fixed run of elements.
    pub fn any_run(count: usize) -> Self {
        Self::with_kind(RuleKind::Any { count }, OutputPolicy::Emit)
    }

    pub fn sequence(subs: Vec<RuleRef<T>>) -> Self {
        Self::with_kind(RuleKind::Sequence(subs), OutputPolicy::Children)
    }

    pub fn one_of(options: Vec<RuleRef<T>>) -> Self {
        Self::with_kind(RuleKind::OneOf(options), OutputPolicy::Children)
    }

    pub fn repeat(sub: impl Into<RuleRef<T>>, min: usize, max: usize) -> Self {
        Self::with_kind(
            RuleKind::Count {
                sub: sub.into(),
                min,
                max,
            },
            OutputPolicy::Children,
        )
    }

    pub fn optional(sub: impl Into<RuleRef<T>>) -> Self {
        Self::repeat(sub, 0, 1)
    }

    pub fn zero_or_more(sub: impl Into<RuleRef<T>>) -> Self {
        Self::repeat(sub, 0, 0)
    }

    pub fn one_or_more(sub: impl Into<RuleRef<T>>) -> Self {
        Self::repeat(sub, 1, 0)
    }

    pub fn not(sub: impl Into<RuleRef<T>>) -> Self {
        Self::with_kind(RuleKind::Not(sub.into()), OutputPolicy::Void)
    }

    pub fn condition(sub: impl Into<RuleRef<T>>) -> Self {
        Self::with_kind(RuleKind::Condition(sub.into()), OutputPolicy::Void)
    }

    pub fn reference(target: impl Into<RuleRef<T>>) -> Self {
        Self::with_kind(RuleKind::Reference(target.into()), OutputPolicy::Children)
    }

    pub fn evaluation(candidates: Vec<RuleRef<T>>) -> Self {
        Self::with_kind(RuleKind::Evaluation(candidates), OutputPolicy::Children)
    }

    pub fn find(trigger: impl Into<RuleRef<T>>) -> Self {
        Self::skip(trigger, SkipPolicy::Find)
    }

    pub fn stop_at(trigger: impl Into<RuleRef<T>>) -> Self {
        Self::skip(trigger, SkipPolicy::StopAt)
    }

    pub fn stop_after(trigger: impl Into<RuleRef<T>>) -> Self {
        Self::skip(trigger, SkipPolicy::StopAfter)
    }

    pub fn skip(trigger: impl Into<RuleRef<T>>, policy: SkipPolicy) -> Self {
        Self::with_kind(
            RuleKind::Skip {
                trigger: trigger.into(),
                policy,
            },
            OutputPolicy::Children,
        )
    }

    pub fn report(severity: Severity, message: impl Into<String>) -> Self {
        Self::with_kind(
            RuleKind::Report {
                severity,
                message: message.into(),
            },
            OutputPolicy::Emit,
        )
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::report(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::report(Severity::Error, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::with_kind(
            RuleKind::Fatal {
                message: message.into(),
                guard: None,
            },
            OutputPolicy::Void,
        )
    }

    pub fn fatal_if(message: impl Into<String>, guard: impl Into<RuleRef<T>>) -> Self {
        Self::with_kind(
            RuleKind::Fatal {
                message: message.into(),
                guard: Some(guard.into()),
            },
            OutputPolicy::Void,
        )
    }

    // ------------------------------------------------------------------
    // Chainable attributes
    // ------------------------------------------------------------------

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_policy(mut self, policy: OutputPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_precedence(mut self, precedence: i32) -> Self {
        self.precedence = precedence;
        self
    }

    /// The registered id, or the unregistered sentinel.
    pub fn id_or_sentinel(&self) -> RuleId {
        self.id.unwrap_or(RuleId::UNREGISTERED)
    }

    /// Applies the rule's output policy to a successful match.
    pub(crate) fn produce(
        &self,
        start: usize,
        length: usize,
        children: Vec<Annotation>,
    ) -> Vec<Annotation> {
        let range = Range::new(start, length);
        match self.policy {
            OutputPolicy::Emit => vec![Annotation::with_children(
                self.id_or_sentinel(),
                range,
                children,
            )],
            OutputPolicy::Root => vec![Annotation::new(self.id_or_sentinel(), range)],
            OutputPolicy::Children => children,
            OutputPolicy::Void => Vec::new(),
        }
    }

    /// A display name for diagnostics, falling back to the variant name.
    pub fn describe(&self) -> String {
        if self.name.is_empty() {
            format!("<{}>", self.kind.kind_name())
        } else {
            self.name.clone()
        }
    }
}

impl Rule<char> {
    /// Literal over the characters of a string.
    pub fn text(text: &str) -> Self {
        Self::literal(text.chars().collect())
    }

    /// Set over the characters of a string.
    pub fn chars(chars: &str) -> Self {
        Self::set(chars.chars().collect())
    }
}
