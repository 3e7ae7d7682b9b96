//! Candidate selection for type-based lookups.
//!
//! The container enumerates every bean assignable to the required type and
//! hands the candidates to a [`CandidateResolver`], which picks the single
//! winner (or reports why there is none).

use crate::error::{BeanError, BeanResult};
use crate::key::TypeKey;

/// Description of one type-based dependency.
///
/// ```rust
/// use ferrous_beans::DependencyDescriptor;
///
/// trait Cache: Send + Sync {}
///
/// let descriptor = DependencyDescriptor::of::<dyn Cache>()
///     .qualified("local")
///     .optional()
///     .singletons_only();
///
/// assert_eq!(descriptor.qualifier(), Some("local"));
/// assert!(!descriptor.is_required());
/// assert!(!descriptor.includes_non_singletons());
/// ```
#[derive(Debug, Clone)]
pub struct DependencyDescriptor {
    required_type: TypeKey,
    qualifier: Option<String>,
    required: bool,
    include_non_singletons: bool,
    allow_eager_init: bool,
    requesting_bean: Option<String>,
    injection_point: Option<String>,
}

impl DependencyDescriptor {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::for_key(TypeKey::of::<T>())
    }

    pub fn for_key(required_type: TypeKey) -> Self {
        Self {
            required_type,
            qualifier: None,
            required: true,
            include_non_singletons: true,
            allow_eager_init: true,
            requesting_bean: None,
            injection_point: None,
        }
    }

    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Only singleton candidates are considered.
    pub fn singletons_only(mut self) -> Self {
        self.include_non_singletons = false;
        self
    }

    /// Disables instantiating factory beans just to learn their product type.
    pub fn without_eager_init(mut self) -> Self {
        self.allow_eager_init = false;
        self
    }

    /// The bean the dependency belongs to; it is excluded from its own
    /// candidates unless it is the only one.
    pub fn requested_by(mut self, bean: impl Into<String>) -> Self {
        self.requesting_bean = Some(bean.into());
        self
    }

    pub fn at(mut self, injection_point: impl Into<String>) -> Self {
        self.injection_point = Some(injection_point.into());
        self
    }

    pub fn required_type(&self) -> TypeKey {
        self.required_type
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn includes_non_singletons(&self) -> bool {
        self.include_non_singletons
    }

    pub fn allows_eager_init(&self) -> bool {
        self.allow_eager_init
    }

    pub fn requesting_bean(&self) -> Option<&str> {
        self.requesting_bean.as_deref()
    }

    pub fn injection_point(&self) -> Option<&str> {
        self.injection_point.as_deref()
    }

    fn describe(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("'{}' qualified '{}'", self.required_type.name(), q),
            None => format!("'{}'", self.required_type.name()),
        }
    }
}

/// One bean matching a required type, with the metadata tie-breaks look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub primary: bool,
    /// Only set when known without side effects
    pub priority: Option<i32>,
    pub qualifiers: Vec<String>,
    pub aliases: Vec<String>,
    /// Defined in the container being asked rather than an ancestor
    pub local: bool,
}

impl Candidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary: false,
            priority: None,
            qualifiers: Vec::new(),
            aliases: Vec::new(),
            local: true,
        }
    }

    fn has_qualifier(&self, qualifier: &str) -> bool {
        self.qualifiers.iter().any(|q| q == qualifier)
    }

    fn is_named(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }
}

/// Strategy choosing one candidate for a dependency.
pub trait CandidateResolver: Send + Sync {
    /// `Ok(None)` only for optional dependencies without a winner.
    fn select(&self, descriptor: &DependencyDescriptor, candidates: &[Candidate]) -> BeanResult<Option<String>>;
}

/// Exactly one, then primary, then priority, then qualifier.
///
/// - A single candidate wins outright.
/// - One primary candidate defined locally wins; several local primaries are
///   ambiguous; with no local primary an inherited primary wins.
/// - Otherwise the lowest priority wins among candidates that declare one; a
///   tie for the lowest value is ambiguous.
/// - Otherwise a supplied qualifier selects the candidate whose declared
///   qualifier equals it, falling back to a name or alias match.
/// - Anything left over is ambiguous.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCandidateResolver;

impl DefaultCandidateResolver {
    fn primary<'a>(&self, descriptor: &DependencyDescriptor, candidates: &'a [Candidate]) -> BeanResult<Option<&'a Candidate>> {
        let local: Vec<&Candidate> = candidates.iter().filter(|c| c.primary && c.local).collect();
        match local.len() {
            0 => Ok(candidates.iter().find(|c| c.primary)),
            1 => Ok(Some(local[0])),
            _ => Err(ambiguous(
                descriptor,
                local.iter().map(|c| c.name.clone()).collect(),
                "more than one 'primary' bean found among candidates",
            )),
        }
    }

    fn highest_priority<'a>(
        &self,
        descriptor: &DependencyDescriptor,
        candidates: &'a [Candidate],
    ) -> BeanResult<Option<&'a Candidate>> {
        let Some(best) = candidates.iter().filter_map(|c| c.priority).min() else {
            return Ok(None);
        };
        let winners: Vec<&Candidate> = candidates.iter().filter(|c| c.priority == Some(best)).collect();
        if winners.len() > 1 {
            return Err(ambiguous(
                descriptor,
                winners.iter().map(|c| c.name.clone()).collect(),
                &format!("multiple beans found with the same priority ('{}')", best),
            ));
        }
        Ok(winners.first().copied())
    }

    fn qualified<'a>(&self, qualifier: &str, candidates: &'a [Candidate]) -> Vec<&'a Candidate> {
        let declared: Vec<&Candidate> = candidates.iter().filter(|c| c.has_qualifier(qualifier)).collect();
        if !declared.is_empty() {
            return declared;
        }
        candidates.iter().filter(|c| c.is_named(qualifier)).collect()
    }
}

impl CandidateResolver for DefaultCandidateResolver {
    fn select(&self, descriptor: &DependencyDescriptor, candidates: &[Candidate]) -> BeanResult<Option<String>> {
        match candidates {
            [] => {
                return if descriptor.is_required() {
                    Err(not_found(descriptor))
                } else {
                    Ok(None)
                };
            }
            [only] => return Ok(Some(only.name.clone())),
            _ => {}
        }

        if let Some(primary) = self.primary(descriptor, candidates)? {
            return Ok(Some(primary.name.clone()));
        }
        if let Some(winner) = self.highest_priority(descriptor, candidates)? {
            return Ok(Some(winner.name.clone()));
        }
        if let Some(qualifier) = descriptor.qualifier() {
            let matches = self.qualified(qualifier, candidates);
            return match matches.as_slice() {
                [] if descriptor.is_required() => Err(not_found(descriptor)),
                [] => Ok(None),
                [only] => Ok(Some(only.name.clone())),
                many => Err(ambiguous(
                    descriptor,
                    many.iter().map(|c| c.name.clone()).collect(),
                    &format!("more than one bean qualified '{}'", qualifier),
                )),
            };
        }
        Err(ambiguous(
            descriptor,
            candidates.iter().map(|c| c.name.clone()).collect(),
            "expected single matching bean",
        ))
    }
}

fn not_found(descriptor: &DependencyDescriptor) -> BeanError {
    BeanError::no_such_type(
        descriptor.required_type().name(),
        format!("no qualifying bean of type {} available", descriptor.describe()),
    )
}

fn ambiguous(descriptor: &DependencyDescriptor, candidates: Vec<String>, reason: &str) -> BeanError {
    BeanError::AmbiguousDefinition {
        required_type: descriptor.required_type().name(),
        message: format!(
            "{} of type {} but found {}",
            reason,
            descriptor.describe(),
            candidates.len()
        ),
        candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Repo {}

    fn descriptor() -> DependencyDescriptor {
        DependencyDescriptor::of::<dyn Repo>()
    }

    fn cand(name: &str) -> Candidate {
        Candidate::new(name)
    }

    #[test]
    fn empty_required_is_not_found_and_optional_is_none() {
        let resolver = DefaultCandidateResolver;
        assert!(resolver.select(&descriptor(), &[]).unwrap_err().is_no_such_definition());
        assert_eq!(resolver.select(&descriptor().optional(), &[]).unwrap(), None);
    }

    #[test]
    fn single_candidate_wins_even_with_foreign_qualifier() {
        let resolver = DefaultCandidateResolver;
        let out = resolver.select(&descriptor().qualified("other"), &[cand("a")]).unwrap();
        assert_eq!(out.as_deref(), Some("a"));
    }

    #[test]
    fn local_primary_beats_inherited_primary() {
        let mut parent = cand("p");
        parent.primary = true;
        parent.local = false;
        let mut local = cand("l");
        local.primary = true;
        let out = DefaultCandidateResolver.select(&descriptor(), &[parent.clone(), local]).unwrap();
        assert_eq!(out.as_deref(), Some("l"));

        let out = DefaultCandidateResolver.select(&descriptor(), &[parent, cand("x")]).unwrap();
        assert_eq!(out.as_deref(), Some("p"));
    }

    #[test]
    fn primary_short_circuits_qualifier() {
        let mut primary = cand("main");
        primary.primary = true;
        let mut other = cand("backup");
        other.qualifiers.push("x".into());
        let out = DefaultCandidateResolver.select(&descriptor().qualified("x"), &[primary, other]).unwrap();
        assert_eq!(out.as_deref(), Some("main"));
    }

    #[test]
    fn priority_ties_are_ambiguous() {
        let mut a = cand("a");
        a.priority = Some(1);
        let mut b = cand("b");
        b.priority = Some(1);
        let mut c = cand("c");
        c.priority = Some(5);
        let err = DefaultCandidateResolver.select(&descriptor(), &[a, b, c.clone()]).unwrap_err();
        assert!(err.is_ambiguous());

        let out = DefaultCandidateResolver.select(&descriptor(), &[cand("d"), c]).unwrap();
        assert_eq!(out.as_deref(), Some("c"));
    }

    #[test]
    fn qualifier_prefers_declared_then_name_then_alias() {
        let mut a = cand("a");
        a.qualifiers.push("fast".into());
        let mut b = cand("fast");
        b.aliases.push("quick".into());
        let c = cand("c");
        let all = [a, b, c];

        let declared = DefaultCandidateResolver.select(&descriptor().qualified("fast"), &all).unwrap();
        assert_eq!(declared.as_deref(), Some("a"));
        let by_alias = DefaultCandidateResolver.select(&descriptor().qualified("quick"), &all).unwrap();
        assert_eq!(by_alias.as_deref(), Some("fast"));
        let missing = DefaultCandidateResolver.select(&descriptor().qualified("none"), &all);
        assert!(missing.unwrap_err().is_no_such_definition());
        let optional = DefaultCandidateResolver.select(&descriptor().qualified("none").optional(), &all);
        assert_eq!(optional.unwrap(), None);
    }

    #[test]
    fn unresolved_tie_is_ambiguous() {
        let err = DefaultCandidateResolver.select(&descriptor(), &[cand("a"), cand("b")]).unwrap_err();
        match err {
            BeanError::AmbiguousDefinition { candidates, .. } => assert_eq!(candidates, ["a", "b"]),
            other => panic!("unexpected {other}"),
        }
    }
}
