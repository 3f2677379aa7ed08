//! The `--where` filter mini-language.
//!
//! `,` separates disjuncts (OR), `+` binds tighter (AND), `^` negates one
//! term. A repo matches iff any disjunct is fully satisfied. The atom
//! table is small and closed; adding a term means extending [`TERMS`],
//! [`eval`], and the command docs together.

use crate::error::ArbError;

use super::RepoFlags;

/// Every recognised term, in documentation order.
pub const TERMS: &[&str] = &[
    "dirty",
    "unpushed",
    "behind-share",
    "behind-base",
    "diverged",
    "drifted",
    "detached",
    "operation",
    "local",
    "gone",
    "shallow",
    "merged",
    "base-merged",
    "at-risk",
    "stale",
    "clean",
    "pushed",
    "synced-base",
    "synced-share",
    "synced",
    "safe",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Atom {
    negated: bool,
    term: String,
}

/// A parsed filter expression: OR of ANDs of possibly-negated atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    disjuncts: Vec<Vec<Atom>>,
}

impl Filter {
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let mut disjuncts = Vec::new();
        for disjunct in input.split(',') {
            let mut atoms = Vec::new();
            for raw in disjunct.split('+') {
                let raw = raw.trim();
                let (negated, term) = match raw.strip_prefix('^') {
                    Some(rest) => (true, rest.trim()),
                    None => (false, raw),
                };
                if term.is_empty() {
                    return Err(ArbError::user(format!(
                        "empty term in filter '{input}'"
                    ))
                    .into());
                }
                if !TERMS.contains(&term) {
                    return Err(ArbError::user(format!(
                        "unknown filter term '{term}'; valid terms: {}",
                        TERMS.join(", ")
                    ))
                    .into());
                }
                atoms.push(Atom {
                    negated,
                    term: term.to_string(),
                });
            }
            disjuncts.push(atoms);
        }
        Ok(Filter { disjuncts })
    }

    /// Short-circuit evaluation: first satisfied disjunct wins.
    pub fn matches(&self, flags: &RepoFlags) -> bool {
        self.disjuncts.iter().any(|atoms| {
            atoms
                .iter()
                .all(|atom| eval(&atom.term, flags) != atom.negated)
        })
    }
}

fn eval(term: &str, f: &RepoFlags) -> bool {
    match term {
        "dirty" => f.is_dirty,
        "unpushed" => f.is_unpushed,
        "behind-share" => f.needs_pull,
        "behind-base" => f.needs_rebase,
        "diverged" => f.is_diverged,
        "drifted" => f.is_drifted,
        "detached" => f.is_detached,
        "operation" => f.has_operation,
        "local" => f.is_local,
        "gone" => f.is_gone,
        "shallow" => f.is_shallow,
        "merged" => f.is_merged,
        "base-merged" => f.is_base_merged,
        "at-risk" => f.needs_attention(),
        // Already integrated somewhere; a cleanup candidate.
        "stale" => f.is_merged || f.is_base_merged,
        // Documented negative aliases.
        "clean" => !f.is_dirty,
        "pushed" => !f.is_unpushed,
        "synced-base" => !f.needs_rebase,
        "synced-share" => !f.needs_pull,
        "synced" => !f.needs_rebase && !f.needs_pull,
        "safe" => !f.needs_attention(),
        _ => unreachable!("validated at parse time"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(mutate: impl FnOnce(&mut RepoFlags)) -> RepoFlags {
        let mut f = RepoFlags::default();
        mutate(&mut f);
        f
    }

    #[test]
    fn single_term() {
        let filter = Filter::parse("dirty").unwrap();
        assert!(filter.matches(&flags(|f| f.is_dirty = true)));
        assert!(!filter.matches(&RepoFlags::default()));
    }

    #[test]
    fn negation() {
        let filter = Filter::parse("^dirty").unwrap();
        assert!(filter.matches(&RepoFlags::default()));
        assert!(!filter.matches(&flags(|f| f.is_dirty = true)));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // dirty+unpushed,gone == (dirty AND unpushed) OR gone
        let filter = Filter::parse("dirty+unpushed,gone").unwrap();
        assert!(filter.matches(&flags(|f| {
            f.is_dirty = true;
            f.is_unpushed = true;
        })));
        assert!(filter.matches(&flags(|f| f.is_gone = true)));
        assert!(!filter.matches(&flags(|f| f.is_dirty = true)));
    }

    #[test]
    fn mixed_negation_in_conjunct() {
        let filter = Filter::parse("unpushed+^dirty").unwrap();
        assert!(filter.matches(&flags(|f| f.is_unpushed = true)));
        assert!(!filter.matches(&flags(|f| {
            f.is_unpushed = true;
            f.is_dirty = true;
        })));
    }

    #[test]
    fn aliases_negate_their_base_terms() {
        for (positive, negative) in [
            ("dirty", "clean"),
            ("unpushed", "pushed"),
            ("behind-base", "synced-base"),
            ("behind-share", "synced-share"),
            ("at-risk", "safe"),
        ] {
            let pos = Filter::parse(positive).unwrap();
            let neg = Filter::parse(negative).unwrap();
            let all = [
                RepoFlags::default(),
                flags(|f| f.is_dirty = true),
                flags(|f| f.is_unpushed = true),
                flags(|f| f.needs_rebase = true),
                flags(|f| f.needs_pull = true),
            ];
            for f in &all {
                assert_ne!(pos.matches(f), neg.matches(f), "{positive}/{negative}");
            }
        }
    }

    #[test]
    fn synced_requires_both_sides() {
        let filter = Filter::parse("synced").unwrap();
        assert!(filter.matches(&RepoFlags::default()));
        assert!(!filter.matches(&flags(|f| f.needs_rebase = true)));
        assert!(!filter.matches(&flags(|f| f.needs_pull = true)));
    }

    #[test]
    fn at_risk_tracks_needs_attention() {
        let filter = Filter::parse("at-risk").unwrap();
        assert!(filter.matches(&flags(|f| f.is_detached = true)));
        assert!(filter.matches(&flags(|f| f.is_gone = true)));
        assert!(!filter.matches(&RepoFlags::default()));
    }

    #[test]
    fn stale_means_integrated() {
        let filter = Filter::parse("stale").unwrap();
        assert!(filter.matches(&flags(|f| f.is_merged = true)));
        assert!(filter.matches(&flags(|f| f.is_base_merged = true)));
        assert!(!filter.matches(&RepoFlags::default()));
    }

    #[test]
    fn unknown_term_lists_valid_ones() {
        let err = Filter::parse("dirty,bogus").unwrap_err().to_string();
        assert!(err.contains("bogus"));
        assert!(err.contains("behind-share"));
    }

    #[test]
    fn empty_term_rejected() {
        assert!(Filter::parse("dirty+").is_err());
        assert!(Filter::parse("").is_err());
        assert!(Filter::parse("^").is_err());
    }

    #[test]
    fn whitespace_tolerated_around_atoms() {
        let filter = Filter::parse(" dirty , ^gone ").unwrap();
        assert!(filter.matches(&flags(|f| f.is_dirty = true)));
    }
}
