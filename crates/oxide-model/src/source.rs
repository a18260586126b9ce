//! Configuration sources and mutation outcomes.

/// Where a piece of metadata came from.
///
/// Sources are totally ordered: `Convention < DataAnnotation < Explicit`.
/// Metadata set from a stronger source can only be replaced by an equal or
/// stronger one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigurationSource {
    /// Inferred by a convention.
    Convention,
    /// Declared on the reflected type (e.g. `#[reflect(not_mapped)]`).
    DataAnnotation,
    /// Configured through the builder API.
    Explicit,
}

impl ConfigurationSource {
    /// Returns true when metadata from `self` may replace metadata held at
    /// `held`. Unset metadata can always be replaced.
    #[must_use]
    pub fn overrides(self, held: Option<Self>) -> bool {
        held.map_or(true, |held| self >= held)
    }

    /// Returns the stronger of `self` and `other`.
    #[must_use]
    pub fn strongest(self, other: Option<Self>) -> Self {
        match other {
            Some(other) if other > self => other,
            _ => self,
        }
    }
}

/// Result of a mutation that is subject to precedence arbitration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    /// The mutation took effect (or was already in effect).
    Applied(T),
    /// Stronger configuration already holds the slot.
    Rejected {
        /// Source of the configuration that won.
        held: ConfigurationSource,
    },
}

impl<T> Outcome<T> {
    /// Returns true if the mutation took effect.
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Returns the applied value, if any.
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Rejected { .. } => None,
        }
    }

    /// Maps the applied value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Applied(value) => Outcome::Applied(f(value)),
            Self::Rejected { held } => Outcome::Rejected { held },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ordering() {
        assert!(ConfigurationSource::Convention < ConfigurationSource::DataAnnotation);
        assert!(ConfigurationSource::DataAnnotation < ConfigurationSource::Explicit);
    }

    #[test]
    fn test_overrides() {
        use ConfigurationSource::*;
        assert!(Convention.overrides(None));
        assert!(Convention.overrides(Some(Convention)));
        assert!(!Convention.overrides(Some(DataAnnotation)));
        assert!(Explicit.overrides(Some(DataAnnotation)));
        assert!(!DataAnnotation.overrides(Some(Explicit)));
    }

    #[test]
    fn test_strongest() {
        use ConfigurationSource::*;
        assert_eq!(Convention.strongest(Some(Explicit)), Explicit);
        assert_eq!(Explicit.strongest(Some(Convention)), Explicit);
        assert_eq!(DataAnnotation.strongest(None), DataAnnotation);
    }

    #[test]
    fn test_outcome_map() {
        let applied: Outcome<u32> = Outcome::Applied(2);
        assert_eq!(applied.map(|v| v * 2), Outcome::Applied(4));

        let rejected: Outcome<u32> = Outcome::Rejected {
            held: ConfigurationSource::Explicit,
        };
        assert!(!rejected.is_applied());
        assert_eq!(rejected.applied(), None);
    }
}
