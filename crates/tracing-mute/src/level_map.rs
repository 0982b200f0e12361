use tracing::level_filters::LevelFilter;

/// Ordered mapping from target prefixes to level filters.
///
/// A prefix matches the target itself and any `::`-separated descendant, so
/// `"app::db"` covers `app::db` and `app::db::pool` but not `app::dbx`. The
/// empty prefix matches every target. When several prefixes match, the most
/// specific (longest) one wins.
///
/// The map is ephemeral: it is built fresh for a scope and discarded with it.
#[derive(Clone, Debug, Default)]
pub struct TargetLevelMap {
    entries: Vec<(String, LevelFilter)>,
}

impl TargetLevelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override for `target` and its descendants.
    #[must_use]
    pub fn with(mut self, target: impl Into<String>, filter: LevelFilter) -> Self {
        self.entries.push((target.into(), filter));
        self
    }

    /// Builds a map silencing every given target entirely.
    pub fn muting<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = targets
            .into_iter()
            .map(|target| (target.into(), LevelFilter::OFF))
            .collect();
        Self { entries }
    }

    /// Returns the filter of the most specific prefix matching `target`, if any.
    pub fn filter_for(&self, target: &str) -> Option<LevelFilter> {
        self.entries
            .iter()
            .filter(|(prefix, _)| prefix_matches(prefix, target))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, filter)| *filter)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `prefix` matches `target` when they are equal, or when `target` is a
/// `::`-separated descendant of `prefix`. The empty prefix matches everything.
pub(crate) fn prefix_matches(prefix: &str, target: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match target.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with("::"),
        None => false,
    }
}
