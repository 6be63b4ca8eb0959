// ── Derived views ──
//
// Pure functions of (records, filter). Nothing is indexed: the view is
// rebuilt on every read, which is cheap at tens to hundreds of stacks.

use std::cmp::Ordering;
use std::sync::Arc;

use icu_collator::{Collator, CollatorOptions};

use crate::model::{StackRecord, StackStatus};

/// Filter parameters for the stack view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFilter {
    /// Exact status match; `None` keeps every status.
    pub status: Option<StackStatus>,
    /// Case-insensitive substring of `path`; empty keeps every path.
    pub query: String,
}

impl StackFilter {
    pub fn matches(&self, record: &StackRecord) -> bool {
        if self.status.is_some_and(|s| s != record.status) {
            return false;
        }
        self.query.is_empty()
            || record
                .path
                .to_lowercase()
                .contains(&self.query.to_lowercase())
    }
}

/// Filter then sort ascending by `path`.
pub fn filter_and_sort(
    records: &[Arc<StackRecord>],
    filter: &StackFilter,
) -> Vec<Arc<StackRecord>> {
    let mut view: Vec<Arc<StackRecord>> = records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();
    view.sort_by(|a, b| compare_paths(&a.path, &b.path));
    view
}

thread_local! {
    // Root locale, tertiary strength, non-ignorable punctuation.
    static ROOT_COLLATOR: Option<Collator> =
        Collator::try_new(&Default::default(), CollatorOptions::new()).ok();
}

/// Root-locale collation of two paths.
///
/// Punctuation sorts before digits, digits before letters, and a lowercase
/// spelling before its uppercase twin. Paths equal under collation fall
/// back to code point order so the sort stays total.
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    ROOT_COLLATOR
        .with(|collator| match collator {
            Some(c) => c.compare(a, b),
            None => fold_case_compare(a, b),
        })
        .then_with(|| a.cmp(b))
}

// Only used if the baked collation data cannot be loaded.
fn fold_case_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(path: &str, status: StackStatus) -> Arc<StackRecord> {
        Arc::new(StackRecord::new(path, "docker-compose.yml", "h", status))
    }

    fn paths(view: &[Arc<StackRecord>]) -> Vec<&str> {
        view.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn sorts_by_path_regardless_of_input_order() {
        let records = vec![
            record("infra/db", StackStatus::Synced),
            record("apps/web", StackStatus::Synced),
            record("apps/api", StackStatus::Synced),
        ];
        let view = filter_and_sort(&records, &StackFilter::default());
        assert_eq!(paths(&view), vec!["apps/api", "apps/web", "infra/db"]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let records = vec![
            record("apps/api", StackStatus::Synced),
            record("apps/web", StackStatus::Synced),
            record("infra/DB", StackStatus::Synced),
        ];
        let filter = StackFilter {
            query: "db".into(),
            ..StackFilter::default()
        };
        assert_eq!(paths(&filter_and_sort(&records, &filter)), vec!["infra/DB"]);

        let filter = StackFilter {
            query: "APPS".into(),
            ..StackFilter::default()
        };
        assert_eq!(
            paths(&filter_and_sort(&records, &filter)),
            vec!["apps/api", "apps/web"]
        );
    }

    #[test]
    fn status_and_query_combine() {
        let records = vec![
            record("apps/api", StackStatus::Failed),
            record("apps/web", StackStatus::Synced),
            record("infra/db", StackStatus::Failed),
        ];
        let filter = StackFilter {
            status: Some(StackStatus::Failed),
            query: "apps".into(),
        };
        assert_eq!(paths(&filter_and_sort(&records, &filter)), vec!["apps/api"]);
    }

    #[test]
    fn case_folded_ordering() {
        let mut names = vec!["beta", "Alpha", "alpha", "Gamma"];
        names.sort_by(|a, b| compare_paths(a, b));
        assert_eq!(names, vec!["alpha", "Alpha", "beta", "Gamma"]);
    }

    #[test]
    fn punctuation_follows_collation_order() {
        let mut names = vec![
            "apps/my-app",
            "apps/my_app",
            "apps/my1",
            "apps/my.app",
            "apps/MY-b",
        ];
        names.sort_by(|a, b| compare_paths(a, b));
        assert_eq!(
            names,
            vec!["apps/my_app", "apps/my-app", "apps/MY-b", "apps/my.app", "apps/my1"]
        );
    }

    #[test]
    fn digits_sort_before_letters() {
        let mut names = vec!["web", "2-cache", "10-db", "api"];
        names.sort_by(|a, b| compare_paths(a, b));
        assert_eq!(names, vec!["10-db", "2-cache", "api", "web"]);
    }

    #[test]
    fn separators_sort_before_letters() {
        let mut names = vec!["apps-old/x", "apps/x", "appsx"];
        names.sort_by(|a, b| compare_paths(a, b));
        assert_eq!(names, vec!["apps-old/x", "apps/x", "appsx"]);
    }
}
