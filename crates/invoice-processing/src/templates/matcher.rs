//! Fuzzy matching of template column names against dataset headers.

use tracing::debug;

/// Maps the column names stored in a template onto the headers of a dataset.
///
/// Exports from different invoice platforms spell the same field slightly
/// differently ("发票代码" vs "代码"), so besides exact matches a template
/// name also matches a header that contains it or is contained by it.
pub struct TemplateMatcher;

impl TemplateMatcher {
    /// Resolve template names to actual column names.
    ///
    /// For each template name, in order: an exact header match wins;
    /// otherwise the first header (in column order) where either string
    /// contains the other is taken. Names matching nothing are dropped, and
    /// a header selected twice is only reported once. Empty names never
    /// match.
    pub fn match_columns<S, T>(template_names: &[S], actual_columns: &[T]) -> Vec<String>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut matched: Vec<String> = Vec::new();

        for name in template_names {
            let name = name.as_ref();
            if name.is_empty() {
                continue;
            }

            let found = actual_columns
                .iter()
                .map(AsRef::as_ref)
                .find(|actual| *actual == name)
                .or_else(|| {
                    actual_columns
                        .iter()
                        .map(AsRef::as_ref)
                        .find(|actual| actual.contains(name) || name.contains(actual))
                });

            match found {
                Some(actual) => {
                    if actual != name {
                        debug!("Template column '{}' matched '{}'", name, actual);
                    }
                    if !matched.iter().any(|m| m == actual) {
                        matched.push(actual.to_string());
                    }
                }
                None => debug!("Template column '{}' has no match", name),
            }
        }

        matched
    }
}
