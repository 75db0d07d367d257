//! Equality-based label selectors
//!
//! A [`LabelSelector`] is the only link between the Reconciler's output and
//! the Waiter's input: pods are correlated to the applied workload purely by
//! label equality.

use std::collections::BTreeMap;
use std::fmt;

use converge_common::Error;

/// Maximum length of a label name or value
const MAX_LABEL_LENGTH: usize = 63;
/// Maximum length of a label key prefix (a DNS subdomain)
const MAX_PREFIX_LENGTH: usize = 253;

/// A set of `key=value` label requirements, all of which must match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    /// Create a selector from a label map
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }

    /// True if the selector has no requirements
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build the API query string (`k1=v1,k2=v2`, sorted by key).
    ///
    /// Fails if the selector is empty, since an empty selector matches every
    /// pod in the namespace, or if any key or value is not a valid label.
    pub fn to_query(&self) -> Result<String, Error> {
        if self.is_empty() {
            return Err(Error::selector(
                "selector is empty and would match every pod in the namespace",
            ));
        }
        for (key, value) in &self.0 {
            validate_label_key(key)?;
            validate_label_value(key, value)?;
        }
        Ok(self.to_string())
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSelector {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Validate a label key: `[prefix/]name`
fn validate_label_key(key: &str) -> Result<(), Error> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if !is_dns_subdomain(prefix) {
            return Err(Error::selector(format!(
                "label key {:?} has an invalid prefix: must be a lowercase DNS subdomain of at most {} characters",
                key, MAX_PREFIX_LENGTH
            )));
        }
    }

    if name.is_empty() || !is_qualified_name(name) {
        return Err(Error::selector(format!(
            "label key {:?} is invalid: name must be 1-{} alphanumeric characters, '-', '_' or '.', starting and ending with an alphanumeric",
            key, MAX_LABEL_LENGTH
        )));
    }
    Ok(())
}

/// Validate a label value: empty, or a qualified name
fn validate_label_value(key: &str, value: &str) -> Result<(), Error> {
    if value.is_empty() || is_qualified_name(value) {
        return Ok(());
    }
    Err(Error::selector(format!(
        "label value {:?} for key {:?} is invalid: must be at most {} alphanumeric characters, '-', '_' or '.', starting and ending with an alphanumeric",
        value, key, MAX_LABEL_LENGTH
    )))
}

fn is_qualified_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            s.len() <= MAX_LABEL_LENGTH
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

fn is_dns_subdomain(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_PREFIX_LENGTH {
        return false;
    }
    s.split('.').all(|part| {
        let bytes = part.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                is_lower_alnum(*first)
                    && is_lower_alnum(*last)
                    && bytes.iter().all(|b| is_lower_alnum(*b) || *b == b'-')
            }
            _ => false,
        }
    })
}

fn is_lower_alnum(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}
