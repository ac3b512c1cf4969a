//! plan scoped key/value configuration
//!
//! The configuration is a tree of hashes. A lookup names a path into that tree (the source) and a
//! key, e.g. source `nodes/%{::clientcert}` and key `ntp::servers`:
//!
//! ```yaml
//! configuration:
//!   nodes:
//!     web01.example.com:
//!       ntp::servers: [ntp1.example.com]
//! ```
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::OnceLock;

/// Variables available to `%{var}` interpolation in sources
pub type Scope = IndexMap<String, String>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("no value for '{key}' in '{path}'")]
pub struct ConfigurationValueNotFound {
    /// The source after interpolation
    pub path: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    raw: Value,
}

impl Configuration {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.as_object().map_or(true, |map| map.is_empty())
    }

    pub fn lookup(
        &self,
        source: &str,
        key: &str,
        scope: &Scope,
    ) -> Result<&Value, ConfigurationValueNotFound> {
        let source = interpolate(source, scope);
        let not_found = || ConfigurationValueNotFound {
            path: source.clone(),
            key: key.to_string(),
        };

        let data = source
            .split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.raw, |data, segment| data.field(segment))
            .ok_or_else(not_found)?;
        let value = data.field(key).ok_or_else(not_found)?;

        tracing::trace!(%source, key, "configuration value found");
        Ok(value)
    }
}

/// Replace `%{var}` by the value of `var` in `scope`, unknown variables become empty
///
/// Variables may be written top scope qualified (`%{::var}`).
fn interpolate(source: &str, scope: &Scope) -> String {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| regex::Regex::new(r"%\{([^}]*)\}").expect("static pattern compiles"));

    pattern
        .replace_all(source, |captures: &regex::Captures| {
            let name = &captures[1];
            scope
                .get(name)
                .or_else(|| scope.get(name.trim_start_matches("::")))
                .or_else(|| scope.get(&format!("::{name}")))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}
