//! Environment variable interpolation for config files.
//!
//! - `${VAR}` substitutes the value of `VAR`, error if unset
//! - `${VAR:-default}` uses `default` if `VAR` is unset or empty
//! - `$$` is a literal `$`

use regex::{Captures, Regex};
use std::sync::LazyLock;

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("variable pattern is valid")
});

/// Substitute variables in `input` using `lookup`.
///
/// Returns the missing variable names as the error so they can all be
/// reported together.
pub fn interpolate_with<F>(input: &str, lookup: F) -> Result<String, Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = Vec::new();

    let text = VAR_PATTERN.replace_all(input, |caps: &Captures| {
        let Some(name) = caps.get(1) else {
            return "$".to_string();
        };
        let default = caps.get(2).map(|m| m.as_str());

        match (lookup(name.as_str()), default) {
            (Some(value), Some(default)) if value.is_empty() => default.to_string(),
            (Some(value), _) => value,
            (None, Some(default)) => default.to_string(),
            (None, None) => {
                missing.push(name.as_str().to_string());
                caps[0].to_string()
            }
        }
    });

    if missing.is_empty() {
        Ok(text.into_owned())
    } else {
        Err(missing)
    }
}

/// Substitute variables in `input` from the process environment.
pub fn interpolate(input: &str) -> Result<String, Vec<String>> {
    interpolate_with(input, |name| std::env::var(name).ok())
}
