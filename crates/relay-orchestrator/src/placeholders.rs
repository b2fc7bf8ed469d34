//! Step input placeholders.
//!
//! Substitution order: `{{lastOutput}}`, then `{{allOutputs}}`, then
//! `{{stepN}}` (1-based). Unknown or out-of-range step references become
//! the empty string.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use relay_core::constants::{ALL_OUTPUTS_TOKEN, LAST_OUTPUT_TOKEN};

static STEP_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{step(\d+)\}\}").unwrap());

/// Separator between outputs in `{{allOutputs}}`.
pub const ALL_OUTPUTS_SEPARATOR: &str = "\n\n";

/// Resolve `template` against the outputs of completed steps.
pub fn resolve_placeholders(template: &str, outputs: &[String]) -> String {
    let last = outputs.last().map_or("", String::as_str);
    let resolved = template
        .replace(LAST_OUTPUT_TOKEN, last)
        .replace(ALL_OUTPUTS_TOKEN, &outputs.join(ALL_OUTPUTS_SEPARATOR));

    STEP_REF
        .replace_all(&resolved, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| outputs.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}
