//! Choice validation and node-id derivation for decision requests.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::DecisionOption;

const MAX_NODE_ID_LEN: usize = 64;
const FALLBACK_NODE_ID: &str = "decision";

/// Returns `true` if `chosen` names one of `options`.
pub fn is_valid_choice(options: &[DecisionOption], chosen: &str) -> bool {
    options.iter().any(|option| option.id == chosen)
}

/// Option ids in offered order, for error reporting.
pub fn option_ids(options: &[DecisionOption]) -> Vec<String> {
    options.iter().map(|option| option.id.clone()).collect()
}

/// Derive a stable node label from the decision intent.
///
/// Lowercases ASCII, collapses every run of non-alphanumerics into `_`, trims
/// leading/trailing `_` and caps the length.
pub fn node_id_from_intent(intent: &str) -> String {
    static SEPARATORS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid separator regex"));

    let lowered = intent.to_ascii_lowercase();
    let slug = SEPARATORS.replace_all(&lowered, "_");
    let trimmed: String = slug.trim_matches('_').chars().take(MAX_NODE_ID_LEN).collect();
    let trimmed = trimmed.trim_end_matches('_');
    if trimmed.is_empty() {
        return FALLBACK_NODE_ID.to_string();
    }
    trimmed.to_string()
}
