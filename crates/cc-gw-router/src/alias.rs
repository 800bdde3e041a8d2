/// Marketing → dated Anthropic model id aliases (spec §4.7 step 3).
/// Small static table; extend as Anthropic ships new dated snapshots.
const ALIASES: &[(&str, &str)] = &[
    ("claude-3-opus-latest", "claude-3-opus-20240229"),
    ("claude-3-5-sonnet-latest", "claude-3-5-sonnet-20241022"),
    ("claude-3-5-haiku-latest", "claude-3-5-haiku-20241022"),
    ("claude-3-7-sonnet-latest", "claude-3-7-sonnet-20250219"),
    ("claude-sonnet-4-latest", "claude-sonnet-4-20250514"),
    ("claude-opus-4-latest", "claude-opus-4-20250514"),
];

/// Resolve a marketing alias to its dated id, or return `None` if
/// `model_id` isn't a known alias.
pub fn resolve_alias(model_id: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == model_id)
        .map(|(_, dated)| *dated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_alias_resolves() {
        assert_eq!(
            resolve_alias("claude-3-5-sonnet-latest"),
            Some("claude-3-5-sonnet-20241022")
        );
    }

    #[test]
    fn unknown_alias_is_none() {
        assert_eq!(resolve_alias("gpt-4o"), None);
    }
}
