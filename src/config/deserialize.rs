// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles argv lists and extra edge directives.

use nonempty::NonEmpty;
use serde::Deserialize;

pub fn deserialize_argv<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("command needs at least one argument"))
}

/// Extra directives are spliced into the generated route block, so each
/// must keep braces balanced on its own.
pub fn deserialize_directives<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|directive| {
            let depth = crate::routes::brace_delta(&directive);
            if depth != 0 {
                Err(serde::de::Error::custom(format!(
                    "directive has unbalanced braces: {directive}"
                )))
            } else {
                Ok(directive.trim_end().to_string())
            }
        })
        .collect()
}
