// ABOUTME: Argv templates for external commands (bring-up, validate, reload).
// ABOUTME: Placeholders like {service} and {config} are substituted per argument.

use nonempty::NonEmpty;
use serde::{Deserialize, Deserializer};

/// A non-empty argv with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate(NonEmpty<String>);

impl<'de> Deserialize<'de> for CommandTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        super::deserialize::deserialize_argv(deserializer).map(Self)
    }
}

impl CommandTemplate {
    pub fn new(program: &str, args: &[&str]) -> Self {
        let mut argv = NonEmpty::new(program.to_string());
        argv.extend(args.iter().map(|a| a.to_string()));
        Self(argv)
    }

    /// Substitute placeholders in every argument.
    pub fn render(&self, vars: &[(&str, &str)]) -> NonEmpty<String> {
        self.0.clone().map(|arg| {
            vars.iter().fold(arg, |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
        })
    }

    pub fn program(&self) -> &str {
        self.0.first()
    }
}

impl std::fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = self.0.iter().map(String::as_str).collect();
        f.write_str(&parts.join(" "))
    }
}
