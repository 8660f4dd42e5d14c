// ABOUTME: Distinct identifier types for runtime resources.
// ABOUTME: Keeps container and network ids from being swapped at call sites.

use serde::{Deserialize, Serialize};

macro_rules! runtime_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        #[must_use = "IDs reference resources and should not be ignored"]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Abbreviated form used in progress output (12 characters, like `docker ps`).
            pub fn short(&self) -> &str {
                match self.0.char_indices().nth(12) {
                    Some((idx, _)) => &self.0[..idx],
                    None => &self.0,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

runtime_id!(
    /// Container id or name as accepted by the runtime API.
    ContainerId
);

runtime_id!(
    /// Network id or name as accepted by the runtime API.
    NetworkId
);
