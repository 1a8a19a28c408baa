//! Runtime configuration read from the environment.

/// Environment variable that toggles common-subexpression elimination.
pub const CSE_ENV: &str = "SHIM_CSE";

/// Knobs applied when a [`Stream`](crate::backend::Stream) is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Deduplicate identical op nodes and constants.
    pub cse: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { cse: true }
    }
}

impl RuntimeConfig {
    /// Read the configuration from the process environment.
    ///
    /// `SHIM_CSE` accepts `0`, `false`, `off` (disable) and `1`, `true`, `on`
    /// (enable), case-insensitive. Unrecognized values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(val) = lookup(CSE_ENV) {
            match val.to_lowercase().as_str() {
                "0" | "false" | "off" => config.cse = false,
                "1" | "true" | "on" => config.cse = true,
                other => {
                    tracing::warn!(value = other, "ignoring unrecognized {CSE_ENV} value");
                }
            }
        }
        config
    }
}
