use crate::runtime::interpreter::DEFAULT_RECURSION_LIMIT;

pub const DEFAULT_MAX_LIST_LEVELS: usize = 2048;
pub const DEFAULT_SOURCE_NAME: &str = "User Input";

pub const ENV_MAX_LIST_LEVELS: &str = "PYBRIDGE_MAX_LIST_LEVELS";
pub const ENV_RECURSION_LIMIT: &str = "PYBRIDGE_RECURSION_LIMIT";
pub const ENV_SOURCE_NAME: &str = "PYBRIDGE_SOURCE_NAME";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Nesting capacity of the list builder.
    pub max_list_levels: usize,
    /// Maximum depth of user function calls.
    pub recursion_limit: usize,
    /// File name shown in error reports.
    pub source_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_list_levels: DEFAULT_MAX_LIST_LEVELS,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            source_name: DEFAULT_SOURCE_NAME.to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from a variable lookup. Unparsable or zero values
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(levels) = positive(lookup(ENV_MAX_LIST_LEVELS)) {
            config.max_list_levels = levels;
        }
        if let Some(limit) = positive(lookup(ENV_RECURSION_LIMIT)) {
            config.recursion_limit = limit;
        }
        if let Some(name) = lookup(ENV_SOURCE_NAME).filter(|name| !name.trim().is_empty()) {
            config.source_name = name;
        }
        config
    }
}

fn positive(raw: Option<String>) -> Option<usize> {
    let raw = raw?;
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            tracing::warn!(value = %raw, "ignoring invalid configuration value");
            None
        }
    }
}
