// Configuration management module
// Handles TOML configuration, provider settings and interactive setup

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, GeminiConfig, GenerationConfig, HttpConfig, OllamaConfig, ProviderKind,
    RetrievalConfig, StoreConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
