use anyhow::Context;
use std::path::Path;

use crate::style::StyleConfig;

impl StyleConfig {
    /// Load a style file. The format (YAML or JSON) follows the extension.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .with_context(|| format!("Config: Failed to read style file {:?}", path))?;
        let style: StyleConfig = settings
            .try_deserialize()
            .with_context(|| format!("Config: Invalid style file {:?}", path))?;
        tracing::info!("Loaded style {:?} ({} rules)", path, style.rules.len());
        Ok(style)
    }

    /// Parse style text in the given format.
    pub fn from_str(content: &str, format: ::config::FileFormat) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(content, format))
            .build()
            .context("Config: Failed to parse style")?;
        Ok(settings.try_deserialize()?)
    }
}
