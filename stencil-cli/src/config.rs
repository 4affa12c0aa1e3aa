use anyhow::{Result, bail};
use clap::ArgMatches;
use clap::parser::ValueSource;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use stencil_core::{BuildConfig, BuildError};

pub const DEFAULT_CONFIG_FILE: &str = "./stencil.toml";

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StencilConfig {
    pub build: BuildSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildSettings {
    /// Layout file name under `<path>/layouts`
    pub layout: Option<String>,
    /// Source directory containing templates
    pub path: Option<String>,
    /// Output directory for generated pages
    pub output: Option<String>,
    /// Rebuild on source changes
    pub watch: bool,
    /// Also build each component as a standalone page
    pub components: bool,
    /// Configuration file path
    pub config: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            layout: None,
            path: None,
            output: None,
            watch: false,
            components: false,
            config: DEFAULT_CONFIG_FILE.to_string(),
        }
    }
}

impl StencilConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (STENCIL_BUILD__*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args
            .try_get_one::<String>("config")
            .ok()
            .flatten()
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        let defaults = Self::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Add configuration file if it exists
        let config_path = Path::new(&config_file);
        if config_path.exists() {
            builder = builder.add_source(File::from(config_path));
        } else if args.value_source("config") == Some(ValueSource::CommandLine) {
            bail!("configuration file {} does not exist", config_path.display());
        }

        // 3. Add environment variables with STENCIL_ prefix
        builder = builder.add_source(
            Environment::with_prefix("STENCIL")
                .prefix_separator("_")
                .separator("__"), // Use double underscore for nested keys
        );

        // 4. Override with CLI arguments (highest priority)
        for key in ["layout", "path", "output", "config"] {
            if let Some(value) = args.try_get_one::<String>(key).ok().flatten() {
                builder = builder.set_override(format!("build.{key}"), value.clone())?;
            }
        }
        for (flag, key) in [("watch", "build.watch"), ("components", "build.components")] {
            if args.try_get_one::<bool>(flag).ok().flatten() == Some(&true) {
                builder = builder.set_override(key, true)?;
            }
        }

        let config = builder.build()?;
        let stencil_config: StencilConfig = config.try_deserialize()?;

        Ok(stencil_config)
    }

    /// Turn the merged settings into the core build configuration. `layout`,
    /// `path` and `output` have no defaults and must come from some layer.
    pub fn build_config(&self) -> Result<BuildConfig> {
        let layout = required(&self.build.layout, "layout")?;
        let path = required(&self.build.path, "path")?;
        let output = required(&self.build.output, "output")?;

        Ok(BuildConfig::new(layout, path, output)
            .watch(self.build.watch)
            .build_components(self.build.components))
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, BuildError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(BuildError::Config(format!(
            "missing required setting `{key}`: pass --{key}, set STENCIL_BUILD__{}, or add `{key}` under [build] in {DEFAULT_CONFIG_FILE}",
            key.to_uppercase()
        ))),
    }
}

/// Load configuration for the build and watch commands
pub fn load_build_config(args: &ArgMatches) -> Result<StencilConfig> {
    StencilConfig::load(args)
}
