//! Config command handler

use sitecheck::RunConfig;

use crate::commands::{ConfigArgs, ConfigFormat};
use crate::error::CliResult;

/// Render `config` in the requested format
pub fn render_config(config: &RunConfig, format: ConfigFormat) -> CliResult<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml_ng::to_string(config)?,
    })
}

/// Execute the config command: print the configuration resolved from the environment
pub fn execute_config(args: &ConfigArgs) -> CliResult<()> {
    let config = RunConfig::from_env()?;
    println!("{}", render_config(&config, args.format)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sitecheck::RunMode;

    #[test]
    fn test_render_json_round_trips() {
        let config = RunConfig::for_mode(RunMode::Ci, None);
        let json = render_config(&config, ConfigFormat::Json).unwrap();
        let parsed: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_render_yaml_fields() {
        let config = RunConfig::for_mode(RunMode::Local, None);
        let yaml = render_config(&config, ConfigFormat::Yaml).unwrap();
        assert!(yaml.contains("retries: 0"));
        assert!(yaml.contains("base_url: http://localhost:3000"));
        assert!(yaml.contains("max_diff_pixel_ratio: 0.02"));
    }
}
