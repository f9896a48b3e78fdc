//! Settings resolution: CLI flags > environment > TOML file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// How many citations / entries verbose mode prints.
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

/// Contents of a `citecheck.toml` file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Titles recognised as reference sections in addition to the built-in ones.
    pub extra_headings: Option<Vec<String>>,
    pub scan_reference_section: Option<bool>,
    pub verbose: Option<bool>,
    pub sample_limit: Option<usize>,
}

pub fn load_config(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file as TOML: {}", path.display()))?;
    Ok(config)
}

/// The flags that take part in settings resolution.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub headings: Vec<String>,
    pub scan_reference_section: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Fully resolved run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub core: citecheck_core::Config,
    pub verbose: bool,
    /// Colour is wanted; the caller still checks that stdout is a terminal.
    pub color: bool,
    pub sample_limit: usize,
}

impl Settings {
    /// Resolve settings from flags and an environment lookup.
    ///
    /// The config file comes from `--config`, else `CITECHECK_CONFIG`; a
    /// named file that cannot be read or parsed is an error.
    pub fn resolve<F>(mut cli: CliOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = cli
            .config
            .take()
            .or_else(|| env("CITECHECK_CONFIG").filter(|v| !v.is_empty()).map(PathBuf::from));
        let file = match &config_path {
            Some(path) => {
                log::info!("loading config from {}", path.display());
                load_config(path)?
            }
            None => FileConfig::default(),
        };
        Ok(Self::merge(cli, file, env))
    }

    fn merge<F>(cli: CliOverrides, file: FileConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut core = citecheck_core::Config::default();
        core.add_headings(file.extra_headings.unwrap_or_default());
        if let Some(list) = env("CITECHECK_HEADINGS") {
            core.add_headings(list.split(','));
        }
        core.add_headings(cli.headings);
        core.scan_reference_section =
            cli.scan_reference_section || file.scan_reference_section.unwrap_or(false);

        // https://no-color.org: any non-empty value disables colour.
        let no_color_env = env("NO_COLOR").is_some_and(|v| !v.is_empty());

        Self {
            core,
            verbose: cli.verbose || file.verbose.unwrap_or(false),
            color: !cli.no_color && !no_color_env,
            sample_limit: file.sample_limit.unwrap_or(DEFAULT_SAMPLE_LIMIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(CliOverrides::default(), env_of(&[])).unwrap();
        assert_eq!(settings.core, citecheck_core::Config::default());
        assert!(!settings.verbose);
        assert!(settings.color);
        assert_eq!(settings.sample_limit, DEFAULT_SAMPLE_LIMIT);
    }

    #[test]
    fn test_file_values() {
        let file = write_config(
            "extra_headings = [\"Quellen\"]\nscan_reference_section = true\nverbose = true\nsample_limit = 2\n",
        );
        let cli = CliOverrides {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let settings = Settings::resolve(cli, env_of(&[])).unwrap();
        assert!(settings.core.reference_headings.contains(&"Quellen".to_string()));
        assert!(settings.core.scan_reference_section);
        assert!(settings.verbose);
        assert_eq!(settings.sample_limit, 2);
    }

    #[test]
    fn test_cli_flags_win_over_file() {
        let file = write_config("verbose = false\nscan_reference_section = false\nsample_limit = 3\n");
        let cli = CliOverrides {
            config: Some(file.path().to_path_buf()),
            verbose: true,
            scan_reference_section: true,
            no_color: true,
            ..Default::default()
        };
        let settings = Settings::resolve(cli, env_of(&[])).unwrap();
        assert!(settings.verbose);
        assert!(settings.core.scan_reference_section);
        assert!(!settings.color);
        assert_eq!(settings.sample_limit, 3);
    }

    #[test]
    fn test_config_path_from_env() {
        let file = write_config("sample_limit = 9\n");
        let path = file.path().to_string_lossy().to_string();
        let settings =
            Settings::resolve(CliOverrides::default(), env_of(&[("CITECHECK_CONFIG", path.as_str())]))
                .unwrap();
        assert_eq!(settings.sample_limit, 9);
    }

    #[test]
    fn test_headings_from_every_layer() {
        let file = write_config("extra_headings = [\"Quellen\"]\n");
        let cli = CliOverrides {
            config: Some(file.path().to_path_buf()),
            headings: vec!["Sources".to_string(), "references".to_string()],
            ..Default::default()
        };
        let env = env_of(&[("CITECHECK_HEADINGS", "Literatur, Cited Works")]);
        let settings = Settings::resolve(cli, env).unwrap();
        let headings = &settings.core.reference_headings;
        assert_eq!(
            &headings[5..],
            &["Quellen", "Literatur", "Cited Works", "Sources"]
        );
    }

    #[test]
    fn test_colour_switches() {
        let cli = CliOverrides {
            no_color: true,
            ..Default::default()
        };
        assert!(!Settings::resolve(cli, env_of(&[])).unwrap().color);
        let settings =
            Settings::resolve(CliOverrides::default(), env_of(&[("NO_COLOR", "1")])).unwrap();
        assert!(!settings.color);
        let settings =
            Settings::resolve(CliOverrides::default(), env_of(&[("NO_COLOR", "")])).unwrap();
        assert!(settings.color);
    }

    #[test]
    fn test_bad_config_is_an_error() {
        let file = write_config("unknown_key = 1\n");
        let cli = CliOverrides {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(Settings::resolve(cli, env_of(&[])).is_err());

        let cli = CliOverrides {
            config: Some(PathBuf::from("/nonexistent/citecheck.toml")),
            ..Default::default()
        };
        let err = Settings::resolve(cli, env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
