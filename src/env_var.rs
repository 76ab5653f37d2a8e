use std::sync::OnceLock;

use serde::Deserialize;

fn default_priority() -> i32 {
    1
}

fn default_cpus_per_rank() -> usize {
    1
}

fn default_show_help() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// The layout string, e.g. `MPI[core][0,1,2,3]`. Required by the mapper.
    pub layout: Option<String>,

    /// Selection priority of the explicit mapper among all mappers, default: 1
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Number of PUs every rank needs in the spread policy, default: 1
    #[serde(default = "default_cpus_per_rank")]
    pub cpus_per_rank: usize,

    /// Print user facing diagnostics to stderr, default: true
    #[serde(default = "default_show_help")]
    pub show_help: bool,

    /// Synthetic topology used by the command line tool for every node,
    /// e.g. `package:2 core:4 pu:2`. The host topology is used when unset.
    pub topology: Option<String>,
}

impl Config {
    /// Read the `RMAPS_EXPLICIT_*` environment variables.
    pub fn from_env() -> Result<Config, envy::Error> {
        Config::from_vars(std::env::vars())
    }

    /// Build a config from `(name, value)` pairs, keeping the `RMAPS_EXPLICIT_` ones.
    pub fn from_vars<I>(vars: I) -> Result<Config, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("RMAPS_EXPLICIT_").from_iter::<_, Config>(vars)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            layout: None,
            priority: default_priority(),
            cpus_per_rank: default_cpus_per_rank(),
            show_help: default_show_help(),
            topology: None,
        }
    }
}

/// Get the current Environment Variable configuration
pub fn config() -> &'static Config {
    static CONFIG: OnceLock<Config> = OnceLock::new();
    CONFIG.get_or_init(|| match Config::from_env() {
        Ok(config) => config,
        Err(error) => panic!("{}", error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        assert_eq!(Config::from_vars(vars(&[])).unwrap(), Config::default());
        let unrelated = vars(&[("LAYOUT", "MPI[core][0]"), ("RMAPS_PRIORITY", "5")]);
        assert_eq!(Config::from_vars(unrelated).unwrap(), Config::default());
    }

    #[test]
    fn prefixed_vars() {
        let config = Config::from_vars(vars(&[
            ("RMAPS_EXPLICIT_LAYOUT", "MPI[core][0,1]"),
            ("RMAPS_EXPLICIT_PRIORITY", "20"),
            ("RMAPS_EXPLICIT_SHOW_HELP", "false"),
        ]))
        .unwrap();
        assert_eq!(config.layout.as_deref(), Some("MPI[core][0,1]"));
        assert_eq!(config.priority, 20);
        assert_eq!(config.cpus_per_rank, 1);
        assert!(!config.show_help);
    }

    #[test]
    fn invalid_value() {
        let result = Config::from_vars(vars(&[("RMAPS_EXPLICIT_CPUS_PER_RANK", "many")]));
        assert!(result.is_err());
    }
}
