use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config as HierarchicalConfig, Environment};
use pokedex_sdk::pokedex_catalog::{CatalogClientConfig, DEFAULT_CATALOG_URL};
use pokedex_sdk::providers::detail_cache::DETAIL_CACHE_FILE_NAME;
use serde::{Deserialize, Serialize};
use tracing::debug;
use xdg::BaseDirectories;

/// Name of pokedex managed directories (config, cache)
const POKEDEX_DIR_NAME: &str = "pokedex";
const POKEDEX_CONFIG_DIR_VAR: &str = "POKEDEX_CONFIG_DIR";
const POKEDEX_ENV_PREFIX: &str = "POKEDEX_";
pub const POKEDEX_CONFIG_FILE: &str = "pokedex.toml";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// The URL of the catalog API to browse
    // Using a URL here adds an extra trailing slash,
    // so just use a String.
    pub catalog_url: Option<String>,
    /// Directory where pokedex stores the detail cache (default:
    /// `$XDG_CACHE_HOME/pokedex`)
    pub cache_dir: PathBuf,
    /// Directory where pokedex loads its configuration file from (default:
    /// `$XDG_CONFIG_HOME/pokedex`)
    pub config_dir: PathBuf,
    /// User agent sent with every catalog request
    pub user_agent: Option<String>,
}

impl Config {
    /// Creates a [Config] from the environment and config files
    pub fn parse() -> Result<Config> {
        let final_config = read_raw_config()?;
        let config: Config = final_config
            .try_deserialize()
            .context("Could not parse config")?;
        debug!(?config, "parsed config");
        Ok(config)
    }

    /// Location of the durable detail cache snapshot.
    pub fn detail_cache_path(&self) -> PathBuf {
        self.cache_dir.join(DETAIL_CACHE_FILE_NAME)
    }

    pub fn catalog_client_config(&self) -> CatalogClientConfig {
        CatalogClientConfig {
            catalog_url: self
                .catalog_url
                .clone()
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            user_agent: self.user_agent.clone(),
            ..Default::default()
        }
    }
}

fn read_raw_config() -> Result<HierarchicalConfig> {
    let pokedex_dirs = BaseDirectories::with_prefix(POKEDEX_DIR_NAME);

    let cache_dir = pokedex_dirs
        .get_cache_home()
        .context("Could not determine cache directory, is $HOME set?")?;

    let config_dir = match env::var(POKEDEX_CONFIG_DIR_VAR) {
        Ok(v) => {
            debug!("`${POKEDEX_CONFIG_DIR_VAR}` set: {v}");
            PathBuf::from(v)
        },
        Err(_) => {
            let config_dir = pokedex_dirs
                .get_config_home()
                .context("Could not determine config directory, is $HOME set?")?;
            debug!("`${POKEDEX_CONFIG_DIR_VAR}` not set, using {config_dir:?}");
            config_dir
        },
    };

    let mut builder = HierarchicalConfig::builder()
        .set_default("cache_dir", path_str(&cache_dir)?)?
        // Config dir is added to the config for completeness;
        // the config file cannot change the config dir.
        .set_override("config_dir", path_str(&config_dir)?)?;

    // read from /etc
    builder = builder.add_source(
        config::File::from(PathBuf::from("/etc").join(POKEDEX_CONFIG_FILE))
            .format(config::FileFormat::Toml)
            .required(false),
    );

    // look for files in XDG_CONFIG_DIRS locations
    for file in pokedex_dirs.find_config_files(POKEDEX_CONFIG_FILE) {
        builder = builder.add_source(config::File::from(file).format(config::FileFormat::Toml));
    }

    // Add explicit POKEDEX_CONFIG_DIR file last
    builder = builder.add_source(
        config::File::from(config_dir.join(POKEDEX_CONFIG_FILE))
            .format(config::FileFormat::Toml)
            .required(false),
    );

    // override via env variables
    let pokedex_envs = env::vars()
        .filter_map(|(k, v)| {
            k.strip_prefix(POKEDEX_ENV_PREFIX)
                .map(|k| (k.to_lowercase(), v))
        })
        .collect::<HashMap<_, _>>();

    let final_config = builder
        .add_source(Environment::default().source(Some(pokedex_envs)))
        .build()?;
    Ok(final_config)
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("Path is not valid unicode: {path:?}"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    /// Run `f` with an isolated set of XDG and pokedex variables.
    fn with_isolated_env<T>(
        dir: &TempDir,
        extra: &[(&str, Option<&str>)],
        f: impl FnOnce() -> T,
    ) -> T {
        let home = dir.path().join("home");
        let config_home = dir.path().join("config");
        let cache_home = dir.path().join("cache");
        let mut vars = vec![
            ("HOME", Some(path_str(&home).unwrap().to_string())),
            (
                "XDG_CONFIG_HOME",
                Some(path_str(&config_home).unwrap().to_string()),
            ),
            (
                "XDG_CACHE_HOME",
                Some(path_str(&cache_home).unwrap().to_string()),
            ),
            ("XDG_CONFIG_DIRS", Some(path_str(dir.path()).unwrap().to_string())),
            (POKEDEX_CONFIG_DIR_VAR, None),
            ("POKEDEX_CATALOG_URL", None),
            ("POKEDEX_USER_AGENT", None),
            ("POKEDEX_CACHE_DIR", None),
        ];
        for &(key, value) in extra {
            vars.retain(|(k, _)| *k != key);
            vars.push((key, value.map(str::to_string)));
        }
        temp_env::with_vars(vars, f)
    }

    #[test]
    #[serial]
    fn defaults_follow_xdg_directories() {
        let dir = TempDir::new().unwrap();
        let config = with_isolated_env(&dir, &[], Config::parse).unwrap();

        assert_eq!(config.cache_dir, dir.path().join("cache").join("pokedex"));
        assert_eq!(config.config_dir, dir.path().join("config").join("pokedex"));
        assert_eq!(config.catalog_url, None);
        assert_eq!(
            config.detail_cache_path(),
            dir.path()
                .join("cache")
                .join("pokedex")
                .join(DETAIL_CACHE_FILE_NAME)
        );
        assert_eq!(
            config.catalog_client_config().catalog_url,
            DEFAULT_CATALOG_URL
        );
    }

    #[test]
    #[serial]
    fn config_file_in_config_dir_is_read() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join("explicit");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join(POKEDEX_CONFIG_FILE),
            indoc! {r#"
                catalog_url = "http://localhost:8080/api"
                user_agent = "pokedex-test"
                cache_dir = "/tmp/pokedex-cache"
            "#},
        )
        .unwrap();

        let config = with_isolated_env(
            &dir,
            &[(POKEDEX_CONFIG_DIR_VAR, Some(path_str(&config_dir).unwrap()))],
            Config::parse,
        )
        .unwrap();

        assert_eq!(config.config_dir, config_dir);
        assert_eq!(config.catalog_url.as_deref(), Some("http://localhost:8080/api"));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/pokedex-cache"));
        let client_config = config.catalog_client_config();
        assert_eq!(client_config.user_agent.as_deref(), Some("pokedex-test"));
    }

    #[test]
    #[serial]
    fn environment_overrides_config_file() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join("explicit");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join(POKEDEX_CONFIG_FILE),
            "catalog_url = \"http://from-file\"\n",
        )
        .unwrap();

        let config = with_isolated_env(
            &dir,
            &[
                (POKEDEX_CONFIG_DIR_VAR, Some(path_str(&config_dir).unwrap())),
                ("POKEDEX_CATALOG_URL", Some("http://from-env")),
            ],
            Config::parse,
        )
        .unwrap();

        assert_eq!(config.catalog_url.as_deref(), Some("http://from-env"));
    }

    #[test]
    #[serial]
    fn config_file_cannot_move_config_dir() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join("explicit");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join(POKEDEX_CONFIG_FILE),
            "config_dir = \"/somewhere/else\"\n",
        )
        .unwrap();

        let config = with_isolated_env(
            &dir,
            &[(POKEDEX_CONFIG_DIR_VAR, Some(path_str(&config_dir).unwrap()))],
            Config::parse,
        )
        .unwrap();

        assert_eq!(config.config_dir, config_dir);
    }
}
