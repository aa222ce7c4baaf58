use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use crate::error::MetricsError;
use crate::utils::NumberFormatOptions;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub github: GithubConfig,
    pub aggregation: AggregationConfig,
    pub server: ServerConfig,
    pub formatting: FormattingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GithubConfig {
    pub api_url: String,
    pub token: String,
    /// `owner/name`
    pub repo: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AggregationConfig {
    pub max_concurrent_branches: usize,
    pub output_dir: PathBuf,
    /// Window used by a refresh request that names no dates.
    pub default_days: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origin: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FormattingConfig {
    pub number_comma: bool,
    pub number_human: bool,
    pub locale: String,
    pub decimal_places: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github: GithubConfig {
                api_url: "https://api.github.com".to_string(),
                token: "".to_string(),
                repo: "".to_string(),
                timeout_seconds: 30,
            },
            aggregation: AggregationConfig {
                max_concurrent_branches: 8,
                output_dir: PathBuf::from("metrics_output"),
                default_days: 220,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5001,
                allowed_origin: "http://localhost:3000".to_string(),
            },
            formatting: FormattingConfig {
                number_comma: false,
                number_human: false,
                locale: "en".to_string(),
                decimal_places: 2,
            },
        }
    }
}

thread_local! {
    static TEST_CONFIG_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".repopulse.toml"))
    }

    pub fn load() -> Result<Option<Config>> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(Some(config))
    }

    /// The config file (or defaults) with `GITHUB_TOKEN` / `GITHUB_REPO` applied on top.
    pub fn load_effective() -> Result<Config> {
        let mut config = Self::load()?.unwrap_or_default();
        config.apply_env(
            std::env::var("GITHUB_TOKEN").ok(),
            std::env::var("GITHUB_REPO").ok(),
        );
        Ok(config)
    }

    pub fn apply_env(&mut self, token: Option<String>, repo: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.github.token = token;
        }
        if let Some(repo) = repo.filter(|r| !r.is_empty()) {
            self.github.repo = repo;
        }
    }

    pub fn save(&self, silent: bool) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        if !silent {
            println!("✅ Configuration saved to: {}", config_path.display());
        }

        Ok(())
    }

    /// Fail before any fetching if the run could not possibly succeed.
    pub fn require_credentials(&self) -> Result<(), MetricsError> {
        if self.github.token.is_empty() {
            return Err(MetricsError::MissingToken);
        }
        let valid_repo = self
            .github
            .repo
            .split_once('/')
            .is_some_and(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'));
        if !valid_repo {
            return Err(MetricsError::InvalidRepository(format!(
                "{:?} is not in owner/repo form",
                self.github.repo
            )));
        }
        Ok(())
    }

    pub fn number_format(&self) -> NumberFormatOptions {
        NumberFormatOptions {
            use_comma: self.formatting.number_comma,
            use_human: self.formatting.number_human,
            locale: self.formatting.locale.clone(),
            decimal_places: self.formatting.decimal_places,
        }
    }
}

// CLI helper functions
pub fn create_default_config(overwrite: bool) -> Result<()> {
    let config = Config::default();
    if !std::fs::exists(Config::config_path()?)? || overwrite {
        config.save(true)?;

        println!("📝 Created default configuration file.");
        println!("📍 Add your GitHub token and repository:");
        println!("   repopulse config set token ...");
        println!("   repopulse config set repo owner/name");
        println!("or edit");
        println!("   {}", Config::config_path()?.display());
    } else {
        println!("Configuration already exists.  Pass `--overwrite` to overwrite.");
    }

    Ok(())
}

pub fn show_config() -> Result<()> {
    match Config::load()? {
        Some(config) => {
            println!("🔧 Current configuration:");
            println!("   API URL: {}", config.github.api_url);
            println!(
                "   Token: {}",
                if config.github.token.is_empty() {
                    "Not set"
                } else {
                    "Set"
                }
            );
            println!("   Repository: {}", config.github.repo);
            println!("   Timeout (s): {}", config.github.timeout_seconds);
            println!(
                "   Max Concurrent Branches: {}",
                config.aggregation.max_concurrent_branches
            );
            println!(
                "   Output Directory: {}",
                config.aggregation.output_dir.display()
            );
            println!("   Default Days: {}", config.aggregation.default_days);
            println!(
                "   Server: {}:{} (origin {})",
                config.server.host, config.server.port, config.server.allowed_origin
            );
            println!("   Number Comma: {}", config.formatting.number_comma);
            println!("   Number Human: {}", config.formatting.number_human);
            println!("   Locale: {}", config.formatting.locale);
            println!("   Decimal Places: {}", config.formatting.decimal_places);
        }
        None => {
            println!("❌ No configuration file found.");
            println!("   Run 'repopulse config init' to create one.");
        }
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .context("Invalid boolean value. Use 'true' or 'false'")
}

pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?.unwrap_or_default();

    match key {
        "api-url" => config.github.api_url = value.trim_end_matches('/').to_string(),
        "token" => config.github.token = value.to_string(),
        "repo" => config.github.repo = value.to_string(),
        "timeout-seconds" => {
            config.github.timeout_seconds = value.parse().context("Invalid number value")?;
        }
        "max-concurrent-branches" => {
            let workers: usize = value.parse().context("Invalid number value")?;
            if workers == 0 {
                anyhow::bail!("max-concurrent-branches must be at least 1");
            }
            config.aggregation.max_concurrent_branches = workers;
        }
        "output-dir" => config.aggregation.output_dir = PathBuf::from(value),
        "default-days" => {
            config.aggregation.default_days = value.parse().context("Invalid number value")?;
        }
        "host" => config.server.host = value.to_string(),
        "port" => config.server.port = value.parse().context("Invalid port value")?,
        "allowed-origin" => config.server.allowed_origin = value.to_string(),
        "number-comma" => config.formatting.number_comma = parse_bool(value)?,
        "number-human" => config.formatting.number_human = parse_bool(value)?,
        "locale" => config.formatting.locale = value.to_string(),
        "decimal-places" => {
            config.formatting.decimal_places = value.parse().context("Invalid number value")?;
        }
        _ => anyhow::bail!("Unknown config key: {}", key),
    }

    config.save(false)?;
    Ok(())
}
