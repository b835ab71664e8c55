use crate::llm::{DEFAULT_TEMPERATURE, LlmSettings, Provider};
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when none is given.
const CWD_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "ADVISOR_HOST")]
    pub host: Option<String>,

    /// Path to the instruction document
    #[arg(long, env = "INSTRUCTIONS_PATH")]
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub advisor: AdvisorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub temperature: f64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    /// Azure deployment; defaults to the model name.
    #[serde(default)]
    pub azure_deployment: Option<String>,
    #[serde(default)]
    pub azure_api_version: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("azure_deployment", &self.azure_deployment)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdvisorConfig {
    pub instructions_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `pretty` or `json`.
    pub format: String,
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("llm.base_url", "https://openrouter.ai/api/v1")?
            .set_default("llm.temperature", DEFAULT_TEMPERATURE)?
            .set_default("advisor.instructions_path", "Instruction.txt")?
            .set_default("logging.format", "pretty")?
            .set_default("logging.filter", "info")?;

        // 2. Config file: explicit path, else ./config.yaml if present
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        } else if Path::new(CWD_CONFIG_FILE).exists() {
            builder = builder.add_source(File::with_name(CWD_CONFIG_FILE));
        }

        // 3. Prefixed environment, e.g. ADVISOR_SERVER__PORT=9000
        builder = builder.add_source(
            Environment::with_prefix("ADVISOR")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );

        // 4. Legacy OpenRouter variables
        if let Ok(val) = env::var("OPEN_ROUTER_MODEL")
            && !val.trim().is_empty()
        {
            builder = builder.set_override("llm.model", val)?;
        }
        if let Ok(val) = env::var("OPEN_ROUTER_API_KEY")
            && !val.trim().is_empty()
        {
            builder = builder.set_override("llm.api_key", val)?;
        }

        // 5. CLI flags (clap already folded in their env fallbacks)
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(path) = cli.instructions {
            builder = builder.set_override("advisor.instructions_path", path)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "llm.model is required (set OPEN_ROUTER_MODEL or ADVISOR_LLM__MODEL)".to_string(),
            ));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "llm.base_url cannot be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(config::ConfigError::Message(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }

    /// Completion client settings derived from the `llm` section.
    #[must_use]
    pub fn llm_settings(&self) -> LlmSettings {
        let llm = &self.llm;

        let mut provider = Provider::detect_from_url(&llm.base_url);
        if let Provider::AzureOpenAI {
            deployment_name,
            api_version,
        } = &mut provider
        {
            if let Some(deployment) = &llm.azure_deployment {
                deployment_name.clone_from(deployment);
            }
            if let Some(version) = &llm.azure_api_version {
                api_version.clone_from(version);
            }
        }

        LlmSettings {
            base_url: llm.base_url.clone(),
            api_key: llm.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: llm.model.clone(),
            temperature: llm.temperature,
            provider,
            timeout: llm.timeout_secs.map(Duration::from_secs),
            site_url: llm.site_url.clone(),
            app_name: llm.app_name.clone(),
        }
    }

    /// Address the server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
