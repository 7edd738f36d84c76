//! Configuration parsing and validation for coinscout.
//!
//! Configuration comes from a TOML file when one exists, otherwise from the
//! environment alone. Provider API keys may be written literally, as `${VAR}`
//! references, or left out entirely, in which case a well-known environment
//! variable for that provider is consulted.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides the listen port.
pub const PORT_ENV_VAR: &str = "PORT";

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:10000")
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "0.0.0.0:10000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Limits applied to every outbound call.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Upper bound on a whole upstream call (connect, send, read body)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// The raw value is only reachable through `.expose_secret()`, so every place
/// a key leaves the process can be found with `grep expose_secret`.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// The three classes of upstream service coinscout talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// OpenAI-style chat-completion gateway (Together AI by default)
    Chat,
    /// Google Gemini generateContent API
    Gemini,
    /// CoinGecko simple price API
    Prices,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Chat, ProviderKind::Gemini, ProviderKind::Prices];

    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Chat => "chat",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Prices => "prices",
        }
    }

    /// Environment variables consulted, in order, when no `api_key` is configured.
    pub fn convention_env_vars(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Chat => &["TOGETHER_API_KEY"],
            ProviderKind::Gemini => &["GEMINI_API_KEY", "AISTUDIO_API_KEY"],
            ProviderKind::Prices => &["COINGECKO_API_KEY"],
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            ProviderKind::Chat => "https://api.together.xyz/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Prices => "https://api.coingecko.com/api/v3",
        }
    }

    pub fn default_model(self) -> Option<&'static str> {
        match self {
            ProviderKind::Chat => Some("meta-llama/Llama-3.3-70B-Instruct-Turbo-Free"),
            ProviderKind::Gemini => Some("gemini-1.5-flash"),
            ProviderKind::Prices => None,
        }
    }

    pub fn is_llm(self) -> bool {
        !matches!(self, ProviderKind::Prices)
    }

    /// The price API is public; both LLM providers reject unauthenticated calls.
    pub fn requires_key(self) -> bool {
        self.is_llm()
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

/// How a provider's API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was auto-discovered from a convention env var (holds var name)
    Convention(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// A resolved upstream provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Base URL, without the endpoint path
    pub url: String,
    /// Model name sent upstream (LLM providers only)
    pub model: Option<String>,
    pub api_key: Option<ApiKey>,
}

impl ProviderConfig {
    /// Provider with default URL and model for its kind.
    pub fn with_defaults(kind: ProviderKind, api_key: Option<ApiKey>) -> Self {
        Self {
            kind,
            url: kind.default_url().to_string(),
            model: kind.default_model().map(str::to_string),
            api_key,
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or_default()
    }
}

/// The configured upstreams. A missing entry means that provider is not used.
#[derive(Debug, Clone, Default)]
pub struct ProvidersConfig {
    pub chat: Option<ProviderConfig>,
    pub gemini: Option<ProviderConfig>,
    pub prices: Option<ProviderConfig>,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        match kind {
            ProviderKind::Chat => self.chat.as_ref(),
            ProviderKind::Gemini => self.gemini.as_ref(),
            ProviderKind::Prices => self.prices.as_ref(),
        }
    }

    /// Configured providers in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        ProviderKind::ALL.into_iter().filter_map(|kind| self.get(kind))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for provider '{provider}': {message}")]
    EnvVar {
        var: String,
        provider: String,
        message: String,
    },

    #[error("Provider '{provider}' requires an API key: set api_key in config or one of {vars}")]
    MissingKey { provider: String, vars: String },
}

/// Provider section as written in TOML; `api_key` may still hold `${VAR}` references.
#[derive(Debug, Default, Deserialize)]
pub struct RawProviderConfig {
    pub url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawProvidersConfig {
    pub chat: Option<RawProviderConfig>,
    pub gemini: Option<RawProviderConfig>,
    pub prices: Option<RawProviderConfig>,
}

/// Configuration as deserialized from TOML, before key resolution.
#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub providers: RawProvidersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-provider key resolution report, in `ProviderKind::ALL` order.
pub type KeySources = Vec<(ProviderKind, KeySource)>;

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple references in one string (e.g., `${SCHEME}://${HOST}/v1`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(
    input: &str,
    provider_name: &str,
    lookup: &F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            provider: provider_name.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: String::new(),
                provider: provider_name.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            provider: provider_name.to_string(),
            message: format!("'{}' is referenced but not set", var_name),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// First convention variable for `kind` that is set and non-empty.
fn convention_key_lookup<F>(kind: ProviderKind, lookup: &F) -> Option<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    kind.convention_env_vars().iter().find_map(|var| {
        lookup(var)
            .filter(|value| !value.trim().is_empty())
            .map(|value| (var.to_string(), value))
    })
}

fn resolve_provider<F>(
    kind: ProviderKind,
    raw: RawProviderConfig,
    lookup: &F,
) -> Result<(ProviderConfig, KeySource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (api_key, source) = match raw.api_key {
        Some(ref raw_key) if raw_key.contains("${") => {
            let expanded = expand_env_vars_with(raw_key, kind.name(), lookup)?;
            (Some(ApiKey::from(expanded)), KeySource::EnvExpanded)
        }
        Some(ref raw_key) => (Some(ApiKey::from(raw_key.as_str())), KeySource::Literal),
        None => match convention_key_lookup(kind, lookup) {
            Some((var_name, value)) => (Some(ApiKey::from(value)), KeySource::Convention(var_name)),
            None => (None, KeySource::None),
        },
    };

    // A blank key counts as no key at all.
    let (api_key, source) = match api_key {
        Some(key) if key.expose_secret().trim().is_empty() => (None, KeySource::None),
        key => (key, source),
    };

    let url = match raw.url {
        Some(url) => expand_env_vars_with(&url, kind.name(), lookup)?,
        None => kind.default_url().to_string(),
    };

    let provider = ProviderConfig {
        kind,
        url,
        model: raw.model.or_else(|| kind.default_model().map(str::to_string)),
        api_key,
    };

    Ok((provider, source))
}

/// Replace the port of a `host:port` listen address.
fn override_port(listen: &str, port: &str) -> Result<String, ConfigError> {
    let port: u16 = port.trim().parse().map_err(|_| {
        ConfigError::Validation(format!("{} must be a port number, got '{}'", PORT_ENV_VAR, port))
    })?;

    Ok(match listen.rsplit_once(':') {
        Some((host, _)) => format!("{}:{}", host, port),
        None => format!("{}:{}", listen, port),
    })
}

impl Config {
    /// Convert raw (deserialized) config to final config, resolving keys via `lookup`.
    ///
    /// For each configured provider:
    /// - `api_key` containing `${VAR}`: expanded, source = `EnvExpanded`
    /// - literal `api_key`: wrapped directly, source = `Literal`
    /// - no `api_key`: first set convention variable, source = `Convention(var)`
    ///   or `KeySource::None`
    pub fn from_raw_with<F>(raw: RawConfig, lookup: F) -> Result<(Self, KeySources), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut providers = ProvidersConfig::default();
        let mut key_sources = Vec::new();

        let RawProvidersConfig {
            chat,
            gemini,
            prices,
        } = raw.providers;

        for (kind, section) in [
            (ProviderKind::Chat, chat),
            (ProviderKind::Gemini, gemini),
            (ProviderKind::Prices, prices),
        ] {
            let Some(section) = section else { continue };
            let (provider, source) = resolve_provider(kind, section, &lookup)?;
            key_sources.push((kind, source));
            match kind {
                ProviderKind::Chat => providers.chat = Some(provider),
                ProviderKind::Gemini => providers.gemini = Some(provider),
                ProviderKind::Prices => providers.prices = Some(provider),
            }
        }

        let config = Config {
            server: raw.server,
            upstream: raw.upstream,
            providers,
            logging: raw.logging,
        };
        config.validate()?;

        Ok((config, key_sources))
    }

    /// Parse configuration from a TOML string, resolving keys via `lookup`.
    pub fn parse_str_with<F>(content: &str, lookup: F) -> Result<(Self, KeySources), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        Self::from_raw_with(raw, lookup)
    }

    /// Build configuration without a file.
    ///
    /// The chat and Gemini providers are enabled when one of their key
    /// variables is set; the price API is always enabled.
    pub fn from_env_with<F>(lookup: F) -> Result<(Self, KeySources), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = |kind: ProviderKind| {
            (!kind.requires_key() || convention_key_lookup(kind, &lookup).is_some())
                .then(RawProviderConfig::default)
        };

        let raw = RawConfig {
            providers: RawProvidersConfig {
                chat: enabled(ProviderKind::Chat),
                gemini: enabled(ProviderKind::Gemini),
                prices: enabled(ProviderKind::Prices),
            },
            ..RawConfig::default()
        };

        Self::from_raw_with(raw, &lookup)
    }

    /// Load configuration from a TOML file, resolving keys via `lookup`.
    pub fn from_file_with<F>(path: &Path, lookup: F) -> Result<(Self, KeySources), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        tracing::debug!(path = %path.display(), "Reading configuration file");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::parse_str_with(&content, lookup)
    }

    /// Load from `path` if it exists, from the environment otherwise, then
    /// apply the `PORT` override.
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<(Self, KeySources), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let (mut config, key_sources) = if path.exists() {
            Self::from_file_with(path, &lookup)?
        } else {
            tracing::debug!(path = %path.display(), "No configuration file, using environment");
            Self::from_env_with(&lookup)?
        };

        if let Some(port) = lookup(PORT_ENV_VAR).filter(|port| !port.trim().is_empty()) {
            config.server.listen = override_port(&config.server.listen, &port)?;
        }

        Ok((config, key_sources))
    }

    /// `load_with` against the process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, KeySources), ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream.timeout_secs must be greater than zero".to_string(),
            ));
        }

        for provider in self.providers.iter() {
            if provider.url.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has empty URL",
                    provider.kind
                )));
            }
            if provider.kind.is_llm() && provider.model().trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has empty model",
                    provider.kind
                )));
            }
            if provider.kind.requires_key() && provider.api_key.is_none() {
                return Err(ConfigError::MissingKey {
                    provider: provider.kind.to_string(),
                    vars: provider.kind.convention_env_vars().join(", "),
                });
            }
        }

        if self.providers.chat.is_none() && self.providers.gemini.is_none() {
            return Err(ConfigError::Validation(
                "No LLM provider configured: set GEMINI_API_KEY, AISTUDIO_API_KEY or \
                 TOGETHER_API_KEY, or add a [providers.chat] or [providers.gemini] section"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
