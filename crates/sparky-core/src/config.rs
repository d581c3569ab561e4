use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sparky_provider::OPENAI_API_BASE;

use crate::painstorming::{AdHocSegmentPolicy, ReconcilePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    /// Assumed when the config does not name an environment.
    #[default]
    Production,
}

impl Environment {
    /// The deterministic mock transport is never available in production.
    pub fn allows_mock(self) -> bool {
        !matches!(self, Self::Production)
    }
}

fn default_app_name() -> String {
    "sparky".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub environment: Environment,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: Environment::default(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    /// Brainstorming fresh suggestions.
    pub suggestion: f32,
    /// Refining what the user already wrote.
    pub refine: f32,
    pub chat: f32,
    /// JSON-only extraction calls.
    pub structured: f32,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            suggestion: 0.8,
            refine: 0.5,
            chat: 0.7,
            structured: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Used for step suggestions when set; chat and extraction stay on the default model.
    #[serde(default)]
    pub fine_tuned_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperatures: TemperatureConfig,
}

impl ModelConfig {
    pub fn suggestion_model(&self) -> &str {
        self.fine_tuned_model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            fine_tuned_model: None,
            max_tokens: default_max_tokens(),
            temperatures: TemperatureConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_proxy_url() -> String {
    "http://localhost:8888/.netlify/functions/openai".to_string()
}

fn default_direct_base_url() -> String {
    OPENAI_API_BASE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyTransportConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_proxy_url")]
    pub url: String,
}

impl Default for ProxyTransportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_proxy_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectTransportConfig {
    #[serde(default = "default_direct_base_url")]
    pub base_url: String,
    /// Empty means the direct transport is not registered.
    #[serde(default)]
    pub api_key: String,
}

impl Default for DirectTransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_direct_base_url(),
            api_key: String::new(),
        }
    }
}

/// Opt-in only; still ignored outside development and test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockTransportConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportsConfig {
    #[serde(default)]
    pub proxy: ProxyTransportConfig,
    #[serde(default)]
    pub direct: DirectTransportConfig,
    #[serde(default)]
    pub mock: MockTransportConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    #[default]
    Model,
    Heuristic,
}

fn default_similarity_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PainstormingConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub ad_hoc_segments: AdHocSegmentPolicy,
    #[serde(default)]
    pub extractor: ExtractorKind,
}

impl PainstormingConfig {
    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        ReconcilePolicy {
            similarity_threshold: self.similarity_threshold,
            ad_hoc: self.ad_hoc_segments,
        }
    }
}

impl Default for PainstormingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            ad_hoc_segments: AdHocSegmentPolicy::default(),
            extractor: ExtractorKind::default(),
        }
    }
}

fn default_history_window() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Most recent messages of the current step included in chat prompts.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkshopConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub transports: TransportsConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub painstorming: PainstormingConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl WorkshopConfig {
    pub fn environment(&self) -> Environment {
        self.app.environment
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

pub fn load_config(path: &Path) -> Result<WorkshopConfig> {
    let mut config: WorkshopConfig = read_yaml_file(path)?;
    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &WorkshopConfig) -> Result<()> {
    let painstorming = &config.painstorming;
    if !(0.0..=1.0).contains(&painstorming.similarity_threshold) {
        return Err(anyhow!(
            "painstorming.similarity_threshold must be within [0, 1]: {}",
            painstorming.similarity_threshold
        ));
    }

    if config.model.default_model.trim().is_empty() {
        return Err(anyhow!("model.default_model must not be empty"));
    }
    if config.model.max_tokens == 0 {
        return Err(anyhow!("model.max_tokens must be positive"));
    }

    let t = &config.model.temperatures;
    for (name, value) in [
        ("suggestion", t.suggestion),
        ("refine", t.refine),
        ("chat", t.chat),
        ("structured", t.structured),
    ] {
        if !(0.0..=2.0).contains(&value) {
            return Err(anyhow!("model.temperatures.{name} must be within [0, 2]: {value}"));
        }
    }

    let proxy = &config.transports.proxy;
    if proxy.enabled && !is_http_url(&proxy.url) {
        return Err(anyhow!("transports.proxy.url is not an http(s) url: {}", proxy.url));
    }
    let direct = &config.transports.direct;
    if !direct.api_key.is_empty() && !is_http_url(&direct.base_url) {
        return Err(anyhow!(
            "transports.direct.base_url is not an http(s) url: {}",
            direct.base_url
        ));
    }
    if let Some(url) = config.summarizer.url.as_deref() {
        if !url.is_empty() && !is_http_url(url) {
            return Err(anyhow!("summarizer.url is not an http(s) url: {url}"));
        }
    }

    if config.environment() == Environment::Production
        && !proxy.enabled
        && direct.api_key.is_empty()
    {
        return Err(anyhow!(
            "production requires the proxy transport or a direct api_key"
        ));
    }

    if config.session.history_window == 0 {
        return Err(anyhow!("session.history_window must be positive"));
    }

    Ok(())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn resolve_config_env(config: &mut WorkshopConfig) {
    config.app.name = resolve_env_var(&config.app.name);
    config.model.default_model = resolve_env_var(&config.model.default_model);
    config.model.fine_tuned_model = config
        .model
        .fine_tuned_model
        .as_deref()
        .map(resolve_env_var)
        .filter(|m| !m.trim().is_empty());
    config.transports.proxy.url = resolve_env_var(&config.transports.proxy.url);
    config.transports.direct.base_url = resolve_env_var(&config.transports.direct.base_url);
    config.transports.direct.api_key = resolve_env_var(&config.transports.direct.api_key);
    config.summarizer.url = config
        .summarizer
        .url
        .as_deref()
        .map(resolve_env_var)
        .filter(|u| !u.trim().is_empty());
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    fn fixture_config_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/sparky.yaml")
    }

    fn write_yaml(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_config_from_workspace_fixture() {
        let config = load_config(&fixture_config_path()).unwrap();
        assert_eq!(config.app.name, "sparky");
        assert_eq!(config.environment(), Environment::Development);
        assert_eq!(config.painstorming.similarity_threshold, 0.5);
        assert!(config.transports.proxy.enabled);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let file = write_yaml("{}\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.model.default_model, "gpt-4o-mini");
        assert_eq!(config.model.max_tokens, 2000);
        assert_eq!(config.session.history_window, 10);
        assert_eq!(config.painstorming.ad_hoc_segments, AdHocSegmentPolicy::TitleCase);
        assert_eq!(config.painstorming.extractor, ExtractorKind::Model);
        assert!(config.transports.direct.api_key.is_empty());
    }

    #[test]
    fn api_key_and_fine_tuned_model_resolve_from_env() {
        std::env::set_var("SPARKY_TEST_CONFIG_KEY", "sk-from-env");
        let file = write_yaml(
            "transports:\n  direct:\n    api_key: ${SPARKY_TEST_CONFIG_KEY}\nmodel:\n  fine_tuned_model: ${SPARKY_TEST_CONFIG_MISSING}\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.transports.direct.api_key, "sk-from-env");
        assert_eq!(config.model.fine_tuned_model, None);
        assert_eq!(config.model.suggestion_model(), "gpt-4o-mini");
    }

    #[test]
    fn fine_tuned_model_is_used_for_suggestions() {
        let mut config = WorkshopConfig::default();
        config.model.fine_tuned_model = Some("ft:gpt-4o-mini:sparky".into());
        assert_eq!(config.model.suggestion_model(), "ft:gpt-4o-mini:sparky");
    }

    #[test]
    fn ad_hoc_policy_parses_snake_case() {
        let file =
            write_yaml("painstorming:\n  ad_hoc_segments: discard\n  extractor: heuristic\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.painstorming.ad_hoc_segments, AdHocSegmentPolicy::Discard);
        assert_eq!(config.painstorming.extractor, ExtractorKind::Heuristic);
    }

    #[test]
    fn invalid_yaml_reports_path() {
        let file = write_yaml("app: [unclosed\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse yaml file"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/definitely/not/here/sparky.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn validate_config_rejects_out_of_range_threshold() {
        let mut config = WorkshopConfig::default();
        config.painstorming.similarity_threshold = 1.5;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("similarity_threshold"));
    }

    #[test]
    fn validate_config_rejects_production_without_transport() {
        let mut config = WorkshopConfig::default();
        config.app.environment = Environment::Production;
        config.transports.proxy.enabled = false;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("production"));

        config.transports.direct.api_key = "sk-live".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn validate_config_rejects_bad_urls() {
        let mut config = WorkshopConfig::default();
        config.transports.proxy.url = "localhost:8888".into();
        assert!(validate_config(&config).is_err());

        let mut config = WorkshopConfig::default();
        config.summarizer.url = Some("ftp://example.com".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn validate_config_rejects_hot_temperature() {
        let mut config = WorkshopConfig::default();
        config.model.temperatures.chat = 3.0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("temperatures.chat"));
    }

    #[test]
    fn unset_environment_and_mock_are_closed_by_default() {
        let file = write_yaml("transports:\n  proxy:\n    enabled: true\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.environment(), Environment::Production);
        assert!(!config.transports.mock.enabled);
        assert!(!WorkshopConfig::default().transports.mock.enabled);
    }

    #[test]
    fn mock_is_not_allowed_in_production() {
        assert!(Environment::Development.allows_mock());
        assert!(Environment::Test.allows_mock());
        assert!(!Environment::Production.allows_mock());
    }

    #[test]
    fn resolve_env_var_replaces_placeholders() {
        std::env::set_var("SPARKY_TEST_RESOLVE", "value");
        assert_eq!(resolve_env_var("a=${SPARKY_TEST_RESOLVE}!"), "a=value!");
        assert_eq!(resolve_env_var("plain"), "plain");
        assert_eq!(resolve_env_var("prefix_${UNCLOSED"), "prefix_${UNCLOSED");
        assert_eq!(resolve_env_var("v=${SPARKY_NONEXISTENT_VAR_XYZ}"), "v=");
        assert_eq!(resolve_env_var(""), "");
    }
}
