//! `inisync.toml` loading and validation.
//!
//! Every section and field is optional; missing values take the defaults
//! below. Command-line flags are applied on top by [`Overrides`].
//!
//! ```toml
//! [remote]
//! base_url = "https://paratranz.cn/api"
//! project_id = 8340
//! token_env = "AUTHORIZATION"
//! concurrency = 8
//!
//! [rules]
//! folder = "override-rules"
//! baseline = "3d-replacement"
//! baseline_policy = "required"
//!
//! [merge]
//! tie_break = "highest-id"
//! text_field = "translation-or-original"
//! # base = "global.ini"
//!
//! [output]
//! dir = "output"
//! file_name = "global.ini"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use inisync::{
    BaselinePolicy, ParatranzClient, PipelineOptions, RuleSelector, TextField, TieBreak,
    pipeline::DEFAULT_CONCURRENCY, remote::DEFAULT_BASE_URL,
};
use serde::Deserialize;

use crate::validation::validate_file_name;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "inisync.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub rules: RulesConfig,
    pub merge: MergeConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub project_id: u64,
    /// Environment variable holding the API token.
    pub token_env: String,
    pub concurrency: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: 8340,
            token_env: "AUTHORIZATION".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RulesConfig {
    pub folder: String,
    pub baseline: String,
    pub baseline_policy: BaselinePolicy,
    pub render_baseline_only: bool,
    pub render_plain: bool,
    pub plain_name: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        let selector = RuleSelector::default();
        RulesConfig {
            folder: selector.folder,
            baseline: selector.baseline,
            baseline_policy: BaselinePolicy::Required,
            render_baseline_only: true,
            render_plain: true,
            plain_name: "plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MergeConfig {
    pub tie_break: TieBreak,
    pub text_field: TextField,
    /// Local `global.ini` whose keys the merged content is restricted to.
    pub base: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub file_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: PathBuf::from("output"),
            file_name: "global.ini".to_string(),
        }
    }
}

/// Reads and validates the configuration at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Loads `path` if given, else `inisync.toml` when present, else defaults.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            load_config(Path::new(DEFAULT_CONFIG_FILE))
        }
        None => Ok(Config::default()),
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.remote.project_id == 0 {
            bail!("remote.project_id must be > 0");
        }
        if self.remote.concurrency == 0 {
            bail!("remote.concurrency must be >= 1");
        }
        if self.remote.base_url.trim().is_empty() {
            bail!("remote.base_url must not be empty");
        }
        if self.remote.token_env.trim().is_empty() {
            bail!("remote.token_env must not be empty");
        }
        if self.rules.folder.trim().is_empty() {
            bail!("rules.folder must not be empty");
        }
        if self.rules.baseline.trim().is_empty() {
            bail!("rules.baseline must not be empty");
        }
        if self.rules.render_plain {
            validate_file_name(&self.rules.plain_name)
                .map_err(|e| anyhow::anyhow!("rules.plain_name: {}", e))?;
        }
        validate_file_name(&self.output.file_name)
            .map_err(|e| anyhow::anyhow!("output.file_name: {}", e))?;
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions::new()
            .with_selector(RuleSelector::new(&self.rules.folder, &self.rules.baseline))
            .with_baseline_policy(self.rules.baseline_policy)
            .with_tie_break(self.merge.tie_break)
            .with_text_field(self.merge.text_field)
            .with_baseline_only(self.rules.render_baseline_only)
            .with_plain(
                self.rules
                    .render_plain
                    .then(|| self.rules.plain_name.clone()),
            )
            .with_concurrency(self.remote.concurrency)
    }

    /// Builds the remote client, reading the token from `remote.token_env`.
    pub fn client(&self) -> Result<ParatranzClient> {
        let token = std::env::var(&self.remote.token_env).with_context(|| {
            format!(
                "Environment variable {} must hold the API token",
                self.remote.token_env
            )
        })?;
        Ok(ParatranzClient::new(
            &self.remote.base_url,
            self.remote.project_id,
            token,
        )?)
    }
}

/// Flags that override the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Remote project id
    #[arg(long)]
    pub project_id: Option<u64>,

    /// API root of the translation service
    #[arg(long)]
    pub base_url: Option<String>,

    /// Maximum concurrent file fetches
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Folder holding override rule files
    #[arg(long)]
    pub rules_folder: Option<String>,

    /// Display name of the baseline override file
    #[arg(long)]
    pub baseline: Option<String>,

    /// Proceed without the baseline override when it is absent
    #[arg(long)]
    pub optional_baseline: bool,

    /// Precedence between content files: highest-id or last-seen
    #[arg(long)]
    pub tie_break: Option<TieBreak>,

    /// Entry field rendered: original, translation or translation-or-original
    #[arg(long)]
    pub text_field: Option<TextField>,
}

impl Overrides {
    pub fn apply(&self, mut config: Config) -> Result<Config> {
        if let Some(project_id) = self.project_id {
            config.remote.project_id = project_id;
        }
        if let Some(base_url) = &self.base_url {
            config.remote.base_url = base_url.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.remote.concurrency = concurrency;
        }
        if let Some(folder) = &self.rules_folder {
            config.rules.folder = folder.clone();
        }
        if let Some(baseline) = &self.baseline {
            config.rules.baseline = baseline.clone();
        }
        if self.optional_baseline {
            config.rules.baseline_policy = BaselinePolicy::Optional;
        }
        if let Some(tie_break) = self.tie_break {
            config.merge.tie_break = tie_break;
        }
        if let Some(text_field) = self.text_field {
            config.merge.text_field = text_field;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_empty_file_is_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.remote.project_id, 8340);
        assert_eq!(config.rules.baseline, "3d-replacement");
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(indoc! {r#"
            [rules]
            baseline_policy = "optional"
            render_plain = false

            [merge]
            tie_break = "last-seen"
            text_field = "original"
            base = "shipped/global.ini"
        "#})
        .unwrap();
        assert_eq!(config.rules.baseline_policy, BaselinePolicy::Optional);
        assert_eq!(config.rules.folder, "override-rules");
        assert_eq!(config.merge.tie_break, TieBreak::LastSeen);
        assert_eq!(config.merge.text_field, TextField::Original);
        assert_eq!(config.merge.base, Some(PathBuf::from("shipped/global.ini")));

        let options = config.pipeline_options();
        assert!(!options.render_plain);
        assert_eq!(options.tie_break, TieBreak::LastSeen);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.remote.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rules.baseline = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.remote.project_id = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rules.plain_name = "../plain".to_string();
        assert!(config.validate().is_err());
        config.rules.render_plain = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let parsed: Result<Config, _> = toml::from_str("[merge]\ntie_break = \"random\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_overrides_apply_on_top() {
        let overrides = Overrides {
            project_id: Some(42),
            optional_baseline: true,
            tie_break: Some(TieBreak::LastSeen),
            ..Default::default()
        };
        let config = overrides.apply(Config::default()).unwrap();
        assert_eq!(config.remote.project_id, 42);
        assert_eq!(config.rules.baseline_policy, BaselinePolicy::Optional);
        assert_eq!(config.merge.tie_break, TieBreak::LastSeen);

        let bad = Overrides {
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(bad.apply(Config::default()).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("inisync.toml");
        std::fs::write(&path, "[output]\ndir = \"dist\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("dist"));

        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
