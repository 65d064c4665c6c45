//! Layered CLI configuration.
//!
//! Sources, highest priority first:
//! 1. `DEALSCOPE_*` environment variables, `__` separating sections
//!    (`DEALSCOPE_OPENAI__MODEL` -> `openai.model`)
//! 2. `./dealscope.toml`
//! 3. `~/.config/dealscope/config.toml`
//! 4. Built-in defaults
//!
//! `OPENAI_API_KEY` fills `openai.api_key` when nothing else set it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use dealscope_ai::{DefaultPrompts, OpenAiConfig, OverridePrompts, PromptProvider};
use dealscope_pipeline::PipelineConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

const LOCAL_CONFIG: &str = "dealscope.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// DuckDB file receiving finished analyses. Unset means no persistence.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// System prompt overrides keyed by prompt name.
    #[serde(default)]
    pub prompts: BTreeMap<String, String>,
}

impl AppConfig {
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global) = dirs::config_dir().map(|p| p.join("dealscope").join("config.toml"))
            && global.exists()
        {
            figment = figment.merge(Toml::file(global));
        }
        figment
            .merge(Toml::file(LOCAL_CONFIG))
            .merge(Env::prefixed("DEALSCOPE_").split("__"))
    }

    pub fn load() -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment().extract()?;
        if config.openai.api_key.trim().is_empty()
            && let Ok(key) = std::env::var("OPENAI_API_KEY")
        {
            config.openai.api_key = key;
        }
        Ok(config)
    }

    /// Load `.env` from the working directory first, if present.
    pub fn load_with_dotenv() -> Result<Self, figment::Error> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    pub fn prompt_provider(&self) -> anyhow::Result<Arc<dyn PromptProvider>> {
        if self.prompts.is_empty() {
            return Ok(Arc::new(DefaultPrompts));
        }
        let overrides = OverridePrompts::from_named(&self.prompts).map_err(anyhow::Error::msg)?;
        Ok(Arc::new(overrides))
    }
}

#[cfg(test)]
mod tests {
    use dealscope_ai::PromptKey;
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_without_files() {
        Jail::expect_with(|_jail| {
            let config: AppConfig = AppConfig::figment().extract()?;
            assert_eq!(config.openai.model, "gpt-5.1");
            assert_eq!(config.openai.fallback_model.as_deref(), Some("gpt-4o"));
            assert_eq!(config.pipeline.concurrency, 3);
            assert!(config.pipeline.group_documents);
            assert_eq!(config.store.path, None);
            Ok(())
        });
    }

    #[test]
    fn local_toml_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                LOCAL_CONFIG,
                r#"
                [openai]
                model = "gpt-4.1-mini"

                [pipeline]
                concurrency = 5

                [store]
                path = "deals.duckdb"

                [prompts]
                phase3_synthesis = "Summarise briefly."
                "#,
            )?;
            let config = AppConfig::load()?;
            assert_eq!(config.openai.model, "gpt-4.1-mini");
            assert_eq!(config.openai.timeout_secs, 120);
            assert_eq!(config.pipeline.concurrency, 5);
            assert_eq!(config.pipeline.text_char_limit, 15_000);
            assert_eq!(config.store.path, Some(PathBuf::from("deals.duckdb")));

            let prompts = config.prompt_provider().unwrap();
            assert_eq!(prompts.system_prompt(PromptKey::Phase3Synthesis), "Summarise briefly.");
            Ok(())
        });
    }

    #[test]
    fn env_beats_toml() {
        Jail::expect_with(|jail| {
            jail.create_file(LOCAL_CONFIG, "[pipeline]\nconcurrency = 5\n")?;
            jail.set_env("DEALSCOPE_PIPELINE__CONCURRENCY", "8");
            jail.set_env("DEALSCOPE_PIPELINE__GROUP_DOCUMENTS", "false");
            let config = AppConfig::load()?;
            assert_eq!(config.pipeline.concurrency, 8);
            assert!(!config.pipeline.group_documents);
            Ok(())
        });
    }

    #[test]
    fn openai_api_key_fallback() {
        Jail::expect_with(|jail| {
            jail.set_env("OPENAI_API_KEY", "sk-from-env");
            assert_eq!(AppConfig::load()?.openai.api_key, "sk-from-env");

            jail.set_env("DEALSCOPE_OPENAI__API_KEY", "sk-dealscope");
            assert_eq!(AppConfig::load()?.openai.api_key, "sk-dealscope");
            Ok(())
        });
    }

    #[test]
    fn unknown_prompt_name_is_rejected() {
        let config = AppConfig {
            prompts: BTreeMap::from([("phase4".to_string(), "x".to_string())]),
            ..AppConfig::default()
        };
        assert!(config.prompt_provider().is_err());
    }
}
