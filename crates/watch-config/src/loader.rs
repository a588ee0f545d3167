use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::GlobalConfig;

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "chain-watch.toml";

/// 环境变量前缀，例如 `CHAIN_WATCH__MONITORING__MAX_METRICS=10`
pub const ENV_PREFIX: &str = "CHAIN_WATCH";

/// 配置加载器
pub struct ConfigLoader {
    config_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self::with_env_prefix(config_dir, ENV_PREFIX)
    }

    pub fn with_env_prefix<P: AsRef<Path>>(config_dir: P, env_prefix: &str) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            env_prefix: env_prefix.to_string(),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// 加载全局配置
    ///
    /// 配置文件不存在时使用默认值，环境变量覆盖文件中的同名字段。
    pub fn load(&self) -> Result<GlobalConfig> {
        self.load_as()
    }

    /// 按调用方的类型加载配置（例如在全局配置上附加告警规则）
    pub fn load_as<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let config_path = self.config_path();

        let config = Config::builder()
            .add_source(
                File::new(
                    config_path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                    FileFormat::Toml,
                )
                .required(false),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<GlobalConfig> {
        let global = self.load()?;
        global.validate()?;
        Ok(global)
    }
}
