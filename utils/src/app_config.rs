use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use super::error::Result;

/// 环境变量前缀，例如 MIRRORSYNC_LOG__LEVEL=info
pub const ENV_PREFIX: &str = "MIRRORSYNC";

lazy_static! {
    static ref BUILDER: RwLock<ConfigBuilder<DefaultState>> = RwLock::new(Config::builder());
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

/// 同步配置（与命令行无关的常量部分）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// 计算内容指纹时每次读取的字节数
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub log: LogConfig,
    pub sync: SyncSettings,
}

impl AppConfig {
    /// Initialize AppConfig from the embedded defaults plus environment overrides.
    pub fn init(default_config: Option<&str>) -> Result<()> {
        let mut builder = Config::builder();

        if let Some(contents) = default_config {
            builder = builder.add_source(File::from_str(contents, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut w = BUILDER.write()?;
        *w = builder;

        Ok(())
    }

    pub fn set(key: &str, value: &str) -> Result<()> {
        let mut w = BUILDER.write()?;
        *w = w.clone().set_override(key, value)?;
        Ok(())
    }

    pub fn get<T>(key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let config = BUILDER.read()?.clone().build()?;
        Ok(config.get::<T>(key)?)
    }

    pub fn fetch() -> Result<AppConfig> {
        let config = BUILDER.read()?.clone().build()?;
        Ok(config.try_deserialize::<AppConfig>()?)
    }
}
