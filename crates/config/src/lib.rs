//! 统一配置中心
//!
//! 加载顺序：内置默认值 -> 可选配置文件（`APP_CONFIG_FILE`）-> 环境变量（`APP_*`，
//! 嵌套字段用双下划线分隔，例如 `APP_SERVER__PORT=8080`）。

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

/// 数据库配置，未提供 `url` 时使用内存仓储
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    #[serde(default)]
    #[validate(url)]
    pub url: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
}

/// 会话与广播配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// 每个连接的下行队列容量，写满即判定为慢消费者
    #[validate(range(min = 1, max = 65536))]
    pub outbound_queue_capacity: usize,
    /// `GET /api/messages` 未指定 limit 时的默认条数
    #[validate(range(min = 1, max = 500))]
    pub history_limit: u32,
}

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 5000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
            },
            session: SessionConfig {
                outbound_queue_capacity: 256,
                history_limit: 100,
            },
        }
    }
}

impl AppConfig {
    /// 按默认值、配置文件、环境变量的顺序加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Self::defaults();
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            figment = merge_file(figment, &path);
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Self::from_figment(figment)
    }

    pub fn defaults() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 用于日志输出，隐藏数据库凭据
    pub fn sanitize(&self) -> String {
        let database = match &self.database.url {
            Some(url) => redact_credentials(url),
            None => "memory".to_string(),
        };
        format!(
            "server={} database={} max_connections={} outbound_queue_capacity={} history_limit={}",
            self.bind_address(),
            database,
            self.database.max_connections,
            self.session.outbound_queue_capacity,
            self.session.history_limit,
        )
    }
}

fn merge_file(figment: Figment, path: &str) -> Figment {
    if path.ends_with(".yml") || path.ends_with(".yaml") {
        figment.merge(Yaml::file(path))
    } else if path.ends_with(".json") {
        figment.merge(Json::file(path))
    } else {
        figment.merge(Toml::file(path))
    }
}

fn redact_credentials(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://[REDACTED]{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
