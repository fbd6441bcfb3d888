use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use toml::Value;
use tracing::info;

pub const PROTOCOL_ONEBOT: &str = "onebot";
pub const PROTOCOL_CONSOLE: &str = "console";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("解析配置文件失败: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("序列化配置失败: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Bot [{0}] 未配置 access_token，请在配置文件或 SANTA_BOT_TOKEN 中设置")]
    MissingAccessToken(String),
    #[error("Bot 协议 [{0}] 未配置 url")]
    MissingUrl(String),
    #[error("未知的 Bot 协议: {0}")]
    UnknownProtocol(String),
    #[error("没有启用任何 Bot")]
    NoEnabledBot,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    // 全局指令前缀（支持多个，如 ["/", "#"]）
    #[serde(default = "default_prefix")]
    pub command_prefix: Vec<String>,

    // 日志级别，可被 RUST_LOG 覆盖
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // 数据库连接
    #[serde(default)]
    pub database: DatabaseConfig,

    // 全局群聊过滤配置
    #[serde(default)]
    pub global_filter: GlobalFilterConfig,

    // Bot 连接配置
    #[serde(default = "default_bots")]
    pub bots: Vec<BotConfig>,

    // 插件配置
    #[serde(flatten)]
    pub plugins: HashMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GlobalFilterConfig {
    #[serde(default)]
    pub enable_blacklist: bool,
    #[serde(default)]
    pub blacklist: Vec<i64>,

    #[serde(default)]
    pub enable_whitelist: bool,
    #[serde(default)]
    pub whitelist: Vec<i64>,
}

impl GlobalFilterConfig {
    /// 判断群聊是否允许被处理
    pub fn allows(&self, group_id: i64) -> bool {
        if self.enable_blacklist && self.blacklist.contains(&group_id) {
            return false;
        }
        if self.enable_whitelist && !self.whitelist.contains(&group_id) {
            return false;
        }
        true
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BotConfig {
    // 是否启用此 Bot
    #[serde(default = "default_true")]
    pub enabled: bool,

    // 协议类型 (例如 "onebot")
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl BotConfig {
    fn has_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

fn default_prefix() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_url() -> String {
    // mode=rwc 允许 读/写/创建
    "sqlite:data/santa.db?mode=rwc".to_string()
}

fn default_bots() -> Vec<BotConfig> {
    vec![
        // 控制台适配器：保持简洁，仅需启用
        BotConfig {
            enabled: true,
            protocol: PROTOCOL_CONSOLE.to_string(),
            url: None,
            access_token: None,
        },
        // OneBot 适配器：生成配置占位符，默认禁用以防误连
        BotConfig {
            enabled: false,
            protocol: PROTOCOL_ONEBOT.to_string(),
            url: Some("ws://127.0.0.1:3001".to_string()),
            access_token: Some(String::new()),
        },
    ]
}

fn default_true() -> bool {
    true
}

fn default_protocol() -> String {
    PROTOCOL_ONEBOT.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_prefix(),
            log_level: default_log_level(),
            database: DatabaseConfig::default(),
            global_filter: GlobalFilterConfig::default(),
            bots: default_bots(),
            plugins: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// 加载配置文件；不存在时写入默认配置。缺失的插件配置段会被补全并回写。
    pub async fn load_or_init<I>(path: &Path, plugin_defaults: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).await?;
            toml::from_str::<AppConfig>(&content)?
        } else {
            info!(target: "Config", "配置文件不存在，已生成默认配置: {}", path.display());
            AppConfig::default()
        };

        let mut changed = !path.exists();
        for (name, value) in plugin_defaults {
            if !config.plugins.contains_key(name) {
                config.plugins.insert(name.to_string(), value);
                changed = true;
            }
        }

        if changed {
            config.save(path).await?;
        }
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, toml_string).await?;
        Ok(())
    }

    /// 应用环境变量覆盖 (SANTA_BOT_TOKEN / SANTA_DATABASE_URL)
    pub fn apply_env(&mut self, bot_token: Option<String>, database_url: Option<String>) {
        if let Some(token) = bot_token.filter(|t| !t.is_empty()) {
            for bot in self
                .bots
                .iter_mut()
                .filter(|b| b.protocol == PROTOCOL_ONEBOT && !b.has_token())
            {
                bot.access_token = Some(token.clone());
            }
        }
        if let Some(url) = database_url.filter(|u| !u.is_empty()) {
            self.database.url = url;
        }
    }

    /// 启动前检查：任何错误都视为致命
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut enabled = 0;
        for bot in self.bots.iter().filter(|b| b.enabled) {
            enabled += 1;
            match bot.protocol.as_str() {
                PROTOCOL_CONSOLE => {}
                PROTOCOL_ONEBOT => {
                    let url = bot
                        .url
                        .as_deref()
                        .filter(|u| !u.is_empty())
                        .ok_or_else(|| ConfigError::MissingUrl(bot.protocol.clone()))?;
                    if !bot.has_token() {
                        return Err(ConfigError::MissingAccessToken(url.to_string()));
                    }
                }
                other => return Err(ConfigError::UnknownProtocol(other.to_string())),
            }
        }
        if enabled == 0 {
            return Err(ConfigError::NoEnabledBot);
        }
        Ok(())
    }

    pub fn plugin_enabled(&self, name: &str) -> bool {
        self.plugins
            .get(name)
            .and_then(|v| v.get("enabled"))
            .and_then(|x| x.as_bool())
            .unwrap_or(false)
    }
}

/// 辅助函数：构建默认配置 Value，并确保包含 enabled 字段
pub fn build_config<T: Serialize>(data: T) -> Value {
    let mut val = Value::try_from(data).unwrap_or(Value::Table(Default::default()));
    if let Value::Table(ref mut map) = val
        && !map.contains_key("enabled")
    {
        map.insert("enabled".to_string(), Value::Boolean(true));
    }
    val
}
