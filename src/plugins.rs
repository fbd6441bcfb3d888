use crate::event::{Context, EventType};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use toml::Value;
use tracing::{error, info};

pub mod chat_filter;
pub mod logger;
pub mod secret_santa;

pub type PluginError = Box<dyn std::error::Error + Send + Sync>;

pub type PluginHandler = fn(Context) -> BoxFuture<'static, Result<Option<Context>, PluginError>>;

pub type PluginInitHandler = fn(Context) -> BoxFuture<'static, Result<(), PluginError>>;

pub struct Plugin {
    pub name: &'static str,
    pub handler: PluginHandler,
    pub on_init: Option<PluginInitHandler>,
    pub default_config: fn() -> Value,
}

static PLUGINS: OnceLock<Vec<Plugin>> = OnceLock::new();

/// 获取全局插件列表 (顺序即流水线顺序)
pub fn get_plugins() -> &'static [Plugin] {
    PLUGINS.get_or_init(|| {
        vec![
            Plugin {
                name: chat_filter::NAME,
                handler: chat_filter::handle,
                on_init: None,
                default_config: chat_filter::default_config,
            },
            Plugin {
                name: logger::NAME,
                handler: logger::handle,
                on_init: None,
                default_config: logger::default_config,
            },
            Plugin {
                name: secret_santa::NAME,
                handler: secret_santa::handle,
                on_init: Some(secret_santa::init),
                default_config: secret_santa::default_config,
            },
        ]
    })
}

/// 所有插件的默认配置段，用于生成/补全配置文件
pub fn default_configs() -> Vec<(&'static str, Value)> {
    get_plugins()
        .iter()
        .map(|p| (p.name, (p.default_config)()))
        .collect()
}

/// 执行所有已启用插件的初始化逻辑，任一失败即中止启动
pub async fn do_init(ctx: Context) -> Result<(), PluginError> {
    let plugins = get_plugins();
    let enabled: Vec<&Plugin> = {
        let config = ctx.config();
        plugins
            .iter()
            .filter(|p| config.plugin_enabled(p.name))
            .collect()
    };

    info!(
        target: "System",
        "正在加载插件系统 (已启用 {}/{})",
        enabled.len(),
        plugins.len()
    );

    for plugin in enabled {
        if let Some(init_fn) = plugin.on_init {
            let init_ctx = Context {
                event: EventType::Init,
                ..ctx.clone()
            };
            if let Err(e) = init_fn(init_ctx).await {
                error!(target: "Plugin", "❌ [{}] 初始化失败: {}", plugin.name, e);
                return Err(e);
            }
        }
        info!(target: "Plugin", "✅ [{}] 就绪", plugin.name);
    }
    Ok(())
}

/// 运行插件流水线。插件返回 None 表示事件已被消费。
pub async fn run(mut ctx: Context) -> Result<(), PluginError> {
    for plugin in get_plugins() {
        if !ctx.config().plugin_enabled(plugin.name) {
            continue;
        }

        match (plugin.handler)(ctx).await? {
            Some(next_ctx) => {
                ctx = next_ctx;
            }
            None => return Ok(()),
        }
    }
    Ok(())
}

pub fn get_config<T>(ctx: &Context, plugin_name: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    ctx.config()
        .plugins
        .get(plugin_name)
        .and_then(|v| T::deserialize(v.clone()).ok())
}
