use crate::config::build_config;
use crate::event::Context;
use crate::plugins::PluginError;
use futures_util::future::BoxFuture;
use serde::Serialize;
use toml::Value;
use tracing::debug;

pub const NAME: &str = "chat_filter";

#[derive(Serialize)]
struct FilterConfig {
    enabled: bool,
}

pub fn default_config() -> Value {
    build_config(FilterConfig { enabled: true })
}

/// 丢弃心跳等元事件，并按全局黑/白名单过滤群聊
pub fn handle(ctx: Context) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        if ctx.post_type() == Some("meta_event") {
            return Ok(None);
        }

        if let Some(group_id) = ctx.as_message().and_then(|m| m.group_id())
            && !ctx.config().global_filter.allows(group_id)
        {
            debug!(target: "Filter", "已忽略群 {} 的消息", group_id);
            return Ok(None);
        }

        Ok(Some(ctx))
    })
}
