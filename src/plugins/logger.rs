use crate::config::build_config;
use crate::event::{Context, EventType};
use crate::plugins::{PluginError, get_config};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use simd_json::base::{ValueAsArray, ValueAsScalar};
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsScalar};
use toml::Value;
use tracing::{debug, info};

pub const NAME: &str = "logger";

#[derive(Serialize, Deserialize, Default)]
struct LoggerConfig {
    #[serde(default)]
    debug: bool,
}

pub fn default_config() -> Value {
    build_config(LoggerConfig { debug: false })
}

pub fn handle(ctx: Context) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let config: LoggerConfig = get_config(&ctx, NAME).unwrap_or_default();

        if let EventType::Onebot(ev) = &ctx.event {
            if config.debug {
                debug!(target: "Logger", "ev: {:?}", ev);
            }

            if let Some(msg) = ctx.as_message() {
                let content = format_message(ev.get("message"));
                let sender = format!("{}({})", msg.sender_name(), msg.user_id());

                match msg.group_id() {
                    // 格式: 接收 <- 群聊 [Group(ID)] [Sender(ID)] Content
                    Some(gid) => info!(
                        target: "Chat",
                        "接收 <- 群聊 [Group({})] [{}] {}",
                        gid, sender, content
                    ),
                    // 格式: 接收 <- 私聊 [Sender(ID)] Content
                    None => info!(target: "Chat", "接收 <- 私聊 [{}] {}", sender, content),
                }
            } else if let Some(post_type) = ctx.post_type() {
                debug!(target: "Event", "Type: {}", post_type);
            }
        }

        Ok(Some(ctx))
    })
}

/// 将 OneBot 消息链转换为人类可读的字符串
fn format_message(msg_val: Option<&OwnedValue>) -> String {
    let Some(val) = msg_val else {
        return String::new();
    };

    // 1. 纯字符串情况
    if let Some(s) = val.as_str() {
        return s.to_string();
    }

    // 2. 消息段数组情况
    let Some(arr) = val.as_array() else {
        return "[复杂消息]".to_string();
    };

    let mut result = String::new();
    for seg in arr {
        let data = seg.get("data");
        match seg.get_str("type").unwrap_or("unknown") {
            "text" => {
                if let Some(t) = data.and_then(|d| d.get_str("text")) {
                    result.push_str(t);
                }
            }
            "at" => {
                let qq = data
                    .and_then(|d| {
                        d.get_str("qq")
                            .map(str::to_string)
                            .or_else(|| d.get_i64("qq").map(|i| i.to_string()))
                    })
                    .unwrap_or_else(|| "Unknown".to_string());
                result.push_str(&format!(" [@{}] ", qq));
            }
            "face" => result.push_str(" [表情] "),
            "image" => result.push_str(" [图片] "),
            "reply" => result.push_str(" [回复] "),
            other => result.push_str(&format!(" [{}] ", other)),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use simd_json::json;

    #[test]
    fn formats_segment_chain() {
        let message = json!([
            {"type": "reply", "data": {"id": "1"}},
            {"type": "at", "data": {"qq": "10001"}},
            {"type": "text", "data": {"text": "/join"}}
        ]);
        assert_eq!(
            format_message(Some(&message)),
            " [回复]  [@10001] /join"
        );
    }

    #[test]
    fn plain_string_message_is_kept() {
        let message = json!("hello");
        assert_eq!(format_message(Some(&message)), "hello");
        assert_eq!(format_message(None), "");
    }
}
