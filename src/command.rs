use crate::event::Context;
use simd_json::OwnedValue;
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsScalar};

/// 判断消息是否为指定指令：自动跳过头部的 Reply/At/空白，再匹配 [Prefix][Command]
pub fn match_command(ctx: &Context, command_name: &str) -> bool {
    let prefixes = ctx.config().command_prefix.clone();
    ctx.as_message()
        .and_then(|msg| msg.segments())
        .is_some_and(|segments| match_segments(segments, &prefixes, command_name))
}

/// 在消息段上匹配指令。指令名之后必须是结尾或空白，`/start` 不会匹配 `/start_game`。
pub fn match_segments(segments: &[OwnedValue], prefixes: &[String], command_name: &str) -> bool {
    for segment in segments {
        let (Some(type_), Some(data)) = (segment.get_str("type"), segment.get("data")) else {
            return false;
        };

        match type_ {
            // 引用回复与 AT 不影响指令识别
            "reply" | "at" => {}
            "text" => {
                let trimmed_start = data.get_str("text").unwrap_or("").trim_start();
                // 跳过首部纯空白文本
                if trimmed_start.is_empty() {
                    continue;
                }

                // 第一个有效文本节点决定是否匹配
                return prefixes.iter().any(|prefix| {
                    trimmed_start
                        .strip_prefix(prefix.as_str())
                        .and_then(|s| s.strip_prefix(command_name))
                        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
                });
            }
            // 遇到其他类型（如图片）且未匹配到指令，停止
            _ => return false,
        }
    }

    false
}
