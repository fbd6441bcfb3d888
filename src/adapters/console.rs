use crate::adapters::{BotError, Messenger};
use crate::config::{AppConfig, BotConfig};
use crate::event::{Context, EventType};
use crate::message::Message;
use crate::plugins;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// 控制台模拟的群号
pub const CONSOLE_GROUP_ID: i64 = 1000;

// ================= 定义模拟数据结构 =================

#[derive(Serialize)]
struct MockSender {
    user_id: i64,
    nickname: String,
    card: String,
}

#[derive(Serialize)]
struct MockMessageEvent {
    post_type: &'static str,
    message_type: &'static str,
    time: i64,
    self_id: i64,
    sub_type: &'static str,
    group_id: i64,
    user_id: i64,
    message_id: i64,
    sender: MockSender,
    raw_message: String,
    message: Message,
}

/// 解析一行输入。`@<QQ号> 内容` 以指定用户身份发言，否则默认用户 1。
pub fn parse_line(line: &str) -> (i64, &str) {
    if let Some(rest) = line.strip_prefix('@') {
        let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if let Ok(user_id) = id.parse() {
            return (user_id, text.trim());
        }
    }
    (1, line)
}

/// 将 Bot 回复打印到控制台
pub struct ConsoleMessenger;

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn send_group(&self, group_id: i64, message: Message) -> Result<(), BotError> {
        println!(
            "\x1b[36m[Bot -> 群 {}] > \x1b[0m{}",
            group_id,
            message.plain_text()
        );
        Ok(())
    }

    async fn send_private(&self, user_id: i64, message: Message) -> Result<(), BotError> {
        println!(
            "\x1b[35m[Bot -> 私聊 {}] > \x1b[0m{}",
            user_id,
            message.plain_text()
        );
        Ok(())
    }
}

// ================= 适配器逻辑 =================

/// 控制台适配器入口
pub fn entry(
    _bot_config: BotConfig,
    global_config: Arc<RwLock<AppConfig>>,
    db: DatabaseConnection,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        info!(target: "Console", "已启动控制台模式。请输入指令 (例如: /help)");
        info!(
            target: "Console",
            "模拟环境: Group ID: {} | 使用 `@<QQ号> /join` 切换发言用户",
            CONSOLE_GROUP_ID
        );

        let stdin = tokio::io::stdin();
        let mut reader = BufReader::new(stdin).lines();

        let messenger: Arc<dyn Messenger> = Arc::new(ConsoleMessenger);

        let mut message_id = 0;

        // 循环读取标准输入，逐条同步处理以保持输出顺序
        while let Ok(Some(line)) = reader.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (user_id, text) = parse_line(line);
            message_id += 1;

            let event = MockMessageEvent {
                post_type: "message",
                message_type: "group",
                time: chrono::Local::now().timestamp(),
                self_id: 0,
                sub_type: "normal",
                group_id: CONSOLE_GROUP_ID,
                user_id,
                message_id,
                sender: MockSender {
                    user_id,
                    nickname: format!("用户{}", user_id),
                    card: String::new(),
                },
                raw_message: text.to_string(),
                message: Message::new().text(text),
            };

            let mut json_bytes = match simd_json::to_vec(&event) {
                Ok(b) => b,
                Err(e) => {
                    warn!(target: "Console", "构造模拟消息失败: {}", e);
                    continue;
                }
            };
            let event = match simd_json::to_owned_value(&mut json_bytes) {
                Ok(v) => v,
                Err(e) => {
                    warn!(target: "Console", "构造模拟消息失败: {}", e);
                    continue;
                }
            };

            let ctx = Context {
                event: EventType::Onebot(event),
                config: global_config.clone(),
                db: db.clone(),
                messenger: messenger.clone(),
            };

            if let Err(e) = plugins::run(ctx).await {
                warn!(target: "Console", "处理消息时出错: {}", e);
            }
        }
    })
}
