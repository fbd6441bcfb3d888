use crate::command::match_command;
use crate::config::build_config;
use crate::event::{Context, MessageEvent};
use crate::message::Message;
use crate::plugins::{PluginError, get_config};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toml::Value;
use tracing::{error, info};

pub mod dispatch;
pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod pairing;
pub mod registry;
pub mod store;
pub mod texts;

use error::{SantaError, SantaResult};
use lifecycle::LifecycleManager;
use model::NewParticipant;
use registry::Registry;
use store::{SantaStore, SeaOrmStore};

pub const NAME: &str = "secret_santa";

/// 没有昵称时的默认称呼
const FALLBACK_NAME: &str = "参与者";

#[derive(Serialize, Deserialize)]
struct SecretSantaConfig {
    /// 回复时引用触发指令的消息
    #[serde(default = "default_true")]
    quote_user: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SecretSantaConfig {
    fn default() -> Self {
        Self { quote_user: true }
    }
}

pub fn default_config() -> Value {
    build_config(SecretSantaConfig::default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Instructions,
    NewGame,
    Join,
    List,
    StartGame,
}

/// 指令名与中文别名
const COMMANDS: &[(Command, &[&str])] = &[
    (Command::Help, &["start", "help", "圣诞帮助"]),
    (Command::Instructions, &["instructions", "圣诞说明"]),
    (Command::NewGame, &["new_game", "新建圣诞"]),
    (Command::Join, &["join", "加入圣诞"]),
    (Command::List, &["list", "圣诞名单"]),
    (Command::StartGame, &["start_game", "开始圣诞"]),
];

impl Command {
    pub fn parse(ctx: &Context) -> Option<Command> {
        COMMANDS.iter().find_map(|(cmd, names)| {
            names
                .iter()
                .any(|name| match_command(ctx, name))
                .then_some(*cmd)
        })
    }

    /// 需要群聊环境的指令
    pub fn group_only(self) -> bool {
        !matches!(self, Command::Help | Command::Instructions)
    }
}

pub fn init(ctx: Context) -> BoxFuture<'static, Result<(), PluginError>> {
    Box::pin(async move {
        SeaOrmStore::new(ctx.db.clone())
            .init_schema()
            .await
            .map_err(|e| format!("SecretSanta Plugin DB Init Error: {}", e))?;
        Ok(())
    })
}

pub fn handle(ctx: Context) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let Some(command) = Command::parse(&ctx) else {
            return Ok(Some(ctx));
        };
        let Some(msg) = ctx.as_message() else {
            return Ok(Some(ctx));
        };

        let config: SecretSantaConfig = get_config(&ctx, NAME).unwrap_or_default();
        let prefix = ctx
            .config()
            .command_prefix
            .first()
            .cloned()
            .unwrap_or_else(|| "/".to_string());

        let group_id = msg.group_id();
        let user_id = msg.user_id();
        let message_id = msg.message_id();

        let text = match group_id {
            None if command.group_only() => texts::group_only().to_string(),
            _ => {
                let store: Arc<dyn SantaStore> = Arc::new(SeaOrmStore::new(ctx.db.clone()));
                match execute(&ctx, &msg, store, command, &prefix).await {
                    Ok(text) => text,
                    Err(e) => {
                        if let SantaError::Store(db_err) = &e {
                            error!(target: "SecretSanta", "{:?} 执行失败: {}", command, db_err);
                        } else {
                            info!(target: "SecretSanta", "{:?} 被拒绝: {}", command, e);
                        }
                        texts::error_message(&e, &prefix)
                    }
                }
            }
        };

        let mut reply = Message::new();
        if config.quote_user && message_id != 0 {
            reply = reply.reply(message_id);
        }
        let reply = reply.text(text);

        match group_id {
            Some(gid) => {
                info!(target: "Chat", "发送 -> 群聊 [Group({})] {}", gid, reply.plain_text());
                ctx.messenger.send_group(gid, reply).await?;
            }
            None => {
                info!(target: "Chat", "发送 -> 私聊 [User({})] {}", user_id, reply.plain_text());
                ctx.messenger.send_private(user_id, reply).await?;
            }
        }

        Ok(None)
    })
}

/// 执行指令，返回要回复的文本
async fn execute(
    ctx: &Context,
    msg: &MessageEvent<'_>,
    store: Arc<dyn SantaStore>,
    command: Command,
    prefix: &str,
) -> SantaResult<String> {
    let chat_id = msg.group_id().unwrap_or_default();

    match command {
        Command::Help => Ok(texts::help(prefix)),
        Command::Instructions => Ok(texts::instructions(prefix)),
        Command::NewGame => {
            LifecycleManager::new(store).create_game(chat_id).await?;
            Ok(texts::game_created(prefix))
        }
        Command::Join => {
            let participant = NewParticipant::new(
                msg.user_id(),
                msg.sender_nickname().unwrap_or(FALLBACK_NAME),
                msg.sender_card().map(String::from),
            );
            let joined = Registry::new(store).join(chat_id, participant).await?;
            Ok(texts::joined(&joined))
        }
        Command::List => {
            let participants = Registry::new(store).list_participants(chat_id).await?;
            Ok(texts::participant_list(&participants, prefix))
        }
        Command::StartGame => {
            let batch = LifecycleManager::new(store)
                .trigger_assignment(chat_id)
                .await?;
            // 事务提交后再私聊通知
            let report = dispatch::dispatch(ctx.messenger.as_ref(), &batch).await;
            Ok(texts::assignment_summary(&report))
        }
    }
}
