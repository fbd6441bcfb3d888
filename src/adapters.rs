use crate::config::{AppConfig, BotConfig, PROTOCOL_CONSOLE, PROTOCOL_ONEBOT};
use crate::message::Message;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sea_orm::DatabaseConnection;
use std::sync::{Arc, OnceLock, RwLock};

pub mod console;
pub mod onebot;

pub type BotError = Box<dyn std::error::Error + Send + Sync>;

/// 消息发送通道。群聊发送尽力而为；私聊发送需要确认结果，
/// 因为对方可能从未与 Bot 建立私聊关系。
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_group(&self, group_id: i64, message: Message) -> Result<(), BotError>;

    async fn send_private(&self, user_id: i64, message: Message) -> Result<(), BotError>;
}

/// 适配器处理函数签名
pub type AdapterHandler =
    fn(BotConfig, Arc<RwLock<AppConfig>>, DatabaseConnection) -> BoxFuture<'static, ()>;

/// 适配器定义
pub struct Adapter {
    /// 协议名称 (如 "onebot")，在配置文件中通过 protocol 字段指定
    pub protocol: &'static str,
    /// 启动处理函数
    pub handler: AdapterHandler,
}

static ADAPTERS: OnceLock<Vec<Adapter>> = OnceLock::new();

/// 获取所有注册的适配器
pub fn get_adapters() -> &'static [Adapter] {
    ADAPTERS.get_or_init(|| {
        vec![
            Adapter {
                protocol: PROTOCOL_ONEBOT,
                handler: onebot::entry,
            },
            // 控制台适配器 (本地调试)
            Adapter {
                protocol: PROTOCOL_CONSOLE,
                handler: console::entry,
            },
        ]
    })
}

/// 根据协议名称查找适配器
pub fn find_adapter(protocol: &str) -> Option<&'static Adapter> {
    get_adapters().iter().find(|a| a.protocol == protocol)
}
