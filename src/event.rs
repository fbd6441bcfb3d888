use crate::adapters::Messenger;
use crate::config::AppConfig;
use sea_orm::DatabaseConnection;
use simd_json::OwnedValue;
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsArray, ValueObjectAccessAsScalar};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

pub type Event = OwnedValue;

/// 统一的上下文，包含事件数据、配置以及由启动流程注入的数据库与消息通道
#[derive(Clone)]
pub struct Context {
    pub event: EventType,
    pub config: Arc<RwLock<AppConfig>>,
    pub db: DatabaseConnection,
    pub messenger: Arc<dyn Messenger>,
}

impl Context {
    /// 读取配置快照
    pub fn config(&self) -> RwLockReadGuard<'_, AppConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// 尝试将当前事件视为 OneBot 消息事件
    pub fn as_message(&self) -> Option<MessageEvent<'_>> {
        if let EventType::Onebot(event) = &self.event
            && event.get_str("post_type") == Some("message")
        {
            return Some(MessageEvent(event));
        }
        None
    }

    /// 获取事件的 Post Type (如果是 OneBot 事件)
    pub fn post_type(&self) -> Option<&str> {
        match &self.event {
            EventType::Onebot(event) => event.get_str("post_type"),
            EventType::Init => None,
        }
    }
}

// ================== 事件封装工具 ==================

fn get_id(event: &Event, key: &str) -> Option<i64> {
    event
        .get_i64(key)
        .or_else(|| event.get_u64(key).and_then(|v| i64::try_from(v).ok()))
        .or_else(|| event.get_str(key).and_then(|s| s.parse().ok()))
}

/// 消息事件封装，提供便捷的强类型访问
pub struct MessageEvent<'a>(pub &'a Event);

impl<'a> MessageEvent<'a> {
    /// 获取群号 (如果是群消息)
    pub fn group_id(&self) -> Option<i64> {
        get_id(self.0, "group_id").filter(|_| self.is_group())
    }

    /// 获取用户 ID
    pub fn user_id(&self) -> i64 {
        get_id(self.0, "user_id").unwrap_or(0)
    }

    /// 获取消息 ID
    pub fn message_id(&self) -> i64 {
        get_id(self.0, "message_id").unwrap_or(0)
    }

    /// 获取纯文本内容 (raw_message)
    pub fn text(&self) -> &'a str {
        self.0.get_str("raw_message").unwrap_or("")
    }

    /// 消息段数组
    pub fn segments(&self) -> Option<&'a Vec<OwnedValue>> {
        self.0.get_array("message")
    }

    /// 是否为群消息
    pub fn is_group(&self) -> bool {
        self.0.get_str("message_type") == Some("group")
    }

    /// 获取发送者昵称
    pub fn sender_nickname(&self) -> Option<&'a str> {
        self.0
            .get("sender")
            .and_then(|s| s.get_str("nickname"))
            .filter(|s| !s.is_empty())
    }

    /// 获取发送者群名片 (如果为空则返回 None)
    pub fn sender_card(&self) -> Option<&'a str> {
        self.0
            .get("sender")
            .and_then(|s| s.get_str("card"))
            .filter(|s| !s.is_empty())
    }

    /// 获取发送者显示名称 (优先名片，其次昵称)
    pub fn sender_name(&self) -> &'a str {
        self.sender_card()
            .or_else(|| self.sender_nickname())
            .unwrap_or("Unknown")
    }
}

// ================== 基础结构定义 ==================

/// 事件类型
#[derive(Debug, Clone)]
pub enum EventType {
    /// 来自 OneBot 的原始事件
    Onebot(Event),
    /// 系统初始化事件 (用于插件 on_init 生命周期)
    Init,
}
