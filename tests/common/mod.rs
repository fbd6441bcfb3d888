#![allow(dead_code)]

use async_trait::async_trait;
use santa_bot::adapters::{BotError, Messenger};
use santa_bot::config::AppConfig;
use santa_bot::event::{Context, Event, EventType};
use santa_bot::message::Message;
use santa_bot::plugins;
use santa_bot::plugins::secret_santa::store::SeaOrmStore;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use simd_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

/// 单连接的内存 SQLite，已建好表
pub async fn memory_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    SeaOrmStore::new(db.clone()).init_schema().await.unwrap();
    db
}

/// 记录所有发出的消息；对 `unreachable` 中的用户私聊失败
#[derive(Default)]
pub struct RecordingMessenger {
    pub unreachable: HashSet<i64>,
    pub group: Mutex<Vec<(i64, String)>>,
    pub private: Mutex<Vec<(i64, String)>>,
}

impl RecordingMessenger {
    pub fn failing_for(users: &[i64]) -> Self {
        Self {
            unreachable: users.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn group_texts(&self) -> Vec<String> {
        self.group.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn last_group_text(&self) -> String {
        self.group_texts().pop().unwrap_or_default()
    }

    pub fn private_recipients(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.private.lock().unwrap().iter().map(|(id, _)| *id).collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_group(&self, group_id: i64, message: Message) -> Result<(), BotError> {
        self.group
            .lock()
            .unwrap()
            .push((group_id, message.plain_text()));
        Ok(())
    }

    async fn send_private(&self, user_id: i64, message: Message) -> Result<(), BotError> {
        if self.unreachable.contains(&user_id) {
            return Err(format!("API 调用失败 (retcode=100): 用户 {} 不是好友", user_id).into());
        }
        self.private
            .lock()
            .unwrap()
            .push((user_id, message.plain_text()));
        Ok(())
    }
}

/// 启用全部插件的默认配置
pub fn app_config() -> Arc<RwLock<AppConfig>> {
    let mut config = AppConfig::default();
    for (name, value) in plugins::default_configs() {
        config.plugins.insert(name.to_string(), value);
    }
    Arc::new(RwLock::new(config))
}

pub fn group_message(group_id: i64, user_id: i64, nickname: &str, card: &str, text: &str) -> Event {
    json!({
        "post_type": "message",
        "message_type": "group",
        "sub_type": "normal",
        "time": 1_700_000_000,
        "self_id": 1,
        "group_id": group_id,
        "user_id": user_id,
        "message_id": 99,
        "raw_message": text,
        "sender": {"user_id": user_id, "nickname": nickname, "card": card},
        "message": [{"type": "text", "data": {"text": text}}]
    })
}

pub fn private_message(user_id: i64, text: &str) -> Event {
    json!({
        "post_type": "message",
        "message_type": "private",
        "sub_type": "friend",
        "time": 1_700_000_000,
        "self_id": 1,
        "user_id": user_id,
        "message_id": 98,
        "raw_message": text,
        "sender": {"user_id": user_id, "nickname": "私聊用户"},
        "message": [{"type": "text", "data": {"text": text}}]
    })
}

pub struct Harness {
    pub db: DatabaseConnection,
    pub config: Arc<RwLock<AppConfig>>,
    pub messenger: Arc<RecordingMessenger>,
}

impl Harness {
    pub async fn new(messenger: RecordingMessenger) -> Self {
        Self {
            db: memory_db().await,
            config: app_config(),
            messenger: Arc::new(messenger),
        }
    }

    /// 让事件走完整条插件流水线
    pub async fn send(&self, event: Event) {
        let ctx = Context {
            event: EventType::Onebot(event),
            config: self.config.clone(),
            db: self.db.clone(),
            messenger: self.messenger.clone(),
        };
        plugins::run(ctx).await.unwrap();
    }

    pub async fn say(&self, group_id: i64, user_id: i64, nickname: &str, text: &str) -> String {
        self.send(group_message(group_id, user_id, nickname, "", text))
            .await;
        self.messenger.last_group_text()
    }
}
