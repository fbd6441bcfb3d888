use crate::adapters::{BotError, Messenger};
use crate::config::{AppConfig, BotConfig};
use crate::event::{Context, Event, EventType};
use crate::matcher::Matcher;
use crate::plugins;
use futures_util::future::BoxFuture;
use futures_util::{Sink, SinkExt, StreamExt};
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{error, info, warn};

pub mod api;

use api::ApiClient;

pub type TraitSink =
    Box<dyn Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin>;
pub type LockedWriter = Arc<AsyncMutex<TraitSink>>;

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// 适配器入口函数 (Adapter Entry)
pub fn entry(
    bot_config: BotConfig,
    global_config: Arc<RwLock<AppConfig>>,
    db: DatabaseConnection,
) -> BoxFuture<'static, ()> {
    Box::pin(async move { run_bot_loop(bot_config, global_config, db).await })
}

/// OneBot 协议的主循环逻辑，断线后自动重连
pub async fn run_bot_loop(
    bot_config: BotConfig,
    global_config: Arc<RwLock<AppConfig>>,
    db: DatabaseConnection,
) {
    let bot_url = bot_config
        .url
        .clone()
        .unwrap_or_else(|| "Unknown".to_string());
    loop {
        match connect_and_listen(&bot_config, global_config.clone(), db.clone()).await {
            Ok(()) => warn!(target: "Bot", "Bot [{}] 连接断开，3秒后重连...", bot_url),
            Err(e) => {
                error!(target: "Bot", "Bot [{}] 连接失败: {}。3秒后重试...", bot_url, e)
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn connect_and_listen(
    config: &BotConfig,
    global_config: Arc<RwLock<AppConfig>>,
    db: DatabaseConnection,
) -> Result<(), BotError> {
    let url = config.url.as_deref().ok_or("OneBot URL 未配置")?;

    let mut request = url.into_client_request()?;

    if let Some(token) = &config.access_token
        && !token.is_empty()
    {
        let token_header = format!("Bearer {}", token);
        request
            .headers_mut()
            .insert("Authorization", HeaderValue::from_str(&token_header)?);
    }

    let (ws_stream, _) = connect_async(request).await?;
    info!(target: "Bot", "Bot [{}] 连接成功！(OneBot)", url);

    let (write_half, mut read_half) = ws_stream.split();

    let writer: LockedWriter = Arc::new(AsyncMutex::new(Box::new(write_half)));
    let matcher = Arc::new(Matcher::new());
    let messenger: Arc<dyn Messenger> = Arc::new(ApiClient::new(writer, matcher.clone()));

    while let Some(message) = read_half.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                let mut data = text.as_bytes().to_vec();
                let event: Event = match simd_json::to_owned_value(&mut data) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(target: "Bot", "无法解析的数据帧: {}", e);
                        continue;
                    }
                };

                // API 响应交给等待者，不进入插件流水线
                let Some(event) = matcher.dispatch(event).await else {
                    continue;
                };

                let ctx = Context {
                    event: EventType::Onebot(event),
                    config: global_config.clone(),
                    db: db.clone(),
                    messenger: messenger.clone(),
                };

                // 每个事件独立处理，不同群聊互不阻塞
                tokio::spawn(async move {
                    if let Err(e) = plugins::run(ctx).await {
                        error!(target: "Bot", "Event processing error: {}", e);
                    }
                });
            }
            Ok(WsMessage::Close(_)) => return Ok(()),
            Err(e) => return Err(Box::new(e)),
            _ => {}
        }
    }
    Ok(())
}

pub async fn send_frame_raw(writer: LockedWriter, json_str: String) -> Result<(), BotError> {
    let mut guard = writer.lock().await;
    guard.send(WsMessage::Text(json_str.into())).await?;
    Ok(())
}
