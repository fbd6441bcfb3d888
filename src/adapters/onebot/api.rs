// 引用同模块下的工具函数
use super::{LockedWriter, send_frame_raw};
use crate::adapters::{BotError, Messenger};
use crate::matcher::Matcher;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsScalar};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub type ApiError = BotError;

/// 等待 API 响应的默认超时
pub const API_TIMEOUT: Duration = Duration::from_secs(30);

static ECHO_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_echo() -> String {
    let count = ECHO_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("api-req-{}", count)
}

#[derive(Serialize)]
struct ApiRequest<T> {
    action: String,
    params: T,
    echo: String,
}

/// OneBot 动作调用客户端，同时作为该连接的 [`Messenger`]
#[derive(Clone)]
pub struct ApiClient {
    writer: LockedWriter,
    matcher: Arc<Matcher>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(writer: LockedWriter, matcher: Arc<Matcher>) -> Self {
        Self {
            writer,
            matcher,
            timeout: API_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 通用 API 调用函数
    pub async fn call_action<P, R>(&self, action: &str, params: P) -> Result<R, ApiError>
    where
        P: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let echo = next_echo();
        let req = ApiRequest {
            action: action.to_string(),
            params,
            echo: echo.clone(),
        };

        let json_str = simd_json::to_string(&req)?;

        // 先注册监听，再发送请求
        let pending = self.matcher.register(echo).await;

        if let Err(e) = send_frame_raw(self.writer.clone(), json_str).await {
            pending.cancel().await;
            return Err(e);
        }

        let resp_event = pending.wait(self.timeout).await.ok_or("API 请求超时")?;

        // 响应格式: { status, retcode, data, echo }
        let retcode = resp_event
            .get_i64("retcode")
            .or_else(|| resp_event.get_u64("retcode").map(|v| v as i64))
            .unwrap_or(-1);

        if retcode != 0 {
            // 尝试获取 msg 或 wording 错误信息
            let msg = resp_event
                .get_str("wording")
                .or_else(|| resp_event.get_str("msg"))
                .unwrap_or("Unknown Error");
            return Err(format!("API 调用失败 (retcode={}): {}", retcode, msg).into());
        }

        let data_val = resp_event
            .get("data")
            .cloned()
            .unwrap_or(OwnedValue::from(()));

        let data: R = simd_json::serde::from_owned_value(data_val)?;

        Ok(data)
    }

    /// 不等待响应的 API 调用函数 (Fire-and-forget)
    pub async fn call_action_no_wait<P>(&self, action: &str, params: P) -> Result<(), ApiError>
    where
        P: Serialize,
    {
        let req = ApiRequest {
            action: action.to_string(),
            params,
            echo: next_echo(),
        };

        let json_str = simd_json::to_string(&req)?;
        send_frame_raw(self.writer.clone(), json_str).await
    }

    pub async fn send_private_msg(
        &self,
        user_id: i64,
        message: &Message,
    ) -> Result<Option<MessageId>, ApiError> {
        let params = SendPrivateMsgParams { user_id, message };
        self.call_action("send_private_msg", params).await
    }

    pub async fn send_group_msg(&self, group_id: i64, message: &Message) -> Result<(), ApiError> {
        let params = SendGroupMsgParams { group_id, message };
        self.call_action_no_wait("send_group_msg", params).await
    }
}

// ================= API 定义 =================

// --- send_private_msg ---

#[derive(Serialize)]
struct SendPrivateMsgParams<'a> {
    user_id: i64,
    message: &'a Message,
}

#[derive(Debug, Deserialize)]
pub struct MessageId {
    pub message_id: i64,
}

// --- send_group_msg ---

#[derive(Serialize)]
struct SendGroupMsgParams<'a> {
    group_id: i64,
    message: &'a Message,
}

#[async_trait]
impl Messenger for ApiClient {
    async fn send_group(&self, group_id: i64, message: Message) -> Result<(), BotError> {
        self.send_group_msg(group_id, &message).await
    }

    async fn send_private(&self, user_id: i64, message: Message) -> Result<(), BotError> {
        self.send_private_msg(user_id, &message).await.map(|_| ())
    }
}
