use crate::event::Event;
use simd_json::derived::ValueObjectAccessAsScalar;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, oneshot};

/// 事件匹配器，用于把 API 响应 (echo) 路由回等待中的调用方
#[derive(Default)]
pub struct Matcher {
    waiters: AsyncMutex<HashMap<String, oneshot::Sender<Event>>>,
}

/// 已注册的响应等待者。必须在发出请求之前注册，避免响应先于注册到达。
pub struct PendingResponse<'a> {
    matcher: &'a Matcher,
    echo: String,
    receiver: oneshot::Receiver<Event>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个响应等待者 (Echo)
    pub async fn register(&self, echo: String) -> PendingResponse<'_> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(echo.clone(), tx);
        PendingResponse {
            matcher: self,
            echo,
            receiver: rx,
        }
    }

    /// 尝试分发事件给等待者。如果事件被消费（匹配成功），返回 None；否则返回原事件。
    pub async fn dispatch(&self, event: Event) -> Option<Event> {
        let Some(echo) = event.get_str("echo").map(str::to_string) else {
            return Some(event);
        };

        match self.waiters.lock().await.remove(&echo) {
            Some(sender) => {
                // 忽略错误（如等待者已超时）
                let _ = sender.send(event);
                None
            }
            // 无人等待的响应 (如 fire-and-forget 调用) 直接丢弃
            None => None,
        }
    }

    pub async fn pending(&self) -> usize {
        self.waiters.lock().await.len()
    }
}

impl PendingResponse<'_> {
    /// 等待响应，超时返回 None 并清理等待者
    pub async fn wait(self, timeout_duration: Duration) -> Option<Event> {
        match tokio::time::timeout(timeout_duration, self.receiver).await {
            Ok(Ok(event)) => Some(event),
            _ => {
                self.matcher.waiters.lock().await.remove(&self.echo);
                None
            }
        }
    }

    /// 请求未能发出时撤销注册
    pub async fn cancel(self) {
        self.matcher.waiters.lock().await.remove(&self.echo);
    }
}
