use super::error::SantaError;
use super::lifecycle::AssignmentBatch;
use super::model::Participant;
use super::texts;
use crate::adapters::Messenger;
use crate::message::Message;
use tracing::{info, warn};

/// 私聊通知结果汇总
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub total: usize,
    pub delivered: usize,
    /// 未能送达的送礼人及原因
    pub failures: Vec<(Participant, SantaError)>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.delivered == self.total
    }
}

/// 逐个私聊通知送礼人。单人失败只记录，不中断后续发送。
pub async fn dispatch(messenger: &dyn Messenger, batch: &AssignmentBatch) -> DispatchReport {
    let mut report = DispatchReport {
        total: batch.pairs.len(),
        ..Default::default()
    };

    for (giver, receiver) in &batch.pairs {
        let message = Message::new().text(texts::gift_notice(receiver));
        match messenger.send_private(giver.user_id, message).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(
                    target: "SecretSanta",
                    "游戏 #{}: 无法私聊 {}({}): {}",
                    batch.game.id, giver.display_name, giver.user_id, e
                );
                report.failures.push((
                    giver.clone(),
                    SantaError::Delivery {
                        user_id: giver.user_id,
                        reason: e.to_string(),
                    },
                ));
            }
        }
    }

    info!(
        target: "SecretSanta",
        "游戏 #{} 私聊通知完成: {}/{}",
        batch.game.id, report.delivered, report.total
    );
    report
}
