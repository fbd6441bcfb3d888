use super::error::{SantaError, SantaResult};
use super::model::{Assignment, Game, Participant};
use super::pairing::pair_up;
use super::store::SantaStore;
use std::sync::Arc;
use tracing::{debug, info};

const COMPLETE_ATTEMPTS: usize = 3;

/// 一次分配的结果，交给私聊通知使用
#[derive(Debug, Clone)]
pub struct AssignmentBatch {
    pub game: Game,
    /// (送礼人, 收礼人)
    pub pairs: Vec<(Participant, Participant)>,
}

impl AssignmentBatch {
    pub fn assignments(&self) -> Vec<Assignment> {
        self.pairs
            .iter()
            .map(|(giver, receiver)| Assignment {
                giver_user_id: giver.user_id,
                receiver_user_id: receiver.user_id,
            })
            .collect()
    }
}

/// 游戏状态机: registration -> completed
pub struct LifecycleManager {
    store: Arc<dyn SantaStore>,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn SantaStore>) -> Self {
        Self { store }
    }

    pub async fn create_game(&self, chat_id: i64) -> SantaResult<Game> {
        if self.store.find_open_game(chat_id).await?.is_some() {
            return Err(SantaError::Conflict { chat_id });
        }

        // 并发创建时由存储层唯一索引兜底，同样返回 Conflict
        let game = self
            .store
            .insert_game(chat_id, chrono::Utc::now().timestamp())
            .await?;
        info!(target: "SecretSanta", "群 {} 新建游戏 #{}", chat_id, game.id);
        Ok(game)
    }

    /// 配对并在一个事务里保存分配、结束报名。私聊通知由调用方在此之后进行。
    ///
    /// 配对期间有人加入时，按新名单重新配对，最多尝试 `COMPLETE_ATTEMPTS` 次。
    pub async fn trigger_assignment(&self, chat_id: i64) -> SantaResult<AssignmentBatch> {
        let mut attempt = 1;
        loop {
            match self.try_complete(chat_id).await {
                Err(SantaError::ParticipantsChanged { game_id }) if attempt < COMPLETE_ATTEMPTS => {
                    debug!(
                        target: "SecretSanta",
                        "游戏 #{} 名单已变化，重新配对 (第 {} 次)",
                        game_id, attempt
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_complete(&self, chat_id: i64) -> SantaResult<AssignmentBatch> {
        let game = self
            .store
            .find_open_game(chat_id)
            .await?
            .ok_or(SantaError::NotFound { chat_id })?;

        let participants = self.store.participants(game.id).await?;
        if participants.len() < 2 {
            return Err(SantaError::InsufficientParticipants {
                count: participants.len(),
            });
        }

        let pairs = {
            let mut rng = rand::rng();
            pair_up(&participants, |p| p.user_id, &mut rng)?
        };

        let batch = AssignmentBatch { game, pairs };
        let game = self
            .store
            .complete_game(
                &batch.game,
                chrono::Utc::now().timestamp(),
                &batch.assignments(),
            )
            .await?;

        info!(
            target: "SecretSanta",
            "群 {} 游戏 #{} 分配完成，共 {} 人",
            chat_id,
            game.id,
            batch.pairs.len()
        );

        Ok(AssignmentBatch { game, ..batch })
    }
}
