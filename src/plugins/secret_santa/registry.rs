use super::error::{SantaError, SantaResult};
use super::model::{NewParticipant, Participant};
use super::store::SantaStore;
use std::sync::Arc;
use tracing::info;

/// 参与者登记
pub struct Registry {
    store: Arc<dyn SantaStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn SantaStore>) -> Self {
        Self { store }
    }

    /// 加入该群报名中的游戏
    pub async fn join(&self, chat_id: i64, participant: NewParticipant) -> SantaResult<Participant> {
        let game = self
            .store
            .find_open_game(chat_id)
            .await?
            .ok_or(SantaError::NotFound { chat_id })?;

        let joined = self.store.insert_participant(&game, participant).await?;
        info!(
            target: "SecretSanta",
            "群 {} 游戏 #{}: {}({}) 已加入",
            chat_id, game.id, joined.display_name, joined.user_id
        );
        Ok(joined)
    }

    /// 按加入顺序列出参与者
    pub async fn list_participants(&self, chat_id: i64) -> SantaResult<Vec<Participant>> {
        let game = self
            .store
            .find_open_game(chat_id)
            .await?
            .ok_or(SantaError::NotFound { chat_id })?;
        self.store.participants(game.id).await
    }
}
