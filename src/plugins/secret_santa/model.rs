use super::entity::{assignment, game, participant};

pub use super::entity::game::GameStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub id: i64,
    pub chat_id: i64,
    pub status: GameStatus,
    /// Unix 秒
    pub created_at: i64,
    /// 完成分配的时间，仅在 completed 状态下存在
    pub started_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: i64,
    pub game_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub handle: Option<String>,
}

impl Participant {
    /// 称呼：有群名片时用 `@名片`，否则用昵称
    pub fn mention(&self) -> String {
        match &self.handle {
            Some(handle) => format!("@{}", handle),
            None => self.display_name.clone(),
        }
    }
}

/// 待写入的参与者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub user_id: i64,
    pub display_name: String,
    pub handle: Option<String>,
}

impl NewParticipant {
    pub fn new(user_id: i64, display_name: impl Into<String>, handle: Option<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            handle: handle.filter(|h| !h.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Assignment {
    pub giver_user_id: i64,
    pub receiver_user_id: i64,
}

impl From<game::Model> for Game {
    fn from(m: game::Model) -> Self {
        Self {
            id: m.id,
            chat_id: m.chat_id,
            status: m.status,
            created_at: m.created_at,
            started_at: m.started_at,
        }
    }
}

impl From<participant::Model> for Participant {
    fn from(m: participant::Model) -> Self {
        Self {
            id: m.id,
            game_id: m.game_id,
            user_id: m.user_id,
            display_name: m.display_name,
            handle: m.handle,
        }
    }
}

impl From<assignment::Model> for Assignment {
    fn from(m: assignment::Model) -> Self {
        Self {
            giver_user_id: m.giver_user_id,
            receiver_user_id: m.receiver_user_id,
        }
    }
}
