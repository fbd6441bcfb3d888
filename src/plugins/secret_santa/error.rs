use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SantaError {
    #[error("群 {chat_id} 已有报名中的游戏")]
    Conflict { chat_id: i64 },

    #[error("群 {chat_id} 没有报名中的游戏")]
    NotFound { chat_id: i64 },

    #[error("用户 {user_id} 已加入游戏 {game_id}")]
    AlreadyJoined { game_id: i64, user_id: i64 },

    #[error("参与人数不足: {count} 人，至少需要 2 人")]
    InsufficientParticipants { count: usize },

    #[error("游戏 {game_id} 的参与者名单在分配过程中发生了变化")]
    ParticipantsChanged { game_id: i64 },

    #[error("无效的配对输入: {0}")]
    InvalidInput(String),

    #[error("无法私聊用户 {user_id}: {reason}")]
    Delivery { user_id: i64, reason: String },

    #[error("数据库错误: {0}")]
    Store(#[from] DbErr),
}

pub type SantaResult<T> = Result<T, SantaError>;
