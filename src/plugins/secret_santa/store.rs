use super::entity::{assignment, game, participant};
use super::error::{SantaError, SantaResult};
use super::model::{Assignment, Game, GameStatus, NewParticipant, Participant};
use async_trait::async_trait;
use sea_orm::sea_query::Index;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Schema, Set, SqlErr, TransactionTrait,
};
use std::collections::HashSet;
use tracing::debug;

/// 游戏数据的持久化接口。唯一性约束由存储层保证。
#[async_trait]
pub trait SantaStore: Send + Sync {
    /// 查找该群报名中的游戏
    async fn find_open_game(&self, chat_id: i64) -> SantaResult<Option<Game>>;

    async fn find_game(&self, game_id: i64) -> SantaResult<Option<Game>>;

    /// 新建报名中的游戏。该群已有报名中的游戏时返回 `Conflict`。
    async fn insert_game(&self, chat_id: i64, created_at: i64) -> SantaResult<Game>;

    /// 写入参与者。游戏已不在报名状态时返回 `NotFound`，重复加入返回 `AlreadyJoined`。
    async fn insert_participant(
        &self,
        game: &Game,
        participant: NewParticipant,
    ) -> SantaResult<Participant>;

    /// 按加入顺序返回参与者
    async fn participants(&self, game_id: i64) -> SantaResult<Vec<Participant>>;

    /// 在同一事务内写入分配结果并把游戏置为 completed。
    /// 游戏已不在报名状态时返回 `NotFound`；分配的送礼人与当前参与者不一致时
    /// 返回 `ParticipantsChanged`。两种情况都不写入任何数据。
    async fn complete_game(
        &self,
        game: &Game,
        started_at: i64,
        assignments: &[Assignment],
    ) -> SantaResult<Game>;

    async fn assignments(&self, game_id: i64) -> SantaResult<Vec<Assignment>>;
}

#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 建表及索引 (已存在则跳过)
    pub async fn init_schema(&self) -> Result<(), DbErr> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let mut game_table = schema.create_table_from_entity(game::Entity);
        game_table.if_not_exists();
        self.db.execute(backend.build(&game_table)).await?;

        let mut participant_table = schema.create_table_from_entity(participant::Entity);
        participant_table.if_not_exists();
        self.db.execute(backend.build(&participant_table)).await?;

        let mut assignment_table = schema.create_table_from_entity(assignment::Entity);
        assignment_table.if_not_exists();
        self.db.execute(backend.build(&assignment_table)).await?;

        let participant_unique = Index::create()
            .name("idx_santa_participant_game_user")
            .table(participant::Entity)
            .col(participant::Column::GameId)
            .col(participant::Column::UserId)
            .unique()
            .if_not_exists()
            .to_owned();
        self.db.execute(backend.build(&participant_unique)).await?;

        let giver_unique = Index::create()
            .name("idx_santa_assignment_game_giver")
            .table(assignment::Entity)
            .col(assignment::Column::GameId)
            .col(assignment::Column::GiverUserId)
            .unique()
            .if_not_exists()
            .to_owned();
        self.db.execute(backend.build(&giver_unique)).await?;

        // 每个群最多一个报名中的游戏 (部分唯一索引，SQLite 与 Postgres 语法一致)
        self.db
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_santa_game_open_chat \
                 ON santa_game (chat_id) WHERE status = 'registration'",
            )
            .await?;

        debug!(target: "SecretSanta", "数据表已就绪");
        Ok(())
    }
}

/// 是否为唯一约束冲突
fn is_unique_violation(err: &DbErr) -> bool {
    if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
        return true;
    }
    let msg = err.to_string();
    msg.contains("UNIQUE constraint failed") || msg.contains("23505")
}

#[async_trait]
impl SantaStore for SeaOrmStore {
    async fn find_open_game(&self, chat_id: i64) -> SantaResult<Option<Game>> {
        let found = game::Entity::find()
            .filter(game::Column::ChatId.eq(chat_id))
            .filter(game::Column::Status.eq(GameStatus::Registration))
            .one(&self.db)
            .await?;
        Ok(found.map(Game::from))
    }

    async fn find_game(&self, game_id: i64) -> SantaResult<Option<Game>> {
        let found = game::Entity::find_by_id(game_id).one(&self.db).await?;
        Ok(found.map(Game::from))
    }

    async fn insert_game(&self, chat_id: i64, created_at: i64) -> SantaResult<Game> {
        let model = game::ActiveModel {
            chat_id: Set(chat_id),
            status: Set(GameStatus::Registration),
            created_at: Set(created_at),
            started_at: Set(None),
            ..Default::default()
        };

        match model.insert(&self.db).await {
            Ok(m) => Ok(m.into()),
            Err(e) if is_unique_violation(&e) => Err(SantaError::Conflict { chat_id }),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_participant(
        &self,
        game: &Game,
        participant: NewParticipant,
    ) -> SantaResult<Participant> {
        let txn = self.db.begin().await?;

        // 空更新锁住游戏行，与 complete_game 的状态翻转互斥
        let locked = game::Entity::update_many()
            .set(game::ActiveModel {
                status: Set(GameStatus::Registration),
                ..Default::default()
            })
            .filter(game::Column::Id.eq(game.id))
            .filter(game::Column::Status.eq(GameStatus::Registration))
            .exec(&txn)
            .await?;

        if locked.rows_affected == 0 {
            txn.rollback().await?;
            return Err(SantaError::NotFound {
                chat_id: game.chat_id,
            });
        }

        let user_id = participant.user_id;
        let model = participant::ActiveModel {
            game_id: Set(game.id),
            user_id: Set(user_id),
            display_name: Set(participant.display_name),
            handle: Set(participant.handle),
            ..Default::default()
        };

        let inserted = match model.insert(&txn).await {
            Ok(m) => m,
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await?;
                return Err(SantaError::AlreadyJoined {
                    game_id: game.id,
                    user_id,
                });
            }
            Err(e) => return Err(e.into()),
        };

        txn.commit().await?;
        Ok(inserted.into())
    }

    async fn participants(&self, game_id: i64) -> SantaResult<Vec<Participant>> {
        let rows = participant::Entity::find()
            .filter(participant::Column::GameId.eq(game_id))
            .order_by_asc(participant::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Participant::from).collect())
    }

    async fn complete_game(
        &self,
        game: &Game,
        started_at: i64,
        assignments: &[Assignment],
    ) -> SantaResult<Game> {
        let txn = self.db.begin().await?;

        // 先翻转状态：只有仍在报名中的游戏会被更新，并发触发时只有一方成功
        let flipped = game::Entity::update_many()
            .set(game::ActiveModel {
                status: Set(GameStatus::Completed),
                started_at: Set(Some(started_at)),
                ..Default::default()
            })
            .filter(game::Column::Id.eq(game.id))
            .filter(game::Column::Status.eq(GameStatus::Registration))
            .exec(&txn)
            .await?;

        if flipped.rows_affected == 0 {
            txn.rollback().await?;
            return Err(SantaError::NotFound {
                chat_id: game.chat_id,
            });
        }

        // 状态翻转后参与者名单不会再变，核对配对覆盖了所有人
        let roster: HashSet<i64> = participant::Entity::find()
            .filter(participant::Column::GameId.eq(game.id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        let givers: HashSet<i64> = assignments.iter().map(|a| a.giver_user_id).collect();

        if roster != givers || givers.len() != assignments.len() {
            txn.rollback().await?;
            return Err(SantaError::ParticipantsChanged { game_id: game.id });
        }

        if !assignments.is_empty() {
            let rows = assignments.iter().map(|a| assignment::ActiveModel {
                game_id: Set(game.id),
                giver_user_id: Set(a.giver_user_id),
                receiver_user_id: Set(a.receiver_user_id),
                ..Default::default()
            });
            assignment::Entity::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;

        Ok(Game {
            status: GameStatus::Completed,
            started_at: Some(started_at),
            ..game.clone()
        })
    }

    async fn assignments(&self, game_id: i64) -> SantaResult<Vec<Assignment>> {
        let rows = assignment::Entity::find()
            .filter(assignment::Column::GameId.eq(game_id))
            .order_by_asc(assignment::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Assignment::from).collect())
    }
}
