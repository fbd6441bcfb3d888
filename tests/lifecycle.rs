mod common;

use async_trait::async_trait;
use common::{RecordingMessenger, memory_db};
use santa_bot::plugins::secret_santa::dispatch::dispatch;
use santa_bot::plugins::secret_santa::error::{SantaError, SantaResult};
use santa_bot::plugins::secret_santa::lifecycle::LifecycleManager;
use santa_bot::plugins::secret_santa::model::{
    Assignment, Game, GameStatus, NewParticipant, Participant,
};
use santa_bot::plugins::secret_santa::registry::Registry;
use santa_bot::plugins::secret_santa::store::{SantaStore, SeaOrmStore};
use sea_orm::DbErr;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

const C1: i64 = 1001;
const C2: i64 = 1002;

async fn setup() -> (Arc<dyn SantaStore>, LifecycleManager, Registry) {
    let store: Arc<dyn SantaStore> = Arc::new(SeaOrmStore::new(memory_db().await));
    (
        store.clone(),
        LifecycleManager::new(store.clone()),
        Registry::new(store),
    )
}

fn user(id: i64, name: &str) -> NewParticipant {
    NewParticipant::new(id, name, None)
}

#[tokio::test]
async fn full_round_in_one_chat() {
    let (store, lifecycle, registry) = setup().await;

    let game = lifecycle.create_game(C1).await.unwrap();
    assert_eq!(game.status, GameStatus::Registration);
    assert_eq!(game.started_at, None);

    registry.join(C1, user(1, "U1")).await.unwrap();
    let err = registry.join(C1, user(1, "U1")).await.unwrap_err();
    assert!(matches!(err, SantaError::AlreadyJoined { user_id: 1, .. }));
    registry.join(C1, user(2, "U2")).await.unwrap();

    let listed: Vec<i64> = registry
        .list_participants(C1)
        .await
        .unwrap()
        .iter()
        .map(|p| p.user_id)
        .collect();
    assert_eq!(listed, vec![1, 2]);

    let batch = lifecycle.trigger_assignment(C1).await.unwrap();
    assert_eq!(batch.game.status, GameStatus::Completed);
    assert!(batch.game.started_at.is_some());

    let mut pairs = batch.assignments();
    pairs.sort_by_key(|a| a.giver_user_id);
    assert_eq!(
        pairs,
        vec![
            Assignment {
                giver_user_id: 1,
                receiver_user_id: 2
            },
            Assignment {
                giver_user_id: 2,
                receiver_user_id: 1
            },
        ]
    );

    let stored = store.find_game(game.id).await.unwrap().unwrap();
    assert_eq!(stored.status, GameStatus::Completed);
    assert_eq!(store.assignments(game.id).await.unwrap().len(), 2);

    let messenger = RecordingMessenger::default();
    let report = dispatch(&messenger, &batch).await;
    assert_eq!(report.delivered, 2);
    assert_eq!(messenger.private_recipients(), vec![1, 2]);
}

#[tokio::test]
async fn trigger_without_game_is_not_found() {
    let (_, lifecycle, _) = setup().await;
    let err = lifecycle.trigger_assignment(C2).await.unwrap_err();
    assert!(matches!(err, SantaError::NotFound { chat_id: C2 }));
}

#[tokio::test]
async fn second_create_conflicts() {
    let (_, lifecycle, _) = setup().await;
    lifecycle.create_game(C1).await.unwrap();
    let err = lifecycle.create_game(C1).await.unwrap_err();
    assert!(matches!(err, SantaError::Conflict { chat_id: C1 }));

    // 其他群不受影响
    lifecycle.create_game(C2).await.unwrap();
}

#[tokio::test]
async fn storage_index_rejects_second_open_game() {
    let (store, _, _) = setup().await;
    store.insert_game(C1, 0).await.unwrap();
    let err = store.insert_game(C1, 0).await.unwrap_err();
    assert!(matches!(err, SantaError::Conflict { chat_id: C1 }));
}

#[tokio::test]
async fn concurrent_creates_yield_one_game() {
    let (store, _, _) = setup().await;
    let a = LifecycleManager::new(store.clone());
    let b = LifecycleManager::new(store.clone());

    let (ra, rb) = tokio::join!(a.create_game(C1), b.create_game(C1));
    let successes = [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1);
    for result in [ra, rb] {
        if let Err(e) = result {
            assert!(matches!(e, SantaError::Conflict { .. }));
        }
    }
}

#[tokio::test]
async fn join_and_list_need_open_game() {
    let (_, _, registry) = setup().await;
    assert!(matches!(
        registry.join(C1, user(1, "U1")).await,
        Err(SantaError::NotFound { .. })
    ));
    assert!(matches!(
        registry.list_participants(C1).await,
        Err(SantaError::NotFound { .. })
    ));
}

#[tokio::test]
async fn empty_game_lists_nobody() {
    let (_, lifecycle, registry) = setup().await;
    lifecycle.create_game(C1).await.unwrap();
    assert!(registry.list_participants(C1).await.unwrap().is_empty());
}

#[tokio::test]
async fn one_participant_is_not_enough() {
    let (_, lifecycle, registry) = setup().await;
    lifecycle.create_game(C1).await.unwrap();
    registry.join(C1, user(1, "U1")).await.unwrap();

    let err = lifecycle.trigger_assignment(C1).await.unwrap_err();
    assert!(matches!(
        err,
        SantaError::InsufficientParticipants { count: 1 }
    ));

    // 游戏仍可继续报名
    registry.join(C1, user(2, "U2")).await.unwrap();
    lifecycle.trigger_assignment(C1).await.unwrap();
}

#[tokio::test]
async fn game_completes_exactly_once() {
    let (store, lifecycle, registry) = setup().await;
    let game = lifecycle.create_game(C1).await.unwrap();
    for id in 1..=5 {
        registry.join(C1, user(id, "U")).await.unwrap();
    }

    let batch = lifecycle.trigger_assignment(C1).await.unwrap();
    assert_eq!(batch.pairs.len(), 5);

    let err = lifecycle.trigger_assignment(C1).await.unwrap_err();
    assert!(matches!(err, SantaError::NotFound { chat_id: C1 }));

    let stored = store.assignments(game.id).await.unwrap();
    assert_eq!(stored.len(), 5);
    let givers: HashSet<i64> = stored.iter().map(|a| a.giver_user_id).collect();
    let receivers: HashSet<i64> = stored.iter().map(|a| a.receiver_user_id).collect();
    assert_eq!(givers.len(), 5);
    assert_eq!(receivers.len(), 5);
    assert!(stored.iter().all(|a| a.giver_user_id != a.receiver_user_id));

    // 结束后可以再开新的一局
    let next = lifecycle.create_game(C1).await.unwrap();
    assert_ne!(next.id, game.id);
}

#[tokio::test]
async fn stale_completion_writes_nothing() {
    let (store, lifecycle, registry) = setup().await;
    let game = lifecycle.create_game(C1).await.unwrap();
    registry.join(C1, user(1, "U1")).await.unwrap();
    registry.join(C1, user(2, "U2")).await.unwrap();
    lifecycle.trigger_assignment(C1).await.unwrap();

    // 用过期的游戏快照再次提交
    let extra = [Assignment {
        giver_user_id: 1,
        receiver_user_id: 2,
    }];
    let err = store.complete_game(&game, 0, &extra).await.unwrap_err();
    assert!(matches!(err, SantaError::NotFound { chat_id: C1 }));
    assert_eq!(store.assignments(game.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn join_after_trigger_is_rejected() {
    let (store, lifecycle, registry) = setup().await;
    lifecycle.create_game(C1).await.unwrap();
    registry.join(C1, user(1, "U1")).await.unwrap();
    registry.join(C1, user(2, "U2")).await.unwrap();

    // 用户 3 已查到报名中的游戏，写入前分配完成
    let seen = store.find_open_game(C1).await.unwrap().unwrap();
    lifecycle.trigger_assignment(C1).await.unwrap();

    let err = store
        .insert_participant(&seen, user(3, "U3"))
        .await
        .unwrap_err();
    assert!(matches!(err, SantaError::NotFound { chat_id: C1 }));

    let game = store.find_game(seen.id).await.unwrap().unwrap();
    assert_eq!(game.status, GameStatus::Completed);
    assert_eq!(store.participants(seen.id).await.unwrap().len(), 2);
    assert_eq!(store.assignments(seen.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn completion_with_stale_roster_rolls_back() {
    let (store, lifecycle, registry) = setup().await;
    let game = lifecycle.create_game(C1).await.unwrap();
    for id in 1..=3 {
        registry.join(C1, user(id, "U")).await.unwrap();
    }

    // 只覆盖了前两人的配对
    let stale = [
        Assignment {
            giver_user_id: 1,
            receiver_user_id: 2,
        },
        Assignment {
            giver_user_id: 2,
            receiver_user_id: 1,
        },
    ];
    let err = store.complete_game(&game, 0, &stale).await.unwrap_err();
    assert!(matches!(err, SantaError::ParticipantsChanged { .. }));

    let reloaded = store.find_game(game.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, GameStatus::Registration);
    assert!(store.assignments(game.id).await.unwrap().is_empty());
}

/// 在第一次提交分配前插入一名迟到的参与者
struct LateJoinStore {
    inner: SeaOrmStore,
    late: Mutex<Option<NewParticipant>>,
}

#[async_trait]
impl SantaStore for LateJoinStore {
    async fn find_open_game(&self, chat_id: i64) -> SantaResult<Option<Game>> {
        self.inner.find_open_game(chat_id).await
    }

    async fn find_game(&self, game_id: i64) -> SantaResult<Option<Game>> {
        self.inner.find_game(game_id).await
    }

    async fn insert_game(&self, chat_id: i64, created_at: i64) -> SantaResult<Game> {
        self.inner.insert_game(chat_id, created_at).await
    }

    async fn insert_participant(
        &self,
        game: &Game,
        participant: NewParticipant,
    ) -> SantaResult<Participant> {
        self.inner.insert_participant(game, participant).await
    }

    async fn participants(&self, game_id: i64) -> SantaResult<Vec<Participant>> {
        self.inner.participants(game_id).await
    }

    async fn complete_game(
        &self,
        game: &Game,
        started_at: i64,
        assignments: &[Assignment],
    ) -> SantaResult<Game> {
        let late = self.late.lock().unwrap().take();
        if let Some(participant) = late {
            self.inner.insert_participant(game, participant).await?;
        }
        self.inner.complete_game(game, started_at, assignments).await
    }

    async fn assignments(&self, game_id: i64) -> SantaResult<Vec<Assignment>> {
        self.inner.assignments(game_id).await
    }
}

#[tokio::test]
async fn trigger_repairs_when_someone_joins_midway() {
    let store = Arc::new(LateJoinStore {
        inner: SeaOrmStore::new(memory_db().await),
        late: Mutex::new(Some(user(3, "U3"))),
    });
    let lifecycle = LifecycleManager::new(store.clone());
    let registry = Registry::new(store.clone());

    let game = lifecycle.create_game(C1).await.unwrap();
    registry.join(C1, user(1, "U1")).await.unwrap();
    registry.join(C1, user(2, "U2")).await.unwrap();

    let batch = lifecycle.trigger_assignment(C1).await.unwrap();
    assert_eq!(batch.pairs.len(), 3);

    let stored = store.assignments(game.id).await.unwrap();
    let givers: HashSet<i64> = stored.iter().map(|a| a.giver_user_id).collect();
    let receivers: HashSet<i64> = stored.iter().map(|a| a.receiver_user_id).collect();
    assert_eq!(givers, HashSet::from([1, 2, 3]));
    assert_eq!(receivers, HashSet::from([1, 2, 3]));
}

#[tokio::test]
async fn partial_delivery_is_reported() {
    let (_, lifecycle, registry) = setup().await;
    lifecycle.create_game(C1).await.unwrap();
    for id in 1..=4 {
        registry.join(C1, user(id, &format!("U{}", id))).await.unwrap();
    }
    let batch = lifecycle.trigger_assignment(C1).await.unwrap();

    let messenger = RecordingMessenger::failing_for(&[3]);
    let report = dispatch(&messenger, &batch).await;

    assert_eq!(report.total, 4);
    assert_eq!(report.delivered, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0.user_id, 3);
    assert_eq!(messenger.private_recipients(), vec![1, 2, 4]);
}

/// 所有操作都失败的存储
struct BrokenStore;

fn broken<T>() -> SantaResult<T> {
    Err(SantaError::Store(DbErr::Custom("connection reset".to_string())))
}

#[async_trait]
impl SantaStore for BrokenStore {
    async fn find_open_game(&self, _chat_id: i64) -> SantaResult<Option<Game>> {
        broken()
    }

    async fn find_game(&self, _game_id: i64) -> SantaResult<Option<Game>> {
        broken()
    }

    async fn insert_game(&self, _chat_id: i64, _created_at: i64) -> SantaResult<Game> {
        broken()
    }

    async fn insert_participant(
        &self,
        _game: &Game,
        _participant: NewParticipant,
    ) -> SantaResult<Participant> {
        broken()
    }

    async fn participants(&self, _game_id: i64) -> SantaResult<Vec<Participant>> {
        broken()
    }

    async fn complete_game(
        &self,
        _game: &Game,
        _started_at: i64,
        _assignments: &[Assignment],
    ) -> SantaResult<Game> {
        broken()
    }

    async fn assignments(&self, _game_id: i64) -> SantaResult<Vec<Assignment>> {
        broken()
    }
}

#[tokio::test]
async fn store_failures_surface_as_store_errors() {
    let store: Arc<dyn SantaStore> = Arc::new(BrokenStore);
    let lifecycle = LifecycleManager::new(store.clone());
    let registry = Registry::new(store);

    assert!(matches!(
        lifecycle.create_game(C1).await,
        Err(SantaError::Store(_))
    ));
    assert!(matches!(
        lifecycle.trigger_assignment(C1).await,
        Err(SantaError::Store(_))
    ));
    assert!(matches!(
        registry.join(C1, user(1, "U1")).await,
        Err(SantaError::Store(_))
    ));
}
