//! 圣诞交换礼物的三张表：游戏、参与者、分配结果

pub mod game {
    use sea_orm::entity::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
    pub enum GameStatus {
        #[sea_orm(string_value = "registration")]
        Registration,
        #[sea_orm(string_value = "completed")]
        Completed,
    }

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "santa_game")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub chat_id: i64,
        pub status: GameStatus,
        pub created_at: i64,
        pub started_at: Option<i64>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::participant::Entity")]
        Participant,
        #[sea_orm(has_many = "super::assignment::Entity")]
        Assignment,
    }

    impl Related<super::participant::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Participant.def()
        }
    }

    impl Related<super::assignment::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Assignment.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod participant {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "santa_participant")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub game_id: i64,
        pub user_id: i64,
        pub display_name: String,
        pub handle: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::game::Entity",
            from = "Column::GameId",
            to = "super::game::Column::Id",
            on_delete = "Cascade"
        )]
        Game,
    }

    impl Related<super::game::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Game.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod assignment {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "santa_assignment")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub game_id: i64,
        pub giver_user_id: i64,
        pub receiver_user_id: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::game::Entity",
            from = "Column::GameId",
            to = "super::game::Column::Id",
            on_delete = "Cascade"
        )]
        Game,
    }

    impl Related<super::game::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Game.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}
