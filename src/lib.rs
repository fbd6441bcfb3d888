// 秘密圣诞老人 Bot
//
// 架构：OneBot 适配器 | 插件流水线 | SeaORM 持久化

pub mod adapters;
pub mod command;
pub mod config;
pub mod db;
pub mod event;
pub mod log;
pub mod matcher;
pub mod message;
pub mod plugins;
