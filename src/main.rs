use anyhow::Context as _;
use santa_bot::adapters::{self, Messenger, console::ConsoleMessenger};
use santa_bot::config::AppConfig;
use santa_bot::event::{Context, EventType};
use santa_bot::{db, log, plugins};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{error, info};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // 1. 加载配置，缺失的插件配置段会被补全
    let mut config = AppConfig::load_or_init(Path::new(CONFIG_PATH), plugins::default_configs())
        .await
        .with_context(|| format!("无法加载配置文件 {}", CONFIG_PATH))?;
    config.apply_env(
        std::env::var("SANTA_BOT_TOKEN").ok(),
        std::env::var("SANTA_DATABASE_URL").ok(),
    );

    log::init(&config.log_level);

    // 2. 配置错误直接终止启动
    if let Err(e) = config.validate() {
        error!(target: "Config", "{}", e);
        return Err(e).context("配置校验失败");
    }

    // 3. 连接数据库
    let db = db::init(&config.database.url)
        .await
        .context("数据库连接失败")?;

    let bots: Vec<_> = config.bots.iter().filter(|b| b.enabled).cloned().collect();
    let config = Arc::new(RwLock::new(config));

    // 4. 插件初始化 (建表等)
    let init_ctx = Context {
        event: EventType::Init,
        config: config.clone(),
        db: db.clone(),
        messenger: Arc::new(ConsoleMessenger) as Arc<dyn Messenger>,
    };
    plugins::do_init(init_ctx)
        .await
        .map_err(|e| anyhow::anyhow!("插件初始化失败: {}", e))?;

    // 5. 启动适配器，每个 Bot 一个任务
    // 协议已在 validate 中校验
    for (bot, adapter) in bots
        .into_iter()
        .filter_map(|b| adapters::find_adapter(&b.protocol).map(|a| (b, a)))
    {
        info!(target: "System", "启动 Bot: {}", bot.protocol);
        tokio::spawn((adapter.handler)(bot, config.clone(), db.clone()));
    }

    tokio::signal::ctrl_c().await?;
    info!(target: "System", "收到退出信号，正在关闭...");
    db.close().await.ok();
    Ok(())
}
