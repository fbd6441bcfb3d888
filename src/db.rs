use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

/// 初始化数据库连接
pub async fn init(url: &str) -> Result<DatabaseConnection, DbErr> {
    if let Some(dir) = sqlite_parent_dir(url)
        && !Path::new(dir).exists()
        && let Err(e) = fs::create_dir_all(dir).await
    {
        warn!(target: "Database", "创建数据目录 {} 失败: {}", dir, e);
    }

    let mut options = ConnectOptions::new(url);
    options.sqlx_logging(false);

    let db = Database::connect(options).await?;

    info!(target: "Database", "连接成功: {}", redact(url));

    Ok(db)
}

/// 从 SQLite URL 中取出数据库文件所在目录 (内存库返回 None)
fn sqlite_parent_dir(url: &str) -> Option<&str> {
    let path = url.strip_prefix("sqlite:")?;
    let path = path.trim_start_matches("//");
    let path = path.split('?').next()?;
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Path::new(path)
        .parent()
        .and_then(|p| p.to_str())
        .filter(|p| !p.is_empty())
}

/// 隐藏连接串中的账号密码
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
