//! 面向用户的固定文案

use super::dispatch::DispatchReport;
use super::error::SantaError;
use super::model::Participant;

pub fn help(prefix: &str) -> String {
    format!(
        "🎅 欢迎使用圣诞交换礼物 Bot！\n\n\
         可用指令:\n\
         {p}new_game (新建圣诞) - 新建一局游戏\n\
         {p}join (加入圣诞) - 加入当前游戏\n\
         {p}list (圣诞名单) - 查看参与者\n\
         {p}start_game (开始圣诞) - 开始分配 (至少 2 人)\n\
         {p}instructions (圣诞说明) - 使用说明\n\
         {p}help (圣诞帮助) - 显示本消息",
        p = prefix
    )
}

pub fn instructions(prefix: &str) -> String {
    format!(
        "📌 圣诞交换礼物使用说明\n\n\
         1️⃣ 把 Bot 拉进要玩游戏的群。\n\
         2️⃣ 在群里发送 {p}new_game，Bot 会新建一局游戏。\n\
         3️⃣ 每位参与者在同一个群里发送 {p}join 加入。\n\
         4️⃣ 用 {p}list 查看参与者名单。\n\
         5️⃣ 大家都准备好后发送 {p}start_game 开始分配。\n\n\
         ⚠️ Bot 需要私聊告诉你抽到了谁，请先添加 Bot 为好友或确保它能给你发临时消息。\n\n\
         🎁 祝大家玩得开心，节日快乐！",
        p = prefix
    )
}

pub fn group_only() -> &'static str {
    "这个指令只能在群聊中使用哦。"
}

pub fn game_created(prefix: &str) -> String {
    format!(
        "🎄 新的圣诞交换礼物游戏已创建！\n\
         发送 {p}join 加入游戏\n\
         所有人加入后，发送 {p}start_game 开始分配",
        p = prefix
    )
}

pub fn joined(participant: &Participant) -> String {
    format!("🎁 {} 已加入圣诞交换礼物名单！", participant.display_name)
}

pub fn participant_list(participants: &[Participant], prefix: &str) -> String {
    if participants.is_empty() {
        return format!("还没有人加入，发送 {}join 参加吧", prefix);
    }

    let lines: Vec<String> = participants
        .iter()
        .enumerate()
        .map(|(i, p)| match &p.handle {
            Some(handle) => format!("{}. {} (@{})", i + 1, p.display_name, handle),
            None => format!("{}. {}", i + 1, p.display_name),
        })
        .collect();

    format!("🎅 参与者 ({}):\n\n{}", participants.len(), lines.join("\n"))
}

/// 私聊给送礼人的内容
pub fn gift_notice(receiver: &Participant) -> String {
    format!(
        "🎄 你要为 {} 准备礼物！\n\n节日快乐！",
        receiver.mention()
    )
}

pub fn assignment_summary(report: &DispatchReport) -> String {
    let mut text = format!(
        "✅ 分配完成！\n已私聊通知 {}/{} 位参与者。",
        report.delivered, report.total
    );

    if !report.failures.is_empty() {
        let names: Vec<String> = report
            .failures
            .iter()
            .map(|(p, _)| p.display_name.clone())
            .collect();
        text.push_str(&format!(
            "\n\n⚠️ 以下参与者未能收到私聊: {}\n请先与 Bot 建立私聊，再联系组织者获取结果。",
            names.join("、")
        ));
    }

    text.push_str("\n\n🎅🎁 节日快乐！");
    text
}

/// 将领域错误映射为固定提示，数据库错误只给出笼统提示
pub fn error_message(err: &SantaError, prefix: &str) -> String {
    match err {
        SantaError::Conflict { .. } => {
            format!("这个群已经有一局报名中的游戏了！\n发送 {}join 加入。", prefix)
        }
        SantaError::NotFound { .. } => {
            format!("这个群没有报名中的游戏，发送 {}new_game 新建一局。", prefix)
        }
        SantaError::AlreadyJoined { .. } => "你已经加入这局游戏了！".to_string(),
        SantaError::InsufficientParticipants { .. } => {
            "至少需要 2 名参与者才能开始游戏。".to_string()
        }
        SantaError::ParticipantsChanged { .. } => {
            format!("参与者名单刚刚发生变化，请重新发送 {}start_game。", prefix)
        }
        SantaError::InvalidInput(_) => "参与者名单有误，无法完成分配。".to_string(),
        SantaError::Delivery { .. } => "私聊消息发送失败。".to_string(),
        SantaError::Store(_) => "操作失败，请稍后再试。".to_string(),
    }
}
