//! `hrdesk chat`: Interactive terminal chat.

use std::io::Write;
use std::path::Path;

use hrdesk_chat::TurnOutcome;
use hrdesk_chat::turn::submit_error_message;
use hrdesk_core::{History, NoticeLevel, Role};
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let runtime = super::bootstrap(config)?;
    let display_limit = runtime.config.chat.display_history_limit;

    println!();
    println!("  🤖 Trợ lý AI Hỏi Đáp Nhân Sự INNO");
    println!("  Hỏi đáp dựa trên dữ liệu nội bộ (JSON)");
    println!();
    for notice in runtime.diagnostics.notices() {
        let icon = match notice.level {
            NoticeLevel::Success => "✅",
            NoticeLevel::Info => "ℹ️ ",
            NoticeLevel::Error => "❌",
        };
        println!("  {icon} {}", notice.text);
    }
    println!();
    println!("  Type your question and press Enter.");
    println!("  '/history' shows recent messages, 'exit' quits.");
    println!();

    let mut history = History::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  Bạn > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        match question {
            "" => continue,
            "exit" | "quit" => break,
            "/history" => {
                print_window(&history, display_limit);
                continue;
            }
            _ => {}
        }

        eprint!("  🔍 Đang tìm kiếm câu trả lời với {}...", runtime.config.provider.model);
        let mut printed = 0usize;

        let outcome = runtime
            .engine
            .ask(&mut history, question, |answer| {
                if printed == 0 {
                    eprint!("\r\x1b[2K");
                    print!("  AI  > ");
                }
                print!("{}", &answer[printed..]);
                printed = answer.len();
                let _ = std::io::stdout().flush();
            })
            .await;

        if printed == 0 {
            eprint!("\r\x1b[2K");
        }

        match outcome {
            TurnOutcome::Completed { answer } => {
                if answer.is_empty() {
                    print!("  AI  > ");
                }
                println!("\n");
            }
            TurnOutcome::StreamError { answer, error } => {
                println!("{}\n", &answer[printed..]);
                eprintln!("  🚨 Lỗi trong quá trình nhận phản hồi: {error}\n");
            }
            TurnOutcome::SubmitError(e) => eprintln!("  {}\n", submit_error_message(&e)),
            TurnOutcome::Duplicate => eprintln!("  (câu hỏi vừa được gửi, bỏ qua)\n"),
            TurnOutcome::Blank => {}
        }
    }

    println!("  Goodbye!");
    Ok(())
}

fn print_window(history: &History, limit: usize) {
    println!();
    println!("  ### Lịch sử trò chuyện");
    for message in history.recent_window(limit) {
        let who = match message.role {
            Role::User => "Bạn",
            Role::Assistant => "AI ",
        };
        println!("  {who} > {}", message.content);
    }
    println!();
}
