pub mod command;
pub mod parse;

use crate::{
    disk::init::{perform_disk_initialization, BootConfig},
    fs::{error::FileSystemError, FileSystem},
    shell::{
        command::{execute_command, Command},
        parse::parse_command,
    },
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{error::Error, io::stdout, path::PathBuf, sync::mpsc, thread};

/// 后台挂载线程发给前台的启动进度
pub enum BootProgress {
    Step(&'static str),
    Progress(u64),
    Finished(Result<FileSystem, FileSystemError>),
}

const COMMANDS: &[&str] = &[
    "help", "parts", "mount", "info", "format", "ls", "cd", "pwd", "stat", "touch", "open",
    "close", "read", "write", "lseek", "fds", "mkdir", "exit",
];

pub fn start_shell() -> Result<(), Box<dyn Error>> {
    let mut fs = boot_animation(BootConfig::from_env())?;

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
    let mut current_dir = String::from("/");

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    let mut line_editor = build_line_editor();

    loop {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!(
                "{}@{}:{}",
                username.green().bold(),
                hostname.cyan().bold(),
                current_dir.blue()
            )),
            DefaultPromptSegment::Basic(fs.current().info.name.bright_blue().bold().to_string()),
        );

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut fs, &mut current_dir) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command or bad arguments. Type 'help' for command list."
                            .yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting SectorFS...".yellow());
                break;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    println!("{}", "GoodBye!".bright_yellow());
    Ok(())
}

fn build_line_editor() -> Reedline {
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sectorfs_history");

    let commands: Vec<String> = COMMANDS.iter().map(|c| c.to_string()).collect();
    let completer = DefaultCompleter::new_with_wordlen(commands, 2);
    let line_editor = Reedline::create().with_completer(Box::new(completer));

    // 历史文件打不开时仍然可以用，只是不保存历史
    match FileBackedHistory::with_file(100, history_path.clone()) {
        Ok(history) => line_editor.with_history(Box::new(history)),
        Err(e) => {
            warn!("history disabled, {}: {}", history_path.display(), e);
            line_editor
        }
    }
}

/// 启动动画，进度条由后台挂载线程驱动
fn boot_animation(config: BootConfig) -> Result<FileSystem, Box<dyn Error>> {
    let mut stdout = stdout();

    execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    println!("{}", "[SectorFS Booting...]".bright_yellow().bold());

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    );

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || perform_disk_initialization(config, tx));

    let mut mounted = None;
    for msg in rx.iter() {
        match msg {
            BootProgress::Step(step) => pb.println(step),
            BootProgress::Progress(pos) => pb.set_position(pos),
            BootProgress::Finished(result) => {
                mounted = Some(result);
                break;
            }
        }
    }
    if worker.join().is_err() {
        pb.abandon_with_message("💥 disk worker panicked");
        return Err("disk initialization thread panicked".into());
    }

    let fs = match mounted {
        Some(Ok(fs)) => fs,
        Some(Err(e)) => {
            pb.abandon_with_message("❌ Boot failed");
            return Err(Box::new(e));
        }
        None => return Err("disk initialization ended without a result".into()),
    };
    pb.println("📁 Loading shell...");
    pb.finish_with_message("✅ Ready!");

    execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!(
            "Welcome to SectorFS v{}, partition {} mounted\n",
            env!("CARGO_PKG_VERSION"),
            fs.current().info.name
        )),
        ResetColor
    )?;
    Ok(fs)
}
