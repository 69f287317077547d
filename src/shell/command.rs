use colored::*;
use dialoguer::Confirm;
use std::{error::Error, io::SeekFrom};

use crate::{
    fs::{
        directory::FileType,
        error::FileSystemError,
        file::{OpenFlags, MAX_FILE_SIZE},
        FileSystem,
    },
    shell::parse::resolve_path,
};

#[derive(Debug)]
pub enum Command {
    Help,
    Parts,
    Mount(String),
    Info,
    Format,
    Ls(Option<String>),
    Cd(String),
    Pwd,
    Stat(String),
    Touch(String),
    Open(String, OpenFlags),
    Close(usize),
    Read(usize, Option<usize>),
    Write(usize, String),
    Lseek(usize, SeekFrom),
    Fds,
    Mkdir(String),
    Exit,
}

pub fn execute_command(
    cmd: &Command,
    fs: &mut FileSystem,
    current_dir: &mut String,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Parts => {
            let mounted = fs.current().info.name.clone();
            for part in fs.partitions() {
                let marker = if part.name == mounted { "*" } else { " " };
                println!(
                    "{} {:<6} start {:>6}  sectors {:>6}",
                    marker.green().bold(),
                    part.name.cyan(),
                    part.start_lba,
                    part.sec_cnt
                );
            }
        }
        Command::Mount(name) => {
            fs.mount(name)?;
            *current_dir = "/".to_string();
            println!("🔌 Mounted {}", name.green());
        }
        Command::Info => print_info(fs),
        Command::Format => {
            let name = fs.current().info.name.clone();
            let confirmed = Confirm::new()
                .with_prompt(format!("Erase every file on {}?", name))
                .default(false)
                .interact()?;
            if confirmed {
                fs.format_current()?;
                *current_dir = "/".to_string();
                println!("💾 {} formatted", name.green());
            } else {
                println!("{}", "Format cancelled".bright_black());
            }
        }
        Command::Ls(path) => {
            let target = match path {
                Some(p) => resolve_path(current_dir, p),
                None => current_dir.clone(),
            };
            let mut dir = fs.open_dir(&target)?;
            let mut entries = Vec::new();
            let listed = loop {
                match fs.read_dir(&mut dir) {
                    Ok(Some(entry)) => entries.push(entry),
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                }
            };
            fs.close_dir(dir);
            listed?;

            for entry in entries {
                let icon = match entry.f_type {
                    FileType::Directory => "📁",
                    FileType::Regular => "📄",
                    FileType::Unknown => "❔",
                };
                let name = entry.name();
                let name = if entry.f_type == FileType::Directory {
                    name.blue().bold()
                } else {
                    name.normal()
                };
                println!("{}  {:>5}  {}", icon, entry.i_no.to_string().bright_black(), name);
            }
        }
        Command::Cd(path) => {
            let target = resolve_path(current_dir, path);
            let stat = fs.stat(&target)?;
            if stat.file_type != FileType::Directory {
                return Err(Box::new(FileSystemError::NotADirectory(target)));
            }
            *current_dir = target;
            println!("📂 Moved to {}", current_dir.blue());
        }
        Command::Pwd => println!("📍 {}", current_dir.cyan()),
        Command::Stat(path) => {
            let target = resolve_path(current_dir, path);
            let stat = fs.stat(&target)?;
            println!(
                "{}\n{}: {}\n{}: {:?}\n{}: {}\n{}: {} bytes\n",
                "📊 File Info".bright_yellow().bold(),
                "Path".blue(),
                target,
                "Type".blue(),
                stat.file_type,
                "Inode".blue(),
                stat.inode_no,
                "Size".blue(),
                stat.size
            );
        }
        Command::Touch(path) => {
            let target = resolve_path(current_dir, path);
            let fd = fs.open(&target, OpenFlags::CREAT)?;
            fs.close(fd)?;
            println!("📝 Created file: {}", target.green());
        }
        Command::Open(path, flags) => {
            let target = resolve_path(current_dir, path);
            let fd = fs.open(&target, *flags)?;
            println!("🔓 {} opened as fd {}", target.green(), fd.to_string().bold());
        }
        Command::Close(fd) => {
            fs.close(*fd)?;
            println!("🔒 Closed fd {}", fd);
        }
        Command::Read(fd, len) => {
            let mut buf = vec![0u8; len.unwrap_or(MAX_FILE_SIZE)];
            let n = fs.read(*fd, &mut buf)?;
            println!("{}", String::from_utf8_lossy(&buf[..n]));
            println!("{}", format!("({} bytes)", n).bright_black());
        }
        Command::Write(fd, text) => {
            let n = fs.write(*fd, text.as_bytes())?;
            println!("✏️  Wrote {} bytes to fd {}", n.to_string().green(), fd);
        }
        Command::Lseek(fd, pos) => {
            let at = fs.lseek(*fd, *pos)?;
            println!("📍 fd {} now at byte {}", fd, at.to_string().cyan());
        }
        Command::Fds => {
            let mut any = false;
            for (fd, file) in fs.open_files() {
                any = true;
                println!(
                    "{:>3}  inode {:>5}  pos {:>6}  {:?}",
                    fd.to_string().bold(),
                    file.inode_no,
                    file.fd_pos,
                    file.flags
                );
            }
            if !any {
                println!("{}", "(no open files)".bright_black());
            }
        }
        Command::Mkdir(path) => {
            let target = resolve_path(current_dir, path);
            let inode_no = fs.mkdir(&target)?;
            println!("✅ Created directory: {} (inode {})", target.green(), inode_no);
        }
        Command::Exit => println!("{}", "👋 Exiting SectorFS shell...".yellow().bold()),
    }

    Ok(())
}

fn print_info(fs: &FileSystem) {
    let sb = fs.super_block();
    let (free_inodes, free_blocks) = fs.free_counts();
    println!(
        "{} {}",
        "💽 Partition".bright_yellow().bold(),
        fs.current().info.name.cyan()
    );
    println!("  magic            {:#x}", sb.magic);
    println!("  sectors          {} from lba {}", sb.sec_cnt, sb.part_lba_base);
    println!("  inodes           {} ({} free)", sb.inode_cnt, free_inodes);
    println!(
        "  block bitmap     lba {} ({} sectors)",
        sb.block_bitmap_lba, sb.block_bitmap_sects
    );
    println!(
        "  inode bitmap     lba {} ({} sectors)",
        sb.inode_bitmap_lba, sb.inode_bitmap_sects
    );
    println!(
        "  inode table      lba {} ({} sectors)",
        sb.inode_table_lba, sb.inode_table_sects
    );
    println!("  data start       lba {} ({} blocks free)", sb.data_start_lba, free_blocks);
    println!("  open inodes      {}", fs.current().open_inode_count());
}

fn print_help() {
    println!("{}", "📘 SectorFS Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  parts              List partitions, * marks the mounted one
  mount <name>       Mount another partition
  info               Show super block of the mounted partition
  format             Format the mounted partition
  ls [dir]           List directory entries
  cd [dir]           Change directory
  pwd                Print current path
  stat <path>        Show file info
  touch <file>       Create an empty file
  open <file> [r|w|rw]  Open a file and print its descriptor
  close <fd>         Close a descriptor
  read <fd> [n]      Read up to n bytes (default: to end of file)
  write <fd> <text>  Write text at the current position
  lseek <fd> <off> [set|cur|end]  Move the read/write position
  fds                List open descriptors
  mkdir <dir>        Create directory
  help               Show this help message
  exit               Quit the shell
"
        .bright_black()
    );
}
