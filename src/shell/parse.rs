use std::io::SeekFrom;

use crate::{fs::file::OpenFlags, shell::command::Command};

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "parts" => Some(Command::Parts),
        "mount" => args.first().map(|&name| Command::Mount(name.to_string())),
        "info" => Some(Command::Info),
        "format" => Some(Command::Format),
        "ls" => Some(Command::Ls(args.first().map(|s| s.to_string()))),
        "cd" => Some(Command::Cd(args.first().unwrap_or(&"/").to_string())),
        "pwd" => Some(Command::Pwd),
        "stat" => args.first().map(|&path| Command::Stat(path.to_string())),
        "touch" => args.first().map(|&path| Command::Touch(path.to_string())),
        "open" => {
            let path = args.first()?;
            let flags = parse_mode(args.get(1).copied().unwrap_or("r"))?;
            Some(Command::Open(path.to_string(), flags))
        }
        "close" => args.first()?.parse().ok().map(Command::Close),
        "read" => {
            let fd = args.first()?.parse().ok()?;
            let len = match args.get(1) {
                Some(n) => Some(n.parse().ok()?),
                None => None,
            };
            Some(Command::Read(fd, len))
        }
        "write" => {
            if args.len() >= 2 {
                Some(Command::Write(args[0].parse().ok()?, args[1..].join(" ")))
            } else {
                None
            }
        }
        "lseek" => {
            let fd = args.first()?.parse().ok()?;
            let offset: i64 = args.get(1)?.parse().ok()?;
            let pos = match args.get(2).copied().unwrap_or("set") {
                "set" => SeekFrom::Start(u64::try_from(offset).ok()?),
                "cur" => SeekFrom::Current(offset),
                "end" => SeekFrom::End(offset),
                _ => return None,
            };
            Some(Command::Lseek(fd, pos))
        }
        "fds" => Some(Command::Fds),
        "mkdir" => args.first().map(|&path| Command::Mkdir(path.to_string())),
        "exit" => Some(Command::Exit),
        _ => None,
    }
}

fn parse_mode(mode: &str) -> Option<OpenFlags> {
    match mode {
        "r" => Some(OpenFlags::RDONLY),
        "w" => Some(OpenFlags::WRONLY),
        "rw" => Some(OpenFlags::RDWR),
        _ => None,
    }
}

/// 把用户输入的路径拼到当前目录上，并消掉 `.` 和 `..`
pub fn resolve_path(current_dir: &str, input: &str) -> String {
    let joined = if input.starts_with('/') {
        input.to_string()
    } else {
        format!("{}/{}", current_dir, input)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        assert!(matches!(parse_command("  help "), Some(Command::Help)));
        assert!(matches!(parse_command("mount sdb5"), Some(Command::Mount(n)) if n == "sdb5"));
        assert!(matches!(parse_command("ls"), Some(Command::Ls(None))));
        assert!(matches!(parse_command("ls /usr"), Some(Command::Ls(Some(p))) if p == "/usr"));
        assert!(matches!(parse_command("cd"), Some(Command::Cd(p)) if p == "/"));
        assert!(matches!(parse_command("close 4"), Some(Command::Close(4))));
    }

    #[test]
    fn rejects_missing_or_bad_arguments() {
        assert!(parse_command("").is_none());
        assert!(parse_command("mkdir").is_none());
        assert!(parse_command("close four").is_none());
        assert!(parse_command("open /a x").is_none());
        assert!(parse_command("rm /a").is_none());
    }

    #[test]
    fn open_mode_defaults_to_read_only() {
        match parse_command("open /a") {
            Some(Command::Open(path, flags)) => {
                assert_eq!(path, "/a");
                assert_eq!(flags, OpenFlags::RDONLY);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse_command("open /a rw"),
            Some(Command::Open(_, flags)) if flags == OpenFlags::RDWR
        ));
    }

    #[test]
    fn parses_descriptor_io() {
        assert!(matches!(parse_command("read 3"), Some(Command::Read(3, None))));
        assert!(matches!(parse_command("read 3 16"), Some(Command::Read(3, Some(16)))));
        assert!(matches!(
            parse_command("write 4 hello   there world"),
            Some(Command::Write(4, text)) if text == "hello there world"
        ));
        assert!(matches!(
            parse_command("lseek 3 10"),
            Some(Command::Lseek(3, SeekFrom::Start(10)))
        ));
        assert!(matches!(
            parse_command("lseek 3 -2 end"),
            Some(Command::Lseek(3, SeekFrom::End(-2)))
        ));
        assert!(parse_command("lseek 3 -2").is_none());
        assert!(parse_command("lseek 3 1 sideways").is_none());
        assert!(parse_command("write 4").is_none());
        assert!(parse_command("read x").is_none());
    }

    #[test]
    fn relative_paths_are_joined_and_normalized() {
        assert_eq!(resolve_path("/", "usr"), "/usr");
        assert_eq!(resolve_path("/usr", "bin/ls"), "/usr/bin/ls");
        assert_eq!(resolve_path("/usr/bin", ".."), "/usr");
        assert_eq!(resolve_path("/usr", "../../.."), "/");
        assert_eq!(resolve_path("/usr", "/etc/./hosts"), "/etc/hosts");
        assert_eq!(resolve_path("/", "."), "/");
    }
}
