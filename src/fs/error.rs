use std::fmt;

/// 分配失败的是哪一张位图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapKind {
    Inode,
    Block,
}

/// 文件系统错误类型
#[derive(Debug)]
pub enum FileSystemError {
    Io(std::io::Error),                // 底层 I/O 错误
    AllocationExhausted(BitmapKind),   // 位图中没有空闲位
    DirectoryFull,                     // 目录 140 个块都已用满
    NotFound(String),                  // 文件或目录不存在，带路径
    OutOfMemory,                       // 内存分配失败
    TooManyOpenFiles,                  // 全局打开文件表已满
    AlreadyExists(String),             // 文件或目录已存在，带路径
    NotADirectory(String),             // 期望目录，实际不是
    IsADirectory(String),              // 期望文件，实际是目录
    InvalidPath(String),               // 路径非法
    NameTooLong(String),               // 文件名超过 MAX_FILE_NAME_LEN
    WriteDenied(String),               // 文件正被其他描述符写
    BadDescriptor(usize),              // 文件描述符无效
    PartitionNotFound(String),         // 找不到要挂载的分区
    Busy(String),                      // 还有打开的文件，不能切换或格式化
    InvalidConfig(String),             // 启动时配置检查失败
    Corrupted(String),                 // 磁盘上的结构无法解析
    FileTooLarge(usize),               // 写入后会超过 140 个块
    InvalidSeek(i64),                  // 偏移不在 [0, 文件大小] 之内
}

impl From<std::io::Error> for FileSystemError {
    fn from(e: std::io::Error) -> Self {
        FileSystemError::Io(e)
    }
}

impl From<bincode::Error> for FileSystemError {
    fn from(e: bincode::Error) -> Self {
        FileSystemError::Corrupted(e.to_string())
    }
}

impl fmt::Display for BitmapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inode => write!(f, "inode"),
            Self::Block => write!(f, "block"),
        }
    }
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Disk I/O error: {}", e),
            Self::AllocationExhausted(kind) => write!(f, "No free {} available", kind),
            Self::DirectoryFull => write!(f, "Directory is full"),
            Self::NotFound(path) => write!(f, "File or directory not found: {}", path),
            Self::OutOfMemory => write!(f, "Out of memory"),
            Self::TooManyOpenFiles => write!(f, "Too many open files"),
            Self::AlreadyExists(path) => write!(f, "File or directory already exists: {}", path),
            Self::NotADirectory(path) => write!(f, "Expected a directory, found a file: {}", path),
            Self::IsADirectory(path) => write!(f, "Expected a file, found a directory: {}", path),
            Self::InvalidPath(path) => write!(f, "Invalid path: {}", path),
            Self::NameTooLong(name) => write!(f, "File name too long: {}", name),
            Self::WriteDenied(path) => write!(f, "File is being written elsewhere: {}", path),
            Self::BadDescriptor(fd) => write!(f, "Bad file descriptor: {}", fd),
            Self::PartitionNotFound(name) => write!(f, "Partition not found: {}", name),
            Self::Busy(msg) => write!(f, "File system busy: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Self::Corrupted(desc) => write!(f, "File system corrupted: {}", desc),
            Self::FileTooLarge(end) => {
                write!(f, "File too large: write would end at byte {}", end)
            }
            Self::InvalidSeek(pos) => write!(f, "Invalid seek position: {}", pos),
        }
    }
}

// 支持链式错误，方便追踪底层原因
impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
