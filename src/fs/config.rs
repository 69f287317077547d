use crate::disk::SECTOR_SIZE;

/// 超级块魔数，用于识别分区上是否已有文件系统
pub const FS_MAGIC: u32 = 0x1959_0318;

// 一个扇区能表示的位数
pub const BITS_PER_SECTOR: usize = SECTOR_SIZE * 8;

// 每个分区最多支持的文件数（inode 数）
pub const MAX_FILES_PER_PART: u32 = 4096;

// 根目录的 inode 编号
pub const ROOT_INODE_NO: u32 = 0;

pub const MAX_FILE_NAME_LEN: usize = 16;
pub const MAX_PATH_LEN: usize = 512;

// 12 个直接块 + 1 个一级间接块
pub const DIRECT_BLOCKS: usize = 12;
pub const INODE_SECTOR_SLOTS: usize = DIRECT_BLOCKS + 1;
pub const INDIRECT_SLOTS: usize = SECTOR_SIZE / 4;
pub const MAX_FILE_BLOCKS: usize = DIRECT_BLOCKS + INDIRECT_SLOTS;

// 全局打开文件表容量，前 3 个留给标准输入、输出、错误
pub const MAX_FILE_OPEN: usize = 32;
pub const STD_STREAMS: usize = 3;

/// 启动时默认挂载的分区
pub const DEFAULT_PARTITION: &str = "sdb1";
