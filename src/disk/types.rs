/// 每个扇区（Sector）的大小：512 字节
/// 文件系统中一个块就是一个扇区，所有磁盘读写都以扇区为单位。
pub const SECTOR_SIZE: usize = 512;

/// 虚拟磁盘包含的扇区总数：16MB / 512B = 32768 个扇区
pub const DISK_SECTORS: u32 = 16 * 1024 * 1024 / SECTOR_SIZE as u32;

/// 第一个分区的起始 LBA（和 fdisk 一样按 1MB 对齐）
pub const PARTITION_ALIGN_LBA: u32 = 2048;

/// 分区布局：(分区名, 扇区数)，从 PARTITION_ALIGN_LBA 开始首尾相接
pub const PARTITION_LAYOUT: &[(&str, u32)] = &[("sdb1", 16384), ("sdb5", 14336)];

/// 一个扇区的字节数组
pub type Sector = [u8; SECTOR_SIZE];
