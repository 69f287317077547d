use crate::disk::{BlockDevice, SECTOR_SIZE};
use crate::fs::config::BITS_PER_SECTOR;

/// 位图：第 i 位为 1 表示第 i 个资源已被占用。
///
/// 缓冲区总是整扇区长度，和磁盘上的位图区域一一对应。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: Vec<u8>,
}

impl Bitmap {
    /// 创建一个占 `sects` 个扇区、全部空闲的位图
    pub fn new(sects: u32) -> Self {
        Self {
            bits: vec![0; sects as usize * SECTOR_SIZE],
        }
    }

    pub fn bit_len(&self) -> usize {
        self.bits.len() * 8
    }

    /// 首次适配：返回最低的空闲位
    pub fn scan_free(&self) -> Option<usize> {
        self.bits
            .iter()
            .enumerate()
            .find(|(_, byte)| **byte != 0xFF)
            .map(|(byte_index, byte)| byte_index * 8 + byte.trailing_ones() as usize)
    }

    pub fn test(&self, bit_index: usize) -> bool {
        let byte_index = bit_index / 8;
        let bit = bit_index % 8;
        self.bits[byte_index] & (1 << bit) != 0
    }

    pub fn set(&mut self, bit_index: usize, used: bool) {
        let byte_index = bit_index / 8;
        let bit = bit_index % 8;
        if used {
            self.bits[byte_index] |= 1 << bit;
        } else {
            self.bits[byte_index] &= !(1 << bit);
        }
    }

    pub fn count_free(&self) -> usize {
        self.bits.iter().map(|b| b.count_zeros() as usize).sum()
    }

    /// 从磁盘读入整个位图区域
    pub fn load(disk: &dyn BlockDevice, start_lba: u32, sects: u32) -> std::io::Result<Self> {
        let mut bitmap = Self::new(sects);
        disk.read_sectors(start_lba, &mut bitmap.bits)?;
        Ok(bitmap)
    }

    /// 写回整个位图区域，只在格式化时使用
    pub fn write_all(&self, disk: &dyn BlockDevice, start_lba: u32) -> std::io::Result<()> {
        disk.write_sectors(start_lba, &self.bits)
    }

    /// 只把 `bit_index` 所在的那一个扇区写回磁盘
    pub fn sync_sector(
        &self,
        disk: &dyn BlockDevice,
        start_lba: u32,
        bit_index: usize,
    ) -> std::io::Result<()> {
        let sec_off = bit_index / BITS_PER_SECTOR;
        let byte_off = sec_off * SECTOR_SIZE;
        disk.write_sectors(
            start_lba + sec_off as u32,
            &self.bits[byte_off..byte_off + SECTOR_SIZE],
        )
    }
}
