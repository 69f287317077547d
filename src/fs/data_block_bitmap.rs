use crate::{
    disk::BlockDevice,
    fs::{
        bitmap::Bitmap,
        error::{BitmapKind, FileSystemError, Result},
    },
};

/// 数据块位图。第 i 位对应绝对扇区 `data_start_lba + i`，
/// 对外的分配/释放接口都使用 LBA。
#[derive(Debug)]
pub struct DataBlockBitmap {
    pub bitmap: Bitmap,
    pub start_lba: u32,      // 位图在磁盘中的起始扇区
    pub data_start_lba: u32, // 数据区第一个扇区
}

impl DataBlockBitmap {
    pub fn new(start_lba: u32, sects: u32, data_start_lba: u32) -> Self {
        Self {
            bitmap: Bitmap::new(sects),
            start_lba,
            data_start_lba,
        }
    }

    pub fn load(
        disk: &dyn BlockDevice,
        start_lba: u32,
        sects: u32,
        data_start_lba: u32,
    ) -> Result<Self> {
        Ok(Self {
            bitmap: Bitmap::load(disk, start_lba, sects)?,
            start_lba,
            data_start_lba,
        })
    }

    /// `lba` 在位图中的下标，不在数据区内返回 None
    pub(crate) fn bit_index(&self, lba: u32) -> Option<usize> {
        lba.checked_sub(self.data_start_lba)
            .map(|idx| idx as usize)
            .filter(|&idx| idx < self.bitmap.bit_len())
    }

    /// 分配一个空闲数据块，返回它的 LBA，不写回磁盘
    pub fn alloc(&mut self) -> Result<u32> {
        let idx = self
            .bitmap
            .scan_free()
            .ok_or(FileSystemError::AllocationExhausted(BitmapKind::Block))?;
        self.bitmap.set(idx, true);
        Ok(self.data_start_lba + idx as u32)
    }

    pub fn free(&mut self, lba: u32) {
        if let Some(idx) = self.bit_index(lba) {
            self.bitmap.set(idx, false);
        }
    }

    /// 数据区以外的 LBA 视为未占用
    pub(crate) fn is_used(&self, lba: u32) -> bool {
        self.bit_index(lba).is_some_and(|idx| self.bitmap.test(idx))
    }

    /// 格式化时超出数据区的位已置 1，所以空闲位数就是空闲块数
    pub fn free_count(&self) -> u32 {
        self.bitmap.count_free() as u32
    }

    /// 写回 `lba` 对应位所在的位图扇区
    pub fn sync(&self, disk: &dyn BlockDevice, lba: u32) -> Result<()> {
        let idx = self.bit_index(lba).ok_or_else(|| {
            FileSystemError::Corrupted(format!("block {:#x} is outside the data area", lba))
        })?;
        self.bitmap.sync_sector(disk, self.start_lba, idx)?;
        Ok(())
    }
}
