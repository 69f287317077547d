use crate::{
    disk::BlockDevice,
    fs::{
        bitmap::Bitmap,
        error::{BitmapKind, FileSystemError, Result},
    },
};

/// inode 位图，第 i 位对应 inode 表中第 i 个槽位
#[derive(Debug)]
pub struct InodeBitmap {
    pub bitmap: Bitmap,
    pub start_lba: u32, // 位图在磁盘上的起始扇区
    pub capacity: u32,  // inode 总数，超出部分的位永远不分配
}

impl InodeBitmap {
    pub fn new(start_lba: u32, sects: u32, capacity: u32) -> Self {
        Self {
            bitmap: Bitmap::new(sects),
            start_lba,
            capacity,
        }
    }

    pub fn load(disk: &dyn BlockDevice, start_lba: u32, sects: u32, capacity: u32) -> Result<Self> {
        Ok(Self {
            bitmap: Bitmap::load(disk, start_lba, sects)?,
            start_lba,
            capacity,
        })
    }

    /// 分配一个空闲 inode 并置位，不写回磁盘
    pub fn alloc(&mut self) -> Result<u32> {
        match self.bitmap.scan_free() {
            Some(idx) if idx < self.capacity as usize => {
                self.bitmap.set(idx, true);
                Ok(idx as u32)
            }
            _ => Err(FileSystemError::AllocationExhausted(BitmapKind::Inode)),
        }
    }

    pub fn free(&mut self, inode_no: u32) {
        if inode_no < self.capacity {
            self.bitmap.set(inode_no as usize, false);
        }
    }

    pub fn is_used(&self, inode_no: u32) -> bool {
        self.bitmap.test(inode_no as usize)
    }

    pub fn free_count(&self) -> u32 {
        (0..self.capacity)
            .filter(|&no| !self.bitmap.test(no as usize))
            .count() as u32
    }

    /// 写回 `inode_no` 所在的位图扇区
    pub fn sync(&self, disk: &dyn BlockDevice, inode_no: u32) -> Result<()> {
        self.bitmap
            .sync_sector(disk, self.start_lba, inode_no as usize)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_never_repeats_until_freed() {
        let mut inodes = InodeBitmap::new(0, 1, 4096);
        let a = inodes.alloc().unwrap();
        let b = inodes.alloc().unwrap();
        let c = inodes.alloc().unwrap();
        assert_eq!((a, b, c), (0, 1, 2));

        inodes.free(b);
        assert!(!inodes.is_used(b));
        assert_eq!(inodes.alloc().unwrap(), 1);
        assert_eq!(inodes.alloc().unwrap(), 3);
    }

    #[test]
    fn capacity_bounds_allocation() {
        let mut inodes = InodeBitmap::new(0, 1, 3);
        for _ in 0..3 {
            inodes.alloc().unwrap();
        }
        assert!(matches!(
            inodes.alloc(),
            Err(FileSystemError::AllocationExhausted(BitmapKind::Inode))
        ));
        assert_eq!(inodes.free_count(), 0);
    }
}
