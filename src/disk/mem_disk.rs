use std::{io::Result, sync::Mutex};

use crate::disk::{
    block_device::{check_access, BlockDevice},
    types::SECTOR_SIZE,
};

/// 内存盘，测试用
#[derive(Debug)]
pub struct MemDisk {
    bytes: Mutex<Vec<u8>>,
    sectors: u32,
}

impl MemDisk {
    pub fn new(sectors: u32) -> Self {
        Self {
            bytes: Mutex::new(vec![0; sectors as usize * SECTOR_SIZE]),
            sectors,
        }
    }
}

impl BlockDevice for MemDisk {
    fn read_sectors(&self, lba: u32, buf: &mut [u8]) -> Result<()> {
        check_access(self.sectors, lba, buf.len())?;
        let start = lba as usize * SECTOR_SIZE;
        let bytes = self.bytes.lock().unwrap();
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
        Ok(())
    }

    fn write_sectors(&self, lba: u32, buf: &[u8]) -> Result<()> {
        check_access(self.sectors, lba, buf.len())?;
        let start = lba as usize * SECTOR_SIZE;
        let mut bytes = self.bytes.lock().unwrap();
        bytes[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn sector_count(&self) -> u32 {
        self.sectors
    }
}
