use std::io::{Error, ErrorKind, Result};

use crate::disk::types::{Sector, SECTOR_SIZE};

/// 扇区级块设备。
///
/// `read_sectors` / `write_sectors` 以绝对 LBA 寻址，缓冲区长度必须是
/// `SECTOR_SIZE` 的整数倍，读写的扇区数由缓冲区长度决定。
pub trait BlockDevice: Send + Sync {
    fn read_sectors(&self, lba: u32, buf: &mut [u8]) -> Result<()>;
    fn write_sectors(&self, lba: u32, buf: &[u8]) -> Result<()>;
    fn sector_count(&self) -> u32;

    fn read_sector(&self, lba: u32, buf: &mut Sector) -> Result<()> {
        self.read_sectors(lba, buf)
    }

    fn write_sector(&self, lba: u32, buf: &Sector) -> Result<()> {
        self.write_sectors(lba, buf)
    }
}

/// 检查一次访问是否整扇区且没有越过设备末尾，返回访问的扇区数
pub fn check_access(device_sectors: u32, lba: u32, len: usize) -> Result<u32> {
    if len % SECTOR_SIZE != 0 {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("buffer of {} bytes is not sector aligned", len),
        ));
    }
    let count = (len / SECTOR_SIZE) as u64;
    if lba as u64 + count > device_sectors as u64 {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            format!("sectors {}..{} beyond end of device", lba, lba as u64 + count),
        ));
    }
    Ok(count as u32)
}
