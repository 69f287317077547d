use std::{
    fs::{File, OpenOptions},
    io::{Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::Mutex,
};

use log::info;

use crate::disk::{
    block_device::{check_access, BlockDevice},
    types::SECTOR_SIZE,
};

/// 以普通文件模拟的磁盘（disk.img）
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    sectors: u32,
}

impl FileDisk {
    /// 打开磁盘镜像，不存在或不够大时扩展到 `sectors` 个扇区。
    /// 返回值第二项表示镜像是否是新分配的。
    pub fn open<P: AsRef<Path>>(path: P, sectors: u32) -> Result<(Self, bool)> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let wanted = sectors as u64 * SECTOR_SIZE as u64;
        let grown = file.metadata()?.len() < wanted;
        if grown {
            info!(
                "allocating {} bytes for {}",
                wanted,
                path.as_ref().display()
            );
            file.set_len(wanted)?;
        }

        Ok((
            Self {
                file: Mutex::new(file),
                sectors,
            },
            grown,
        ))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, File> {
        // 持锁线程 panic 不会让文件内容失效，继续使用
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BlockDevice for FileDisk {
    fn read_sectors(&self, lba: u32, buf: &mut [u8]) -> Result<()> {
        check_access(self.sectors, lba, buf.len())?;
        let mut file = self.lock();
        file.seek(SeekFrom::Start(lba as u64 * SECTOR_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_sectors(&self, lba: u32, buf: &[u8]) -> Result<()> {
        check_access(self.sectors, lba, buf.len())?;
        let mut file = self.lock();
        file.seek(SeekFrom::Start(lba as u64 * SECTOR_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn sector_count(&self) -> u32 {
        self.sectors
    }
}
