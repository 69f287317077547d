use std::collections::{hash_map::Entry, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    disk::{BlockDevice, SECTOR_SIZE},
    fs::{
        config::{INODE_SECTOR_SLOTS, ROOT_INODE_NO},
        error::{FileSystemError, Result},
        super_block::SuperBlock,
    },
    utils::encode_into,
};

/// 磁盘上一个 inode 记录的字节数
pub const DISK_INODE_SIZE: usize = 64;

// inode 不能跨扇区存放
const _: () = assert!(SECTOR_SIZE % DISK_INODE_SIZE == 0);

/// inode 在 inode 表中的持久化格式
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInode {
    pub i_no: u32,
    pub i_size: u32,
    pub i_sectors: [u32; INODE_SECTOR_SLOTS], // 0..12 直接块，12 为一级间接块
    pub reserved: u32,
}

/// 内存中的 inode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub i_no: u32,
    pub i_size: u32,
    pub i_sectors: [u32; INODE_SECTOR_SLOTS],
    pub open_cnt: u32,     // 被打开的次数
    pub write_deny: bool,  // 同一时刻只允许一个写者，仅作标记
}

impl Inode {
    /// 初始化一个新 inode：大小为 0，没有块，打开计数为 1
    pub fn new(inode_no: u32) -> Self {
        Self {
            i_no: inode_no,
            i_size: 0,
            i_sectors: [0; INODE_SECTOR_SLOTS],
            open_cnt: 1,
            write_deny: false,
        }
    }

    fn from_disk(disk_inode: DiskInode) -> Self {
        Self {
            i_no: disk_inode.i_no,
            i_size: disk_inode.i_size,
            i_sectors: disk_inode.i_sectors,
            open_cnt: 0,
            write_deny: false,
        }
    }

    fn to_disk(&self) -> DiskInode {
        DiskInode {
            i_no: self.i_no,
            i_size: self.i_size,
            i_sectors: self.i_sectors,
            reserved: 0,
        }
    }
}

/// inode 所在的扇区和扇区内偏移
pub fn inode_position(sb: &SuperBlock, inode_no: u32) -> (u32, usize) {
    let byte_off = inode_no as usize * DISK_INODE_SIZE;
    let lba = sb.inode_table_lba + (byte_off / SECTOR_SIZE) as u32;
    (lba, byte_off % SECTOR_SIZE)
}

fn check_inode_no(sb: &SuperBlock, inode_no: u32) -> Result<()> {
    if inode_no >= sb.inode_cnt {
        return Err(FileSystemError::Corrupted(format!(
            "inode {} beyond inode table of {}",
            inode_no, sb.inode_cnt
        )));
    }
    Ok(())
}

/// 从 inode 表读出一个 inode
pub fn read_inode(disk: &dyn BlockDevice, sb: &SuperBlock, inode_no: u32) -> Result<Inode> {
    check_inode_no(sb, inode_no)?;
    let (lba, offset) = inode_position(sb, inode_no);
    let mut sector = [0u8; SECTOR_SIZE];
    disk.read_sector(lba, &mut sector)?;
    let disk_inode: DiskInode = bincode::deserialize(&sector[offset..offset + DISK_INODE_SIZE])?;
    Ok(Inode::from_disk(disk_inode))
}

/// 把 inode 写回 inode 表。一个扇区放多个 inode，所以先读出整个扇区，
/// 改写其中的槽位再写回。
pub fn sync_inode(disk: &dyn BlockDevice, sb: &SuperBlock, inode: &Inode) -> Result<()> {
    check_inode_no(sb, inode.i_no)?;
    let (lba, offset) = inode_position(sb, inode.i_no);
    let mut sector = [0u8; SECTOR_SIZE];
    disk.read_sector(lba, &mut sector)?;
    encode_into(&mut sector[offset..offset + DISK_INODE_SIZE], &inode.to_disk())?;
    disk.write_sector(lba, &sector)?;
    Ok(())
}

/// 分区上已打开的 inode，按 inode 号索引，带引用计数
#[derive(Debug, Default)]
pub struct OpenInodes {
    inodes: HashMap<u32, Inode>,
}

impl OpenInodes {
    /// 已经打开则计数加一，否则从磁盘读入
    pub fn open(
        &mut self,
        disk: &dyn BlockDevice,
        sb: &SuperBlock,
        inode_no: u32,
    ) -> Result<&mut Inode> {
        self.inodes
            .try_reserve(1)
            .map_err(|_| FileSystemError::OutOfMemory)?;
        match self.inodes.entry(inode_no) {
            Entry::Occupied(slot) => {
                let inode = slot.into_mut();
                inode.open_cnt += 1;
                Ok(inode)
            }
            Entry::Vacant(slot) => {
                let mut inode = read_inode(disk, sb, inode_no)?;
                inode.open_cnt = 1;
                Ok(slot.insert(inode))
            }
        }
    }

    /// 放入一个刚创建的 inode
    pub fn insert(&mut self, inode: Inode) -> Result<()> {
        self.inodes
            .try_reserve(1)
            .map_err(|_| FileSystemError::OutOfMemory)?;
        self.inodes.insert(inode.i_no, inode);
        Ok(())
    }

    /// 计数减一，归零时移出。根目录常驻，关闭它什么也不做。
    pub fn close(&mut self, inode_no: u32) {
        if inode_no == ROOT_INODE_NO {
            return;
        }
        if let Entry::Occupied(mut slot) = self.inodes.entry(inode_no) {
            let inode = slot.get_mut();
            inode.open_cnt = inode.open_cnt.saturating_sub(1);
            if inode.open_cnt == 0 {
                slot.remove();
            }
        }
    }

    pub fn get(&self, inode_no: u32) -> Option<&Inode> {
        self.inodes.get(&inode_no)
    }

    pub fn get_mut(&mut self, inode_no: u32) -> Option<&mut Inode> {
        self.inodes.get_mut(&inode_no)
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }
}
