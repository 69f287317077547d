use std::sync::Arc;

use log::{debug, info};

use crate::{
    disk::{BlockDevice, PartitionInfo},
    fs::{
        config::ROOT_INODE_NO,
        data_block_bitmap::DataBlockBitmap,
        directory::DIR_ENTRY_SIZE,
        error::{BitmapKind, FileSystemError, Result},
        inode_bitmap::InodeBitmap,
        inode_table::{self, Inode, OpenInodes},
        super_block::SuperBlock,
    },
};

/// 一个已挂载的分区：超级块、两张位图常驻内存，外加已打开的 inode
pub struct Partition {
    pub info: PartitionInfo,
    disk: Arc<dyn BlockDevice>,
    pub sb: SuperBlock,
    pub block_bitmap: DataBlockBitmap,
    pub inode_bitmap: InodeBitmap,
    pub(crate) open_inodes: OpenInodes,
}

impl Partition {
    /// 读超级块，载入两张位图，打开根目录
    pub fn mount(disk: Arc<dyn BlockDevice>, info: PartitionInfo) -> Result<Self> {
        let sb = SuperBlock::detect(disk.as_ref(), &info)?.ok_or_else(|| {
            FileSystemError::Corrupted(format!("{} has no valid super block", info.name))
        })?;
        if sb.root_inode_no != ROOT_INODE_NO {
            return Err(FileSystemError::Corrupted(format!(
                "{} has root inode {}, expected {}",
                info.name, sb.root_inode_no, ROOT_INODE_NO
            )));
        }
        if sb.dir_entry_size as usize != DIR_ENTRY_SIZE {
            return Err(FileSystemError::Corrupted(format!(
                "{} uses {}-byte directory entries, expected {}",
                info.name, sb.dir_entry_size, DIR_ENTRY_SIZE
            )));
        }

        let block_bitmap = DataBlockBitmap::load(
            disk.as_ref(),
            sb.block_bitmap_lba,
            sb.block_bitmap_sects,
            sb.data_start_lba,
        )?;
        let inode_bitmap = InodeBitmap::load(
            disk.as_ref(),
            sb.inode_bitmap_lba,
            sb.inode_bitmap_sects,
            sb.inode_cnt,
        )?;

        let mut part = Self {
            info,
            disk,
            sb,
            block_bitmap,
            inode_bitmap,
            open_inodes: OpenInodes::default(),
        };
        part.open_inode(sb.root_inode_no)?;

        info!("mount {} done!", part.info.name);
        Ok(part)
    }

    pub fn disk(&self) -> &dyn BlockDevice {
        self.disk.as_ref()
    }

    /// 分配 inode 位，不写回
    pub fn alloc_inode(&mut self) -> Result<u32> {
        self.inode_bitmap.alloc()
    }

    /// 分配数据块，返回 LBA，不写回
    pub fn alloc_block(&mut self) -> Result<u32> {
        self.block_bitmap.alloc()
    }

    /// 把位图中 `bit_index` 所在的扇区写回磁盘
    pub fn bitmap_sync(&self, bit_index: u32, kind: BitmapKind) -> Result<()> {
        match kind {
            BitmapKind::Inode => self.inode_bitmap.sync(self.disk(), bit_index),
            BitmapKind::Block => self
                .block_bitmap
                .sync(self.disk(), self.block_bitmap.data_start_lba + bit_index),
        }
    }

    /// 释放数据块并立即写回位图
    pub(crate) fn release_block(&mut self, lba: u32) -> Result<()> {
        debug!("release block {:#x}", lba);
        self.block_bitmap.free(lba);
        self.block_bitmap.sync(self.disk.as_ref(), lba)
    }

    pub fn open_inode(&mut self, inode_no: u32) -> Result<&mut Inode> {
        self.open_inodes.open(self.disk.as_ref(), &self.sb, inode_no)
    }

    pub fn close_inode(&mut self, inode_no: u32) {
        self.open_inodes.close(inode_no);
    }

    pub fn inode(&self, inode_no: u32) -> Result<&Inode> {
        self.open_inodes.get(inode_no).ok_or_else(|| not_open(inode_no))
    }

    pub fn inode_mut(&mut self, inode_no: u32) -> Result<&mut Inode> {
        self.open_inodes
            .get_mut(inode_no)
            .ok_or_else(|| not_open(inode_no))
    }

    /// 写回任意一个 inode（可以不在打开表中）
    pub fn sync_inode(&self, inode: &Inode) -> Result<()> {
        inode_table::sync_inode(self.disk(), &self.sb, inode)
    }

    /// 写回一个已打开的 inode
    pub fn sync_open_inode(&self, inode_no: u32) -> Result<()> {
        self.sync_inode(self.inode(inode_no)?)
    }

    pub fn free_inodes(&self) -> u32 {
        self.inode_bitmap.free_count()
    }

    pub fn free_blocks(&self) -> u32 {
        self.block_bitmap.free_count()
    }

    pub fn open_inode_count(&self) -> usize {
        self.open_inodes.len()
    }
}

fn not_open(inode_no: u32) -> FileSystemError {
    FileSystemError::Corrupted(format!("inode {} is not open", inode_no))
}
