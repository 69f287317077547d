use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::{
    disk::SECTOR_SIZE,
    fs::{
        config::{DIRECT_BLOCKS, INDIRECT_SLOTS, MAX_FILE_BLOCKS, MAX_FILE_NAME_LEN, ROOT_INODE_NO},
        error::{BitmapKind, FileSystemError, Result},
        inode_table::Inode,
        partition::Partition,
        rollback::{Rollback, Undo},
    },
    utils::encode_into,
};

/// 目录项在磁盘上的字节数
pub const DIR_ENTRY_SIZE: usize = 24;

const _: () = assert!(DIR_ENTRY_SIZE <= SECTOR_SIZE);

// 目录项类型，Unknown 表示空闲槽位
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    #[default]
    Unknown,
    Regular,
    Directory,
}

// 一个目录项
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    filename: [u8; MAX_FILE_NAME_LEN],
    pub i_no: u32,
    pub f_type: FileType,
}

impl DirEntry {
    /// 在内存中构造一个目录项
    pub fn new(name: &str, inode_no: u32, f_type: FileType) -> Result<Self> {
        if name.len() > MAX_FILE_NAME_LEN {
            return Err(FileSystemError::NameTooLong(name.to_string()));
        }
        let mut filename = [0u8; MAX_FILE_NAME_LEN];
        filename[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            filename,
            i_no: inode_no,
            f_type,
        })
    }

    fn name_bytes(&self) -> &[u8] {
        let len = self
            .filename
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_FILE_NAME_LEN);
        &self.filename[..len]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }

    pub fn is_free(&self) -> bool {
        self.f_type == FileType::Unknown
    }
}

/// 打开的目录：inode 号加读游标。inode 本身留在分区的打开表里。
#[derive(Debug, PartialEq, Eq)]
pub struct Dir {
    pub inode_no: u32,
    pub dir_pos: u32,
}

impl Dir {
    pub fn root() -> Self {
        Self {
            inode_no: ROOT_INODE_NO,
            dir_pos: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.inode_no == ROOT_INODE_NO
    }
}

fn read_entry(sector: &[u8], slot: usize, entry_size: usize) -> Result<DirEntry> {
    let off = slot * entry_size;
    Ok(bincode::deserialize(&sector[off..off + DIR_ENTRY_SIZE])?)
}

fn write_entry(sector: &mut [u8], slot: usize, entry_size: usize, entry: &DirEntry) -> Result<()> {
    let off = slot * entry_size;
    encode_into(&mut sector[off..off + entry_size], entry)?;
    Ok(())
}

impl Partition {
    fn entry_size(&self) -> usize {
        self.sb.dir_entry_size as usize
    }

    fn entries_per_sector(&self) -> usize {
        SECTOR_SIZE / self.entry_size()
    }

    /// 读出一级间接块中的 128 个块地址
    pub(crate) fn read_indirect(&self, table_lba: u32) -> Result<[u32; INDIRECT_SLOTS]> {
        let mut sector = [0u8; SECTOR_SIZE];
        self.disk().read_sector(table_lba, &mut sector)?;
        let mut table = [0u32; INDIRECT_SLOTS];
        for (slot, raw) in table.iter_mut().zip(sector.chunks_exact(4)) {
            *slot = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        }
        Ok(table)
    }

    pub(crate) fn write_indirect(&self, table_lba: u32, table: &[u32]) -> Result<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        for (raw, lba) in sector.chunks_exact_mut(4).zip(table) {
            raw.copy_from_slice(&lba.to_le_bytes());
        }
        self.disk().write_sector(table_lba, &sector)?;
        Ok(())
    }

    /// inode 的全部 140 个块地址，未分配的位置为 0
    pub fn block_list(&self, inode: &Inode) -> Result<Vec<u32>> {
        let mut all_blocks = vec![0u32; MAX_FILE_BLOCKS];
        all_blocks[..DIRECT_BLOCKS].copy_from_slice(&inode.i_sectors[..DIRECT_BLOCKS]);
        let table_lba = inode.i_sectors[DIRECT_BLOCKS];
        if table_lba != 0 {
            all_blocks[DIRECT_BLOCKS..].copy_from_slice(&self.read_indirect(table_lba)?);
        }
        Ok(all_blocks)
    }

    /// 在目录 `dir` 中按名字查找目录项
    pub fn search_dir_entry(&self, dir: &Dir, name: &str) -> Result<Option<DirEntry>> {
        let all_blocks = self.block_list(self.inode(dir.inode_no)?)?;
        let entry_size = self.entry_size();
        let mut sector = [0u8; SECTOR_SIZE];

        for &lba in all_blocks.iter().filter(|&&lba| lba != 0) {
            self.disk().read_sector(lba, &mut sector)?;
            for slot in 0..self.entries_per_sector() {
                let entry = read_entry(&sector, slot, entry_size)?;
                if entry.name_matches(name) {
                    return Ok(Some(entry));
                }
            }
        }
        Ok(None)
    }

    /// 把目录项写入父目录：先找空闲槽位，找不到就在第一个空的块位置上
    /// 扩展目录。成功后父目录 inode 的大小和块地址只改在内存里，由调用者写回。
    pub fn sync_dir_entry(&mut self, parent: &Dir, entry: &DirEntry) -> Result<()> {
        let mut dir_inode = self.inode(parent.inode_no)?.clone();
        let result = self.place_dir_entry(&mut dir_inode, entry);

        let cached = self.inode_mut(parent.inode_no)?;
        cached.i_size = dir_inode.i_size;
        cached.i_sectors = dir_inode.i_sectors;
        result
    }

    fn place_dir_entry(&mut self, dir_inode: &mut Inode, entry: &DirEntry) -> Result<()> {
        let entry_size = self.entry_size();
        debug_assert_eq!(dir_inode.i_size as usize % entry_size, 0);

        let mut all_blocks = self.block_list(dir_inode)?;
        let mut io_buf = [0u8; SECTOR_SIZE];

        for block_idx in 0..MAX_FILE_BLOCKS {
            if all_blocks[block_idx] == 0 {
                let block_lba = self.alloc_block().map_err(|e| {
                    error!("alloc block bitmap for sync_dir_entry failed");
                    e
                })?;
                self.block_bitmap.sync(self.disk(), block_lba)?;

                if block_idx < DIRECT_BLOCKS {
                    dir_inode.i_sectors[block_idx] = block_lba;
                    all_blocks[block_idx] = block_lba;
                } else if block_idx == DIRECT_BLOCKS {
                    // 第一个间接块：刚分配的块做间接表，再分配一块存目录项
                    dir_inode.i_sectors[DIRECT_BLOCKS] = block_lba;
                    let data_lba = match self.alloc_block() {
                        Ok(lba) => lba,
                        Err(e) => {
                            error!("alloc block bitmap for sync_dir_entry failed");
                            self.release_block(block_lba)?;
                            dir_inode.i_sectors[DIRECT_BLOCKS] = 0;
                            return Err(e);
                        }
                    };
                    self.block_bitmap.sync(self.disk(), data_lba)?;
                    all_blocks[DIRECT_BLOCKS] = data_lba;
                    self.write_indirect(block_lba, &all_blocks[DIRECT_BLOCKS..])?;
                } else {
                    all_blocks[block_idx] = block_lba;
                    self.write_indirect(
                        dir_inode.i_sectors[DIRECT_BLOCKS],
                        &all_blocks[DIRECT_BLOCKS..],
                    )?;
                }

                io_buf.fill(0);
                write_entry(&mut io_buf, 0, entry_size, entry)?;
                self.disk().write_sector(all_blocks[block_idx], &io_buf)?;
                dir_inode.i_size += entry_size as u32;
                debug!(
                    "directory {} grew to block {} at {:#x}",
                    dir_inode.i_no, block_idx, all_blocks[block_idx]
                );
                return Ok(());
            }

            self.disk().read_sector(all_blocks[block_idx], &mut io_buf)?;
            for slot in 0..self.entries_per_sector() {
                if read_entry(&io_buf, slot, entry_size)?.is_free() {
                    write_entry(&mut io_buf, slot, entry_size, entry)?;
                    self.disk().write_sector(all_blocks[block_idx], &io_buf)?;
                    dir_inode.i_size += entry_size as u32;
                    return Ok(());
                }
            }
        }

        error!("directory {} is full!", dir_inode.i_no);
        Err(FileSystemError::DirectoryFull)
    }

    /// 打开目录。根目录常驻内存，直接返回它的视图。
    pub fn open_dir(&mut self, inode_no: u32) -> Result<Dir> {
        if inode_no != ROOT_INODE_NO {
            self.open_inode(inode_no)?;
        }
        Ok(Dir {
            inode_no,
            dir_pos: 0,
        })
    }

    /// 关闭目录，根目录不允许关闭
    pub fn close_dir(&mut self, dir: Dir) {
        if dir.is_root() {
            return;
        }
        self.close_inode(dir.inode_no);
    }

    /// 读出下一个在用的目录项，读完返回 None
    pub fn read_dir(&self, dir: &mut Dir) -> Result<Option<DirEntry>> {
        let dir_inode = self.inode(dir.inode_no)?;
        if dir.dir_pos >= dir_inode.i_size {
            return Ok(None);
        }

        let all_blocks = self.block_list(dir_inode)?;
        let entry_size = self.entry_size();
        let mut sector = [0u8; SECTOR_SIZE];
        let mut cur_pos = 0u32;

        for &lba in all_blocks.iter().filter(|&&lba| lba != 0) {
            self.disk().read_sector(lba, &mut sector)?;
            for slot in 0..self.entries_per_sector() {
                let entry = read_entry(&sector, slot, entry_size)?;
                if entry.is_free() {
                    continue;
                }
                if cur_pos < dir.dir_pos {
                    cur_pos += entry_size as u32;
                    continue;
                }
                dir.dir_pos += entry_size as u32;
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    pub fn rewind_dir(&self, dir: &mut Dir) {
        dir.dir_pos = 0;
    }

    /// 在 `parent` 下创建名为 `name` 的子目录。任何一步失败都会撤销已完成的步骤。
    pub fn make_dir(&mut self, parent: &Dir, name: &str) -> Result<u32> {
        let mut rollback = Rollback::default();
        match self.make_dir_steps(parent, name, &mut rollback) {
            Ok(inode_no) => {
                rollback.commit();
                Ok(inode_no)
            }
            Err(e) => {
                rollback.unwind(self, None);
                Err(e)
            }
        }
    }

    fn make_dir_steps(&mut self, parent: &Dir, name: &str, rollback: &mut Rollback) -> Result<u32> {
        let entry_size = self.entry_size();

        let inode_no = self.alloc_inode()?;
        rollback.record(Undo::InodeBit(inode_no));

        let block_lba = self.alloc_block()?;
        rollback.record(Undo::Block(block_lba));
        self.block_bitmap.sync(self.disk(), block_lba)?;

        let mut new_inode = Inode::new(inode_no);
        new_inode.i_sectors[0] = block_lba;

        // . 指向自己，.. 指向父目录
        let mut io_buf = [0u8; SECTOR_SIZE];
        let dot = DirEntry::new(".", inode_no, FileType::Directory)?;
        let dotdot = DirEntry::new("..", parent.inode_no, FileType::Directory)?;
        write_entry(&mut io_buf, 0, entry_size, &dot)?;
        write_entry(&mut io_buf, 1, entry_size, &dotdot)?;
        self.disk().write_sector(block_lba, &io_buf)?;
        new_inode.i_size = 2 * entry_size as u32;

        let entry = DirEntry::new(name, inode_no, FileType::Directory)?;
        self.sync_dir_entry(parent, &entry)?;

        self.sync_open_inode(parent.inode_no)?;
        self.sync_inode(&new_inode)?;
        self.bitmap_sync(inode_no, BitmapKind::Inode)?;
        Ok(inode_no)
    }
}
