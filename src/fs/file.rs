use std::io::SeekFrom;

use bitflags::bitflags;
use log::{debug, error, warn};

use crate::{
    disk::SECTOR_SIZE,
    fs::{
        config::{DIRECT_BLOCKS, MAX_FILE_BLOCKS, STD_STREAMS},
        directory::{Dir, DirEntry, FileType},
        error::{BitmapKind, FileSystemError, Result},
        inode_table::Inode,
        partition::Partition,
        rollback::{Rollback, Undo},
    },
};

/// 单个文件的最大字节数
pub const MAX_FILE_SIZE: usize = MAX_FILE_BLOCKS * SECTOR_SIZE;

bitflags! {
    /// 打开文件的方式，不带 WRONLY/RDWR 即为只读
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const WRONLY = 1;
        const RDWR = 2;
        const CREAT = 4;
    }
}

impl OpenFlags {
    pub const RDONLY: Self = Self::empty();

    pub fn is_write(&self) -> bool {
        self.intersects(Self::WRONLY | Self::RDWR)
    }
}

/// 全局打开文件表中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub inode_no: u32,
    pub fd_pos: u32,
    pub flags: OpenFlags,
}

/// 全局打开文件表，前 `STD_STREAMS` 个槽位留给标准流
#[derive(Debug)]
pub struct FileTable {
    slots: Vec<Option<OpenFile>>,
}

impl FileTable {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity <= STD_STREAMS {
            return Err(FileSystemError::InvalidConfig(format!(
                "file table of {} slots leaves nothing after {} standard streams",
                capacity, STD_STREAMS
            )));
        }
        Ok(Self {
            slots: vec![None; capacity],
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 第一个空闲槽位的下标
    pub fn free_slot(&self) -> Result<usize> {
        (STD_STREAMS..self.slots.len())
            .find(|&fd| self.slots[fd].is_none())
            .ok_or(FileSystemError::TooManyOpenFiles)
    }

    /// 占用第一个空闲槽位
    pub fn claim(&mut self, file: OpenFile) -> Result<usize> {
        let fd = self.free_slot()?;
        self.slots[fd] = Some(file);
        Ok(fd)
    }

    pub fn get(&self, fd: usize) -> Option<&OpenFile> {
        self.slots.get(fd).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, fd: usize) -> Option<&mut OpenFile> {
        self.slots.get_mut(fd).and_then(Option::as_mut)
    }

    pub fn release(&mut self, fd: usize) -> Option<OpenFile> {
        if fd < STD_STREAMS {
            return None;
        }
        self.slots.get_mut(fd).and_then(Option::take)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &OpenFile)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(fd, slot)| slot.as_ref().map(|file| (fd, file)))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

/// 在 `parent_dir` 下创建普通文件并打开，返回全局文件表下标。
///
/// 依次：分配 inode 位、准备内存 inode、占文件表槽位、写目录项、
/// 写回父目录 inode / 新 inode / inode 位图、放入打开表。
/// 中途失败时按相反顺序撤销已经完成的步骤。
pub fn create_file(
    part: &mut Partition,
    files: &mut FileTable,
    parent_dir: &Dir,
    filename: &str,
    flags: OpenFlags,
) -> Result<usize> {
    let mut rollback = Rollback::default();
    match create_file_steps(part, files, parent_dir, filename, flags, &mut rollback) {
        Ok(fd) => {
            rollback.commit();
            debug!("created {} as fd {}", filename, fd);
            Ok(fd)
        }
        Err(e) => {
            warn!("create {} failed: {}", filename, e);
            rollback.unwind(part, Some(files));
            Err(e)
        }
    }
}

fn create_file_steps(
    part: &mut Partition,
    files: &mut FileTable,
    parent_dir: &Dir,
    filename: &str,
    flags: OpenFlags,
    rollback: &mut Rollback,
) -> Result<usize> {
    // 1. inode 位
    let inode_no = part.alloc_inode()?;
    rollback.record(Undo::InodeBit(inode_no));

    // 2. 内存 inode，失败时随作用域释放
    let mut new_inode = Inode::new(inode_no);
    new_inode.write_deny = flags.is_write();

    // 3. 文件表槽位
    let fd = files.claim(OpenFile {
        inode_no,
        fd_pos: 0,
        flags,
    })?;
    rollback.record(Undo::FileSlot(fd));

    // 4. 目录项
    let entry = DirEntry::new(filename, inode_no, FileType::Regular)?;
    part.sync_dir_entry(parent_dir, &entry)?;

    // 5. 写回并放入打开表
    part.sync_open_inode(parent_dir.inode_no)?;
    part.sync_inode(&new_inode)?;
    part.bitmap_sync(inode_no, BitmapKind::Inode)?;
    part.open_inodes.insert(new_inode)?;
    Ok(fd)
}

/// 打开已有的普通文件，返回全局文件表下标
pub fn file_open(
    part: &mut Partition,
    files: &mut FileTable,
    inode_no: u32,
    flags: OpenFlags,
    path: &str,
) -> Result<usize> {
    files.free_slot()?;

    let inode = part.open_inode(inode_no)?;
    if flags.is_write() {
        if inode.write_deny {
            part.close_inode(inode_no);
            return Err(FileSystemError::WriteDenied(path.to_string()));
        }
        inode.write_deny = true;
    }

    files.claim(OpenFile {
        inode_no,
        fd_pos: 0,
        flags,
    })
}

/// 关闭文件表下标为 `fd` 的文件
pub fn file_close(part: &mut Partition, files: &mut FileTable, fd: usize) -> Result<()> {
    let file = files
        .release(fd)
        .ok_or(FileSystemError::BadDescriptor(fd))?;
    if file.flags.is_write() {
        if let Ok(inode) = part.inode_mut(file.inode_no) {
            inode.write_deny = false;
        }
    }
    part.close_inode(file.inode_no);
    Ok(())
}

/// 从 `fd_pos` 开始写入 `buf`，缺的块先全部分配好再写数据。
/// 分配或写回失败时释放本次新分配的块，inode 保持原样。
pub fn file_write(
    part: &mut Partition,
    files: &mut FileTable,
    fd: usize,
    buf: &[u8],
) -> Result<usize> {
    let file = files.get(fd).ok_or(FileSystemError::BadDescriptor(fd))?;
    if !file.flags.is_write() {
        return Err(FileSystemError::BadDescriptor(fd));
    }
    let inode_no = file.inode_no;
    let start = file.fd_pos as usize;
    if buf.is_empty() {
        return Ok(0);
    }
    let end = start + buf.len();
    if end > MAX_FILE_SIZE {
        error!("exceed max file size {} bytes, write file failed", MAX_FILE_SIZE);
        return Err(FileSystemError::FileTooLarge(end));
    }

    let mut inode = part.inode(inode_no)?.clone();
    let mut rollback = Rollback::default();
    if let Err(e) = write_steps(part, &mut inode, start, buf, &mut rollback) {
        warn!("write to inode {} failed: {}", inode_no, e);
        rollback.unwind(part, None);
        return Err(e);
    }
    rollback.commit();

    let cached = part.inode_mut(inode_no)?;
    cached.i_size = inode.i_size;
    cached.i_sectors = inode.i_sectors;
    if let Some(file) = files.get_mut(fd) {
        file.fd_pos = end as u32;
    }
    Ok(buf.len())
}

/// 分配一个块并立即写回位图，失败时由 `rollback` 释放
fn claim_block(part: &mut Partition, rollback: &mut Rollback) -> Result<u32> {
    let lba = part.alloc_block()?;
    rollback.record(Undo::Block(lba));
    part.block_bitmap.sync(part.disk(), lba)?;
    Ok(lba)
}

fn write_steps(
    part: &mut Partition,
    inode: &mut Inode,
    start: usize,
    buf: &[u8],
    rollback: &mut Rollback,
) -> Result<()> {
    let end = start + buf.len();
    let last_block = (end - 1) / SECTOR_SIZE;
    let mut all_blocks = part.block_list(inode)?;
    let mut fresh = Vec::new();
    let mut table_dirty = false;

    if last_block >= DIRECT_BLOCKS && inode.i_sectors[DIRECT_BLOCKS] == 0 {
        inode.i_sectors[DIRECT_BLOCKS] = claim_block(part, rollback)?;
        table_dirty = true;
    }
    for block_idx in start / SECTOR_SIZE..=last_block {
        if all_blocks[block_idx] != 0 {
            continue;
        }
        let lba = claim_block(part, rollback)?;
        all_blocks[block_idx] = lba;
        fresh.push(lba);
        if block_idx < DIRECT_BLOCKS {
            inode.i_sectors[block_idx] = lba;
        } else {
            table_dirty = true;
        }
    }
    if table_dirty {
        part.write_indirect(inode.i_sectors[DIRECT_BLOCKS], &all_blocks[DIRECT_BLOCKS..])?;
    }

    let mut sector = [0u8; SECTOR_SIZE];
    let mut written = 0;
    while written < buf.len() {
        let pos = start + written;
        let lba = all_blocks[pos / SECTOR_SIZE];
        let off = pos % SECTOR_SIZE;
        let chunk = (SECTOR_SIZE - off).min(buf.len() - written);
        // 只写一部分的扇区要保留原有内容，新块从全 0 开始
        if chunk < SECTOR_SIZE {
            if fresh.contains(&lba) {
                sector.fill(0);
            } else {
                part.disk().read_sector(lba, &mut sector)?;
            }
        }
        sector[off..off + chunk].copy_from_slice(&buf[written..written + chunk]);
        part.disk().write_sector(lba, &sector)?;
        written += chunk;
    }

    inode.i_size = inode.i_size.max(end as u32);
    part.sync_inode(inode)
}

/// 从 `fd_pos` 开始读到 `buf` 满或文件末尾，返回读到的字节数，末尾返回 0
pub fn file_read(
    part: &Partition,
    files: &mut FileTable,
    fd: usize,
    buf: &mut [u8],
) -> Result<usize> {
    let file = files.get(fd).ok_or(FileSystemError::BadDescriptor(fd))?;
    if file.flags.contains(OpenFlags::WRONLY) {
        return Err(FileSystemError::BadDescriptor(fd));
    }
    let inode = part.inode(file.inode_no)?;
    let start = file.fd_pos as usize;
    let end = (start + buf.len()).min(inode.i_size as usize);
    if start >= end {
        return Ok(0);
    }

    let all_blocks = part.block_list(inode)?;
    let mut sector = [0u8; SECTOR_SIZE];
    let len = end - start;
    let mut read = 0;
    while read < len {
        let pos = start + read;
        let lba = all_blocks[pos / SECTOR_SIZE];
        if lba == 0 {
            return Err(FileSystemError::Corrupted(format!(
                "inode {} has no block for byte {}",
                inode.i_no, pos
            )));
        }
        let off = pos % SECTOR_SIZE;
        let chunk = (SECTOR_SIZE - off).min(len - read);
        part.disk().read_sector(lba, &mut sector)?;
        buf[read..read + chunk].copy_from_slice(&sector[off..off + chunk]);
        read += chunk;
    }

    if let Some(file) = files.get_mut(fd) {
        file.fd_pos = end as u32;
    }
    Ok(len)
}

/// 移动读写位置，新位置必须在 [0, 文件大小] 之内
pub fn file_lseek(
    part: &Partition,
    files: &mut FileTable,
    fd: usize,
    pos: SeekFrom,
) -> Result<u32> {
    let file = files.get_mut(fd).ok_or(FileSystemError::BadDescriptor(fd))?;
    let size = i64::from(part.inode(file.inode_no)?.i_size);
    let new_pos = match pos {
        SeekFrom::Start(off) => i64::try_from(off).unwrap_or(i64::MAX),
        SeekFrom::Current(off) => i64::from(file.fd_pos).saturating_add(off),
        SeekFrom::End(off) => size.saturating_add(off),
    };
    if !(0..=size).contains(&new_pos) {
        return Err(FileSystemError::InvalidSeek(new_pos));
    }
    file.fd_pos = new_pos as u32;
    Ok(file.fd_pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disk::SECTOR_SIZE,
        fs::{
            config::MAX_FILE_OPEN,
            directory::DIR_ENTRY_SIZE,
            partition::tests::{exhaust_blocks, mounted},
        },
    };

    #[test]
    fn table_capacity_is_validated() {
        assert!(matches!(
            FileTable::new(STD_STREAMS),
            Err(FileSystemError::InvalidConfig(_))
        ));
        assert_eq!(FileTable::new(MAX_FILE_OPEN).unwrap().capacity(), MAX_FILE_OPEN);
    }

    #[test]
    fn standard_stream_slots_are_never_handed_out() {
        let mut files = FileTable::new(5).unwrap();
        let file = OpenFile {
            inode_no: 1,
            fd_pos: 0,
            flags: OpenFlags::RDONLY,
        };
        assert_eq!(files.claim(file.clone()).unwrap(), 3);
        assert_eq!(files.claim(file.clone()).unwrap(), 4);
        assert!(matches!(
            files.claim(file),
            Err(FileSystemError::TooManyOpenFiles)
        ));
        assert_eq!(files.release(1), None);
        assert!(files.release(3).is_some());
        assert_eq!(files.free_slot().unwrap(), 3);
    }

    #[test]
    fn created_file_is_found_in_parent() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let root = Dir::root();

        let fd = create_file(&mut part, &mut files, &root, "hello.txt", OpenFlags::CREAT).unwrap();
        let inode_no = files.get(fd).unwrap().inode_no;

        let entry = part.search_dir_entry(&root, "hello.txt").unwrap().unwrap();
        assert_eq!(entry.name(), "hello.txt");
        assert_eq!(entry.f_type, FileType::Regular);
        assert_eq!(entry.i_no, inode_no);

        assert!(part.inode_bitmap.is_used(inode_no));
        assert_eq!(part.inode(inode_no).unwrap().open_cnt, 1);
        assert_eq!(part.inode(0).unwrap().i_size as usize, 3 * DIR_ENTRY_SIZE);

        file_close(&mut part, &mut files, fd).unwrap();
        assert!(part.inode(inode_no).is_err());
        assert!(files.is_empty());
    }

    #[test]
    fn failed_directory_sync_leaves_no_trace() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let root = Dir::root();

        // 根目录第一个块写满，并且没有空闲块可供扩展
        for i in 0..SECTOR_SIZE / DIR_ENTRY_SIZE - 2 {
            let fd = create_file(&mut part, &mut files, &root, &format!("f{}", i), OpenFlags::CREAT)
                .unwrap();
            file_close(&mut part, &mut files, fd).unwrap();
        }
        exhaust_blocks(&mut part, 0);

        let next_inode = part.inode_bitmap.bitmap.scan_free().unwrap() as u32;
        let open_before = part.open_inode_count();
        let result = create_file(&mut part, &mut files, &root, "late.txt", OpenFlags::CREAT);
        assert!(matches!(
            result,
            Err(FileSystemError::AllocationExhausted(BitmapKind::Block))
        ));

        assert!(!part.inode_bitmap.is_used(next_inode));
        assert!(files.is_empty());
        assert_eq!(part.open_inode_count(), open_before);
        assert_eq!(part.search_dir_entry(&root, "late.txt").unwrap(), None);
    }

    #[test]
    fn full_file_table_rolls_back_inode_bit() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(STD_STREAMS + 1).unwrap();
        let root = Dir::root();

        create_file(&mut part, &mut files, &root, "a", OpenFlags::CREAT).unwrap();
        let next_inode = part.inode_bitmap.bitmap.scan_free().unwrap() as u32;
        assert!(matches!(
            create_file(&mut part, &mut files, &root, "b", OpenFlags::CREAT),
            Err(FileSystemError::TooManyOpenFiles)
        ));
        assert!(!part.inode_bitmap.is_used(next_inode));
        assert_eq!(part.search_dir_entry(&root, "b").unwrap(), None);
    }

    #[test]
    fn single_writer_is_enforced() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let root = Dir::root();
        let fd = create_file(&mut part, &mut files, &root, "log", OpenFlags::CREAT).unwrap();
        let inode_no = files.get(fd).unwrap().inode_no;
        file_close(&mut part, &mut files, fd).unwrap();

        let writer = file_open(&mut part, &mut files, inode_no, OpenFlags::WRONLY, "/log").unwrap();
        let reader = file_open(&mut part, &mut files, inode_no, OpenFlags::RDONLY, "/log").unwrap();
        assert_eq!(part.inode(inode_no).unwrap().open_cnt, 2);
        assert!(matches!(
            file_open(&mut part, &mut files, inode_no, OpenFlags::RDWR, "/log"),
            Err(FileSystemError::WriteDenied(_))
        ));
        assert_eq!(part.inode(inode_no).unwrap().open_cnt, 2);

        file_close(&mut part, &mut files, writer).unwrap();
        assert!(!part.inode(inode_no).unwrap().write_deny);
        let again = file_open(&mut part, &mut files, inode_no, OpenFlags::RDWR, "/log").unwrap();
        file_close(&mut part, &mut files, again).unwrap();
        file_close(&mut part, &mut files, reader).unwrap();
        assert!(part.inode(inode_no).is_err());
    }

    #[test]
    fn closing_bad_descriptor_fails() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        for fd in [0, 1, 2, 5, 1000] {
            assert!(matches!(
                file_close(&mut part, &mut files, fd),
                Err(FileSystemError::BadDescriptor(_))
            ));
        }
    }

    fn new_file(
        part: &mut Partition,
        files: &mut FileTable,
        name: &str,
        flags: OpenFlags,
    ) -> (usize, u32) {
        let fd = create_file(part, files, &Dir::root(), name, OpenFlags::CREAT | flags).unwrap();
        let inode_no = files.get(fd).unwrap().inode_no;
        (fd, inode_no)
    }

    #[test]
    fn creator_holds_the_write_lock() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let (creator, inode_no) = new_file(&mut part, &mut files, "log", OpenFlags::WRONLY);
        assert!(part.inode(inode_no).unwrap().write_deny);

        assert!(matches!(
            file_open(&mut part, &mut files, inode_no, OpenFlags::WRONLY, "/log"),
            Err(FileSystemError::WriteDenied(_))
        ));
        let reader = file_open(&mut part, &mut files, inode_no, OpenFlags::RDONLY, "/log").unwrap();

        file_close(&mut part, &mut files, creator).unwrap();
        let writer = file_open(&mut part, &mut files, inode_no, OpenFlags::WRONLY, "/log").unwrap();
        assert!(matches!(
            file_open(&mut part, &mut files, inode_no, OpenFlags::RDWR, "/log"),
            Err(FileSystemError::WriteDenied(_))
        ));

        file_close(&mut part, &mut files, writer).unwrap();
        file_close(&mut part, &mut files, reader).unwrap();
        assert!(part.inode(inode_no).is_err());
    }

    #[test]
    fn read_only_creation_leaves_the_file_writable() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let (fd, inode_no) = new_file(&mut part, &mut files, "notes", OpenFlags::RDONLY);
        assert!(!part.inode(inode_no).unwrap().write_deny);
        let writer = file_open(&mut part, &mut files, inode_no, OpenFlags::RDWR, "/notes").unwrap();
        file_close(&mut part, &mut files, writer).unwrap();
        file_close(&mut part, &mut files, fd).unwrap();
    }

    #[test]
    fn write_crosses_into_indirect_block() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let (fd, inode_no) = new_file(&mut part, &mut files, "big", OpenFlags::RDWR);
        let free_before = part.free_blocks();

        let data: Vec<u8> = (0..(DIRECT_BLOCKS + 1) * SECTOR_SIZE + 100)
            .map(|i| (i % 251) as u8)
            .collect();
        assert_eq!(file_write(&mut part, &mut files, fd, &data).unwrap(), data.len());
        assert_eq!(files.get(fd).unwrap().fd_pos as usize, data.len());

        let inode = part.inode(inode_no).unwrap().clone();
        assert_eq!(inode.i_size as usize, data.len());
        let table_lba = inode.i_sectors[DIRECT_BLOCKS];
        assert_ne!(table_lba, 0);
        let table = part.read_indirect(table_lba).unwrap();
        assert_ne!(table[0], 0);
        assert_ne!(table[1], 0);
        assert_eq!(table[2], 0);
        // 14 个数据块加 1 个间接表
        assert_eq!(part.free_blocks(), free_before - 15);

        assert_eq!(file_lseek(&part, &mut files, fd, SeekFrom::Start(0)).unwrap(), 0);
        let mut back = vec![0u8; data.len() + 10];
        assert_eq!(file_read(&part, &mut files, fd, &mut back).unwrap(), data.len());
        assert_eq!(&back[..data.len()], &data[..]);
        assert_eq!(file_read(&part, &mut files, fd, &mut back).unwrap(), 0);
    }

    #[test]
    fn overwrite_keeps_size_and_append_grows_it() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let (fd, inode_no) = new_file(&mut part, &mut files, "greet", OpenFlags::RDWR);

        file_write(&mut part, &mut files, fd, b"hello world").unwrap();
        file_lseek(&part, &mut files, fd, SeekFrom::Start(6)).unwrap();
        file_write(&mut part, &mut files, fd, b"WORLD").unwrap();
        assert_eq!(part.inode(inode_no).unwrap().i_size, 11);

        file_lseek(&part, &mut files, fd, SeekFrom::End(0)).unwrap();
        file_write(&mut part, &mut files, fd, b"!").unwrap();
        assert_eq!(part.inode(inode_no).unwrap().i_size, 12);

        file_lseek(&part, &mut files, fd, SeekFrom::Start(0)).unwrap();
        let mut back = [0u8; 32];
        let n = file_read(&part, &mut files, fd, &mut back).unwrap();
        assert_eq!(&back[..n], b"hello WORLD!");
    }

    #[test]
    fn access_mode_is_checked() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let (reader, inode_no) = new_file(&mut part, &mut files, "ro", OpenFlags::RDONLY);
        assert!(matches!(
            file_write(&mut part, &mut files, reader, b"x"),
            Err(FileSystemError::BadDescriptor(_))
        ));

        let writer = file_open(&mut part, &mut files, inode_no, OpenFlags::WRONLY, "/ro").unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            file_read(&part, &mut files, writer, &mut buf),
            Err(FileSystemError::BadDescriptor(_))
        ));
        assert!(matches!(
            file_write(&mut part, &mut files, 17, b"x"),
            Err(FileSystemError::BadDescriptor(17))
        ));
    }

    #[test]
    fn lseek_stays_within_the_file() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let (fd, _) = new_file(&mut part, &mut files, "ten", OpenFlags::RDWR);
        file_write(&mut part, &mut files, fd, b"0123456789").unwrap();

        assert!(matches!(
            file_lseek(&part, &mut files, fd, SeekFrom::End(1)),
            Err(FileSystemError::InvalidSeek(11))
        ));
        assert!(matches!(
            file_lseek(&part, &mut files, fd, SeekFrom::Current(-11)),
            Err(FileSystemError::InvalidSeek(-1))
        ));
        assert_eq!(file_lseek(&part, &mut files, fd, SeekFrom::End(-4)).unwrap(), 6);
        assert_eq!(file_lseek(&part, &mut files, fd, SeekFrom::Current(2)).unwrap(), 8);
        assert_eq!(file_lseek(&part, &mut files, fd, SeekFrom::Start(10)).unwrap(), 10);

        let mut buf = [0u8; 2];
        file_lseek(&part, &mut files, fd, SeekFrom::Start(8)).unwrap();
        file_read(&part, &mut files, fd, &mut buf).unwrap();
        assert_eq!(&buf, b"89");
    }

    #[test]
    fn file_size_is_capped_at_all_block_slots() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let (fd, inode_no) = new_file(&mut part, &mut files, "max", OpenFlags::WRONLY);
        let free_before = part.free_blocks();

        assert!(matches!(
            file_write(&mut part, &mut files, fd, &vec![1u8; MAX_FILE_SIZE + 1]),
            Err(FileSystemError::FileTooLarge(_))
        ));
        assert_eq!(part.free_blocks(), free_before);

        file_write(&mut part, &mut files, fd, &vec![1u8; MAX_FILE_SIZE]).unwrap();
        assert_eq!(part.inode(inode_no).unwrap().i_size as usize, MAX_FILE_SIZE);
        assert_eq!(part.free_blocks(), free_before - MAX_FILE_BLOCKS as u32 - 1);
        assert!(matches!(
            file_write(&mut part, &mut files, fd, b"x"),
            Err(FileSystemError::FileTooLarge(end)) if end == MAX_FILE_SIZE + 1
        ));
    }

    #[test]
    fn failed_allocation_rolls_back_write() {
        let mut part = mounted(2048);
        let mut files = FileTable::new(MAX_FILE_OPEN).unwrap();
        let (fd, inode_no) = new_file(&mut part, &mut files, "grow", OpenFlags::RDWR);
        file_write(&mut part, &mut files, fd, b"a").unwrap();

        exhaust_blocks(&mut part, 2);
        let result = file_write(&mut part, &mut files, fd, &[7u8; 3 * SECTOR_SIZE]);
        assert!(matches!(
            result,
            Err(FileSystemError::AllocationExhausted(BitmapKind::Block))
        ));

        assert_eq!(part.free_blocks(), 2);
        let inode = part.inode(inode_no).unwrap();
        assert_eq!(inode.i_size, 1);
        assert_eq!(inode.i_sectors[1], 0);
        assert_eq!(files.get(fd).unwrap().fd_pos, 1);
    }
}
