use std::{io::SeekFrom, sync::Arc};

use log::info;

use crate::{
    disk::{BlockDevice, PartitionInfo},
    fs::{
        config::{MAX_FILE_OPEN, ROOT_INODE_NO},
        directory::{Dir, DirEntry, FileType},
        error::{FileSystemError, Result},
        file::{FileTable, OpenFile, OpenFlags},
        partition::Partition,
        path::{is_root_path, last_component, path_depth},
        super_block::SuperBlock,
    },
};

pub mod bitmap;
pub mod config;
pub mod data_block_bitmap;
pub mod directory;
pub mod error;
pub mod file;
pub mod inode_bitmap;
pub mod inode_table;
pub mod partition;
pub mod path;
pub mod rollback;
pub mod super_block;

/// `stat` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub inode_no: u32,
    pub size: u32,
    pub file_type: FileType,
}

/// 文件系统上下文：磁盘、分区列表、当前挂载的分区和全局打开文件表。
///
/// 所有操作都通过 `&mut self` 进行，同一时刻只有一个调用在执行。
pub struct FileSystem {
    disk: Arc<dyn BlockDevice>,
    partitions: Vec<PartitionInfo>,
    current: Partition,
    files: FileTable,
}

impl FileSystem {
    /// 扫描所有分区，没有文件系统的先格式化，然后挂载 `default_part`
    pub fn init(
        disk: Arc<dyn BlockDevice>,
        partitions: Vec<PartitionInfo>,
        default_part: &str,
    ) -> Result<Self> {
        let files = FileTable::new(MAX_FILE_OPEN)?;

        info!("searching filesystem......");
        for part in partitions.iter().filter(|p| p.sec_cnt != 0) {
            if SuperBlock::detect(disk.as_ref(), part)?.is_some() {
                info!("{} has filesystem", part.name);
            } else {
                info!("formatting partition {}......", part.name);
                super_block::format(disk.as_ref(), part)?;
            }
        }

        let info = find_partition(&partitions, default_part)?;
        let current = Partition::mount(Arc::clone(&disk), info)?;

        Ok(Self {
            disk,
            partitions,
            current,
            files,
        })
    }

    pub fn partitions(&self) -> &[PartitionInfo] {
        &self.partitions
    }

    pub fn current(&self) -> &Partition {
        &self.current
    }

    /// 没有打开的文件，也没有除根目录以外打开的目录
    fn ensure_idle(&self, action: &str) -> Result<()> {
        if !self.files.is_empty() {
            return Err(FileSystemError::Busy(format!(
                "close all open files before {}",
                action
            )));
        }
        if self.current.open_inode_count() > 1 {
            return Err(FileSystemError::Busy(format!(
                "close all open directories before {}",
                action
            )));
        }
        Ok(())
    }

    /// 切换当前挂载的分区
    pub fn mount(&mut self, name: &str) -> Result<()> {
        self.ensure_idle("switching partitions")?;
        let info = find_partition(&self.partitions, name)?;
        self.current = Partition::mount(Arc::clone(&self.disk), info)?;
        Ok(())
    }

    /// 重新格式化当前分区并挂载
    pub fn format_current(&mut self) -> Result<()> {
        self.ensure_idle("formatting")?;
        let info = self.current.info.clone();
        super_block::format(self.disk.as_ref(), &info)?;
        self.current = Partition::mount(Arc::clone(&self.disk), info)?;
        Ok(())
    }

    /// 打开或创建文件，返回全局文件表下标
    pub fn open(&mut self, path: &str, flags: OpenFlags) -> Result<usize> {
        if path.ends_with('/') {
            return Err(FileSystemError::IsADirectory(path.to_string()));
        }

        let record = self.current.search_file(path)?;
        let failure = if record.file_type == FileType::Directory {
            Some(FileSystemError::IsADirectory(path.to_string()))
        } else if path_depth(path) != path_depth(&record.searched_path) {
            // 中间某一层不存在
            Some(FileSystemError::NotFound(record.searched_path.clone()))
        } else {
            match (record.inode_no, flags.contains(OpenFlags::CREAT)) {
                (None, false) => Some(FileSystemError::NotFound(path.to_string())),
                (Some(_), true) => Some(FileSystemError::AlreadyExists(path.to_string())),
                _ => None,
            }
        };
        if let Some(e) = failure {
            self.current.close_dir(record.parent_dir);
            return Err(e);
        }

        let result = match record.inode_no {
            None => file::create_file(
                &mut self.current,
                &mut self.files,
                &record.parent_dir,
                last_component(path),
                flags,
            ),
            Some(inode_no) => {
                file::file_open(&mut self.current, &mut self.files, inode_no, flags, path)
            }
        };
        self.current.close_dir(record.parent_dir);
        result
    }

    pub fn close(&mut self, fd: usize) -> Result<()> {
        file::file_close(&mut self.current, &mut self.files, fd)
    }

    /// 从当前位置读，返回读到的字节数
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        file::file_read(&self.current, &mut self.files, fd, buf)
    }

    /// 在当前位置写，返回写入的字节数
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize> {
        file::file_write(&mut self.current, &mut self.files, fd, buf)
    }

    pub fn lseek(&mut self, fd: usize, pos: SeekFrom) -> Result<u32> {
        file::file_lseek(&self.current, &mut self.files, fd, pos)
    }

    pub fn open_files(&self) -> impl Iterator<Item = (usize, &OpenFile)> {
        self.files.iter()
    }

    /// 创建目录，返回新目录的 inode 号
    pub fn mkdir(&mut self, path: &str) -> Result<u32> {
        let record = self.current.search_file(path)?;
        let failure = if record.inode_no.is_some() {
            Some(FileSystemError::AlreadyExists(path.to_string()))
        } else if path_depth(path) != path_depth(&record.searched_path) {
            Some(FileSystemError::NotFound(record.searched_path.clone()))
        } else {
            None
        };
        if let Some(e) = failure {
            self.current.close_dir(record.parent_dir);
            return Err(e);
        }

        let result = self
            .current
            .make_dir(&record.parent_dir, last_component(path));
        self.current.close_dir(record.parent_dir);
        result
    }

    /// 打开目录用于遍历
    pub fn open_dir(&mut self, path: &str) -> Result<Dir> {
        if is_root_path(path) {
            return Ok(Dir::root());
        }
        let record = self.current.resolve(path)?;
        let result = match (record.file_type, record.inode_no) {
            (FileType::Directory, Some(inode_no)) => self.current.open_dir(inode_no),
            _ => Err(FileSystemError::NotADirectory(path.to_string())),
        };
        self.current.close_dir(record.parent_dir);
        result
    }

    pub fn read_dir(&self, dir: &mut Dir) -> Result<Option<DirEntry>> {
        self.current.read_dir(dir)
    }

    pub fn rewind_dir(&self, dir: &mut Dir) {
        self.current.rewind_dir(dir);
    }

    pub fn close_dir(&mut self, dir: Dir) {
        self.current.close_dir(dir);
    }

    pub fn stat(&mut self, path: &str) -> Result<FileStat> {
        if is_root_path(path) {
            let root = self.current.inode(ROOT_INODE_NO)?;
            return Ok(FileStat {
                inode_no: ROOT_INODE_NO,
                size: root.i_size,
                file_type: FileType::Directory,
            });
        }

        let record = self.current.resolve(path)?;
        self.current.close_dir(record.parent_dir);
        let inode_no = record
            .inode_no
            .ok_or_else(|| FileSystemError::NotFound(path.to_string()))?;

        let size = self.current.open_inode(inode_no)?.i_size;
        self.current.close_inode(inode_no);
        Ok(FileStat {
            inode_no,
            size,
            file_type: record.file_type,
        })
    }

    /// (空闲 inode 数, 空闲块数)
    pub fn free_counts(&self) -> (u32, u32) {
        (self.current.free_inodes(), self.current.free_blocks())
    }

    pub fn super_block(&self) -> &SuperBlock {
        &self.current.sb
    }
}

fn find_partition(partitions: &[PartitionInfo], name: &str) -> Result<PartitionInfo> {
    partitions
        .iter()
        .find(|p| p.name == name)
        .cloned()
        .ok_or_else(|| FileSystemError::PartitionNotFound(name.to_string()))
}
