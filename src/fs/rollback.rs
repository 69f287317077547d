use log::warn;

use crate::fs::{file::FileTable, partition::Partition};

/// 多步操作中已经完成、失败时需要撤销的一步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Undo {
    /// inode 位已在内存中置位，尚未写回
    InodeBit(u32),
    /// 数据块已分配并写回位图
    Block(u32),
    /// 全局打开文件表的槽位已被占用
    FileSlot(usize),
}

/// 按完成顺序记录撤销动作，失败时逆序执行
#[derive(Debug, Default)]
pub struct Rollback {
    steps: Vec<Undo>,
}

impl Rollback {
    pub fn record(&mut self, undo: Undo) {
        self.steps.push(undo);
    }

    /// 操作成功，丢弃所有撤销动作
    pub fn commit(mut self) {
        self.steps.clear();
    }

    pub fn unwind(mut self, part: &mut Partition, mut files: Option<&mut FileTable>) {
        while let Some(step) = self.steps.pop() {
            warn!("rolling back {:?}", step);
            match step {
                Undo::FileSlot(fd) => {
                    if let Some(files) = files.as_deref_mut() {
                        files.release(fd);
                    }
                }
                Undo::Block(lba) => {
                    if let Err(e) = part.release_block(lba) {
                        warn!("failed to persist release of block {:#x}: {}", lba, e);
                    }
                }
                Undo::InodeBit(inode_no) => {
                    part.inode_bitmap.free(inode_no);
                }
            }
        }
    }
}
