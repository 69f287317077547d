use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    disk::{BlockDevice, PartitionInfo, Sector, SECTOR_SIZE},
    fs::{
        bitmap::Bitmap,
        config::{BITS_PER_SECTOR, FS_MAGIC, MAX_FILES_PER_PART, ROOT_INODE_NO},
        directory::{DirEntry, FileType, DIR_ENTRY_SIZE},
        error::{FileSystemError, Result},
        inode_table::{DiskInode, DISK_INODE_SIZE},
    },
    utils::{div_round_up, encode_into},
};

/// 超级块记录在磁盘上的字节数（13 个 u32），其余部分补零到一个扇区
pub const SUPER_BLOCK_RECORD_SIZE: usize = 13 * 4;

const _: () = assert!(SUPER_BLOCK_RECORD_SIZE <= SECTOR_SIZE);

/// 超级块，位于分区的第 1 个扇区（第 0 个是引导扇区）。
///
/// 各区域按 引导块、超级块、块位图、inode 位图、inode 表、数据区 的顺序
/// 首尾相接地排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub magic: u32,
    pub sec_cnt: u32,
    pub inode_cnt: u32,
    pub part_lba_base: u32,

    pub block_bitmap_lba: u32,
    pub block_bitmap_sects: u32,

    pub inode_bitmap_lba: u32,
    pub inode_bitmap_sects: u32,

    pub inode_table_lba: u32,
    pub inode_table_sects: u32,

    pub data_start_lba: u32,
    pub root_inode_no: u32,
    pub dir_entry_size: u32,
}

/// 格式化时计算出的布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub sb: SuperBlock,
    /// 块位图中真正对应数据块的位数，之后的位全部置 1
    pub block_bitmap_bit_len: u32,
}

impl SuperBlock {
    /// 根据分区大小计算各区域位置
    pub fn layout(part: &PartitionInfo) -> Result<Layout> {
        let bits_per_sector = BITS_PER_SECTOR as u32;
        let boot_sector_sects = 1;
        let super_block_sects = 1;
        let inode_bitmap_sects = div_round_up(MAX_FILES_PER_PART, bits_per_sector);
        let inode_table_sects = div_round_up(
            MAX_FILES_PER_PART * DISK_INODE_SIZE as u32,
            SECTOR_SIZE as u32,
        );

        let used_sects =
            boot_sector_sects + super_block_sects + inode_bitmap_sects + inode_table_sects;
        let free_sects = part.sec_cnt.checked_sub(used_sects).ok_or_else(|| {
            FileSystemError::InvalidConfig(format!(
                "partition {} has {} sectors, metadata needs {}",
                part.name, part.sec_cnt, used_sects
            ))
        })?;

        // 块位图本身也占空闲区，先粗算一次，扣掉位图自己的扇区后再算一次
        let block_bitmap_sects = div_round_up(free_sects, bits_per_sector);
        if free_sects <= block_bitmap_sects {
            return Err(FileSystemError::InvalidConfig(format!(
                "partition {} leaves no room for data blocks",
                part.name
            )));
        }
        let block_bitmap_bit_len = free_sects - block_bitmap_sects;
        let block_bitmap_sects = div_round_up(block_bitmap_bit_len, bits_per_sector);

        let block_bitmap_lba = part.start_lba + boot_sector_sects + super_block_sects;
        let inode_bitmap_lba = block_bitmap_lba + block_bitmap_sects;
        let inode_table_lba = inode_bitmap_lba + inode_bitmap_sects;
        let data_start_lba = inode_table_lba + inode_table_sects;

        Ok(Layout {
            sb: SuperBlock {
                magic: FS_MAGIC,
                sec_cnt: part.sec_cnt,
                inode_cnt: MAX_FILES_PER_PART,
                part_lba_base: part.start_lba,
                block_bitmap_lba,
                block_bitmap_sects,
                inode_bitmap_lba,
                inode_bitmap_sects,
                inode_table_lba,
                inode_table_sects,
                data_start_lba,
                root_inode_no: ROOT_INODE_NO,
                dir_entry_size: DIR_ENTRY_SIZE as u32,
            },
            block_bitmap_bit_len,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.magic == FS_MAGIC
    }

    pub fn to_sector(&self) -> Result<Sector> {
        let mut sector = [0u8; SECTOR_SIZE];
        encode_into(&mut sector, self)?;
        Ok(sector)
    }

    pub fn from_sector(sector: &Sector) -> Result<Self> {
        Ok(bincode::deserialize(&sector[..SUPER_BLOCK_RECORD_SIZE])?)
    }

    /// 读分区的超级块扇区，魔数不对时返回 None
    pub fn detect(disk: &dyn BlockDevice, part: &PartitionInfo) -> Result<Option<Self>> {
        let mut sector = [0u8; SECTOR_SIZE];
        disk.read_sector(part.start_lba + 1, &mut sector)?;
        let sb = Self::from_sector(&sector)?;
        Ok(sb.is_valid().then_some(sb))
    }
}

/// 格式化分区：写超级块、两张位图、inode 表和根目录。
/// 没有回滚，只在分区上没有文件系统时调用。
pub fn format(disk: &dyn BlockDevice, part: &PartitionInfo) -> Result<SuperBlock> {
    let Layout {
        sb,
        block_bitmap_bit_len,
    } = SuperBlock::layout(part)?;

    info!("{} info:", part.name);
    info!("    magic: {:#x}", sb.magic);
    info!("    part_lba_base: {:#x}", sb.part_lba_base);
    info!("    all_sectors: {:#x}", sb.sec_cnt);
    info!("    inode_cnt: {:#x}", sb.inode_cnt);
    info!(
        "    block_bitmap_lba: {:#x}, sectors: {:#x}",
        sb.block_bitmap_lba, sb.block_bitmap_sects
    );
    info!(
        "    inode_bitmap_lba: {:#x}, sectors: {:#x}",
        sb.inode_bitmap_lba, sb.inode_bitmap_sects
    );
    info!(
        "    inode_table_lba: {:#x}, sectors: {:#x}",
        sb.inode_table_lba, sb.inode_table_sects
    );
    info!("    data_start_lba: {:#x}", sb.data_start_lba);

    // 1. 超级块写到分区第 1 个扇区
    disk.write_sector(part.start_lba + 1, &sb.to_sector()?)?;
    debug!("super_block_lba: {:#x}", part.start_lba + 1);

    // 2. 块位图：第 0 块留给根目录，超出数据区的位全部置 1
    let mut block_bitmap = Bitmap::new(sb.block_bitmap_sects);
    block_bitmap.set(0, true);
    for bit in block_bitmap_bit_len as usize..block_bitmap.bit_len() {
        block_bitmap.set(bit, true);
    }
    block_bitmap.write_all(disk, sb.block_bitmap_lba)?;

    // 3. inode 位图：第 0 个 inode 留给根目录
    let mut inode_bitmap = Bitmap::new(sb.inode_bitmap_sects);
    inode_bitmap.set(ROOT_INODE_NO as usize, true);
    inode_bitmap.write_all(disk, sb.inode_bitmap_lba)?;

    // 4. inode 表：清零，写入根目录 inode
    let mut inode_table = vec![0u8; sb.inode_table_sects as usize * SECTOR_SIZE];
    let mut root = DiskInode {
        i_no: ROOT_INODE_NO,
        i_size: sb.dir_entry_size * 2,
        ..DiskInode::default()
    };
    root.i_sectors[0] = sb.data_start_lba;
    let offset = ROOT_INODE_NO as usize * DISK_INODE_SIZE;
    encode_into(&mut inode_table[offset..offset + DISK_INODE_SIZE], &root)?;
    disk.write_sectors(sb.inode_table_lba, &inode_table)?;

    // 5. 根目录的 . 和 .. 都指向自己
    let mut root_dir = [0u8; SECTOR_SIZE];
    let entry_size = sb.dir_entry_size as usize;
    let dot = DirEntry::new(".", ROOT_INODE_NO, FileType::Directory)?;
    let dotdot = DirEntry::new("..", ROOT_INODE_NO, FileType::Directory)?;
    encode_into(&mut root_dir[..entry_size], &dot)?;
    encode_into(&mut root_dir[entry_size..entry_size * 2], &dotdot)?;
    disk.write_sector(sb.data_start_lba, &root_dir)?;
    debug!("root_dir_lba: {:#x}", sb.data_start_lba);

    info!("{} format done", part.name);
    Ok(sb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::mem_disk::MemDisk;

    fn part(start_lba: u32, sec_cnt: u32) -> PartitionInfo {
        PartitionInfo {
            name: "test".to_string(),
            start_lba,
            sec_cnt,
        }
    }

    #[test]
    fn record_fits_declared_size() {
        let sb = SuperBlock::layout(&part(0, 2048)).unwrap().sb;
        assert_eq!(
            bincode::serialized_size(&sb).unwrap() as usize,
            SUPER_BLOCK_RECORD_SIZE
        );
    }

    #[test]
    fn regions_are_contiguous_for_many_sizes() {
        for sec_cnt in [600, 1000, 4096, 5000, 16384, 40000, 100_000] {
            let p = part(2048, sec_cnt);
            let Layout {
                sb,
                block_bitmap_bit_len,
            } = SuperBlock::layout(&p).unwrap();

            assert_eq!(sb.block_bitmap_lba, p.start_lba + 2);
            assert_eq!(sb.block_bitmap_lba + sb.block_bitmap_sects, sb.inode_bitmap_lba);
            assert_eq!(sb.inode_bitmap_lba + sb.inode_bitmap_sects, sb.inode_table_lba);
            assert_eq!(sb.inode_table_lba + sb.inode_table_sects, sb.data_start_lba);
            assert!(sb.block_bitmap_lba < sb.inode_bitmap_lba);
            assert!(sb.inode_bitmap_lba < sb.inode_table_lba);
            assert!(sb.inode_table_lba < sb.data_start_lba);

            // 位图描述的数据块不能越过分区末尾
            assert!(sb.data_start_lba + block_bitmap_bit_len <= p.start_lba + p.sec_cnt);
            assert!(block_bitmap_bit_len <= sb.block_bitmap_sects * BITS_PER_SECTOR as u32);
        }
    }

    #[test]
    fn too_small_partition_is_rejected() {
        assert!(matches!(
            SuperBlock::layout(&part(0, 100)),
            Err(FileSystemError::InvalidConfig(_))
        ));
    }

    #[test]
    fn detects_formatted_partition() {
        let disk = MemDisk::new(4096);
        let p = part(100, 2000);
        assert_eq!(SuperBlock::detect(&disk, &p).unwrap(), None);

        let sb = format(&disk, &p).unwrap();
        assert_eq!(SuperBlock::detect(&disk, &p).unwrap(), Some(sb));
    }

    #[test]
    fn block_bitmap_padding_is_bit_exact() {
        let disk = MemDisk::new(4096);
        let p = part(0, 1000);
        let Layout {
            sb,
            block_bitmap_bit_len,
        } = SuperBlock::layout(&p).unwrap();
        format(&disk, &p).unwrap();

        let bitmap = Bitmap::load(&disk, sb.block_bitmap_lba, sb.block_bitmap_sects).unwrap();
        assert!(bitmap.test(0));
        for bit in 1..block_bitmap_bit_len as usize {
            assert!(!bitmap.test(bit), "bit {} should be free", bit);
        }
        for bit in block_bitmap_bit_len as usize..bitmap.bit_len() {
            assert!(bitmap.test(bit), "bit {} should be reserved", bit);
        }
        assert_eq!(bitmap.count_free() as u32, block_bitmap_bit_len - 1);

        let inodes = Bitmap::load(&disk, sb.inode_bitmap_lba, sb.inode_bitmap_sects).unwrap();
        assert!(inodes.test(0));
        assert_eq!(inodes.scan_free(), Some(1));
    }
}
