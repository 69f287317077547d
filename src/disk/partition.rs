use log::warn;

use crate::disk::types::PARTITION_ALIGN_LBA;

/// 磁盘上的一个分区：一段连续的 LBA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub name: String,
    pub start_lba: u32,
    pub sec_cnt: u32,
}

/// 按布局表切分磁盘，放不下的分区跳过
pub fn scan_partitions(total_sectors: u32, layout: &[(&str, u32)]) -> Vec<PartitionInfo> {
    let mut parts = Vec::with_capacity(layout.len());
    let mut next_lba = PARTITION_ALIGN_LBA as u64;

    for &(name, sec_cnt) in layout {
        if next_lba + sec_cnt as u64 > total_sectors as u64 {
            warn!(
                "partition {} ({} sectors at lba {}) does not fit on a {}-sector disk",
                name, sec_cnt, next_lba, total_sectors
            );
            continue;
        }
        parts.push(PartitionInfo {
            name: name.to_string(),
            start_lba: next_lba as u32,
            sec_cnt,
        });
        next_lba += sec_cnt as u64;
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::types::{DISK_SECTORS, PARTITION_LAYOUT};

    #[test]
    fn default_layout_fills_the_disk() {
        let parts = scan_partitions(DISK_SECTORS, PARTITION_LAYOUT);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "sdb1");
        assert_eq!(parts[0].start_lba, 2048);
        assert_eq!(parts[1].start_lba, parts[0].start_lba + parts[0].sec_cnt);
        assert_eq!(parts[1].start_lba + parts[1].sec_cnt, DISK_SECTORS);
    }

    #[test]
    fn oversized_partition_is_skipped() {
        let parts = scan_partitions(4096, &[("big", 8192), ("small", 1024)]);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "small");
        assert_eq!(parts[0].start_lba, 2048);
    }
}
