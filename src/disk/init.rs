use std::{path::PathBuf, sync::mpsc::Sender, sync::Arc};

use log::info;

use crate::{
    disk::{
        file_disk::FileDisk,
        partition::scan_partitions,
        types::{DISK_SECTORS, PARTITION_LAYOUT},
        BlockDevice,
    },
    fs::{config::DEFAULT_PARTITION, error::Result, FileSystem},
    shell::BootProgress,
};

/// 启动参数，可由环境变量覆盖
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfig {
    pub disk_path: PathBuf,
    pub partition: String,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            disk_path: PathBuf::from("disk.img"),
            partition: DEFAULT_PARTITION.to_string(),
        }
    }
}

impl BootConfig {
    /// SECTORFS_DISK 指定镜像路径，SECTORFS_PART 指定挂载的分区
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        Self {
            disk_path: lookup("SECTORFS_DISK")
                .map(PathBuf::from)
                .unwrap_or(default.disk_path),
            partition: lookup("SECTORFS_PART").unwrap_or(default.partition),
        }
    }
}

/// 在后台线程里打开磁盘镜像并挂载文件系统，进度通过 `tx` 汇报
pub fn perform_disk_initialization(config: BootConfig, tx: Sender<BootProgress>) {
    let result = boot(&config, &tx);
    // 接收端已退出时没人关心结果
    let _ = tx.send(BootProgress::Finished(result));
}

fn boot(config: &BootConfig, tx: &Sender<BootProgress>) -> Result<FileSystem> {
    let _ = tx.send(BootProgress::Step("🧠 Initializing virtual disk..."));
    let (disk, grown) = FileDisk::open(&config.disk_path, DISK_SECTORS)?;
    let _ = tx.send(BootProgress::Progress(30));

    let partitions = scan_partitions(disk.sector_count(), PARTITION_LAYOUT);
    info!("found {} partitions on {}", partitions.len(), config.disk_path.display());
    let _ = tx.send(BootProgress::Progress(50));

    if grown {
        let _ = tx.send(BootProgress::Step("🔧 New disk found, formatting partitions..."));
    } else {
        let _ = tx.send(BootProgress::Step("⚙️  Mounting file system..."));
    }
    let fs = FileSystem::init(Arc::new(disk), partitions, &config.partition)?;

    let _ = tx.send(BootProgress::Progress(100));
    Ok(fs)
}
