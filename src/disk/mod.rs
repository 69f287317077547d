pub mod block_device;
pub mod file_disk;
pub mod init;
#[cfg(test)]
pub mod mem_disk;
pub mod partition;
pub mod types;

pub use block_device::BlockDevice;
pub use file_disk::FileDisk;
pub use partition::{scan_partitions, PartitionInfo};
pub use types::{Sector, SECTOR_SIZE};
