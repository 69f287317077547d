use log::debug;

use crate::fs::{
    config::{MAX_FILE_NAME_LEN, MAX_PATH_LEN, ROOT_INODE_NO},
    directory::{Dir, FileType},
    error::{FileSystemError, Result},
    partition::Partition,
};

/// 解析路径的第一层：跳过开头的 '/'，取到下一个 '/' 为止。
/// 返回 (名字, 剩余路径)，剩余部分为空时返回 None。
pub fn parse_component(path: &str) -> (&str, Option<&str>) {
    let path = path.trim_start_matches('/');
    let end = path.find('/').unwrap_or(path.len());
    let (name, rest) = path.split_at(end);
    (name, (!rest.is_empty()).then_some(rest))
}

/// 路径的层数，"/" 为 0
pub fn path_depth(path: &str) -> usize {
    let mut depth = 0;
    let (mut name, mut rest) = parse_component(path);
    while !name.is_empty() {
        depth += 1;
        (name, rest) = match rest {
            Some(p) => parse_component(p),
            None => ("", None),
        };
    }
    depth
}

pub fn is_root_path(path: &str) -> bool {
    matches!(path, "/" | "/." | "/..")
}

/// 路径的最后一层名字
pub fn last_component(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// 一次路径查找的结果。
///
/// `parent_dir` 始终处于打开状态，调用者用完后必须 `close_dir`。
#[derive(Debug)]
pub struct PathSearch {
    /// 已经查找过的路径前缀，找不到时可据此判断缺的是哪一层
    pub searched_path: String,
    pub parent_dir: Dir,
    pub file_type: FileType,
    /// 找到的 inode 号，没找到为 None
    pub inode_no: Option<u32>,
}

impl Partition {
    /// 逐层查找 `pathname`。最后一层没找到不算错误，返回的 `inode_no` 为 None，
    /// `parent_dir` 是查找停下时所在的目录。
    pub fn search_file(&mut self, pathname: &str) -> Result<PathSearch> {
        if is_root_path(pathname) {
            return Ok(PathSearch {
                searched_path: String::new(),
                parent_dir: Dir::root(),
                file_type: FileType::Directory,
                inode_no: Some(ROOT_INODE_NO),
            });
        }
        if !pathname.starts_with('/') || pathname.len() >= MAX_PATH_LEN {
            return Err(FileSystemError::InvalidPath(pathname.to_string()));
        }

        let mut searched_path = String::new();
        let mut parent_dir = Dir::root();
        let mut parent_inode_no = ROOT_INODE_NO;
        let mut last_dir_no = ROOT_INODE_NO;

        let (mut name, mut sub_path) = parse_component(pathname);
        while !name.is_empty() {
            if name.len() > MAX_FILE_NAME_LEN {
                self.close_dir(parent_dir);
                return Err(FileSystemError::NameTooLong(name.to_string()));
            }
            searched_path.push('/');
            searched_path.push_str(name);

            let found = match self.search_dir_entry(&parent_dir, name) {
                Ok(found) => found,
                Err(e) => {
                    self.close_dir(parent_dir);
                    return Err(e);
                }
            };
            let entry = match found {
                Some(entry) if !entry.is_free() => entry,
                _ => {
                    return Ok(PathSearch {
                        searched_path,
                        parent_dir,
                        file_type: FileType::Unknown,
                        inode_no: None,
                    })
                }
            };

            (name, sub_path) = match sub_path {
                Some(p) => parse_component(p),
                None => ("", None),
            };

            match entry.f_type {
                FileType::Directory => {
                    parent_inode_no = parent_dir.inode_no;
                    self.close_dir(parent_dir);
                    parent_dir = self.open_dir(entry.i_no)?;
                    last_dir_no = entry.i_no;
                }
                _ => {
                    return Ok(PathSearch {
                        searched_path,
                        parent_dir,
                        file_type: FileType::Regular,
                        inode_no: Some(entry.i_no),
                    })
                }
            }
        }

        // 最后一层是目录：交给调用者的是它的父目录
        self.close_dir(parent_dir);
        let parent_dir = self.open_dir(parent_inode_no)?;
        debug!(
            "{} resolved to directory inode {} under {}",
            pathname, last_dir_no, parent_inode_no
        );
        Ok(PathSearch {
            searched_path,
            parent_dir,
            file_type: FileType::Directory,
            inode_no: Some(last_dir_no),
        })
    }

    /// 和 `search_file` 一样，但没找到时关闭父目录并返回 NotFound
    pub fn resolve(&mut self, pathname: &str) -> Result<PathSearch> {
        let record = self.search_file(pathname)?;
        if record.inode_no.is_none() {
            self.close_dir(record.parent_dir);
            return Err(FileSystemError::NotFound(pathname.to_string()));
        }
        Ok(record)
    }
}
