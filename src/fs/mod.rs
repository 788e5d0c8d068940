use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{FileAttr, FileType, FUSE_ROOT_ID};
use tracing::debug;

use crate::error::{FsError, Result};
use crate::item::{FolderRef, Item};
use crate::posix::{self, Ownership, BLOCK_SIZE, DIR_PERM, DIR_SIZE, FILE_PERM};
use crate::storage::RemoteStore;

/// 根目录的保留 inode，其余 inode 直接等于远端 ID
pub const ROOT_INODE: u64 = FUSE_ROOT_ID;

/// readdir 发出的一个目录项；`offset` 是下一次续读的位置
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub attr: FileAttr,
    pub offset: i64,
}

/// 远端文件存储之上的只读文件系统操作。不持有任何跨调用的可变状态。
#[derive(Debug, Clone)]
pub struct CanvasFs {
    store: Arc<dyn RemoteStore>,
    owner: Ownership,
}

impl CanvasFs {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            owner: Ownership::current(),
        }
    }

    fn folder_ref(inode: u64) -> FolderRef {
        if inode == ROOT_INODE {
            FolderRef::Root
        } else {
            FolderRef::Id(inode)
        }
    }

    fn root_attr(&self) -> FileAttr {
        let epoch = UNIX_EPOCH + Duration::from_secs(1);
        FileAttr {
            ino: ROOT_INODE,
            size: DIR_SIZE,
            blocks: 0,
            atime: epoch,
            mtime: epoch,
            ctime: epoch,
            crtime: epoch,
            kind: FileType::Directory,
            perm: DIR_PERM,
            nlink: 2,
            uid: self.owner.uid,
            gid: self.owner.gid,
            rdev: 0,
            flags: 0,
            blksize: BLOCK_SIZE,
        }
    }

    fn item_attr(&self, inode: u64, item: &Item) -> FileAttr {
        let (kind, perm, size, nlink) = match item {
            Item::Folder(_) => (FileType::Directory, DIR_PERM, DIR_SIZE, 2),
            Item::File(file) => (FileType::RegularFile, FILE_PERM, file.size, 1),
        };
        let times = item.timestamps();

        FileAttr {
            ino: inode,
            size,
            blocks: posix::blocks(size),
            atime: times.updated,
            mtime: times.modified,
            ctime: times.created,
            crtime: times.created,
            kind,
            perm,
            nlink,
            uid: self.owner.uid,
            gid: self.owner.gid,
            rdev: 0,
            flags: 0,
            blksize: BLOCK_SIZE,
        }
    }

    /// `item` 为调用方已取到的条目（如来自列表），有则不再请求远端
    pub async fn getattr(&self, inode: u64, item: Option<&Item>) -> Result<FileAttr> {
        if inode == ROOT_INODE {
            return Ok(self.root_attr());
        }

        if let Some(item) = item {
            return Ok(self.item_attr(inode, item));
        }

        match self.store.get_item(inode).await? {
            Some(item) => Ok(self.item_attr(inode, &item)),
            None => Err(FsError::NoSuchEntry(format!("inode {}", inode))),
        }
    }

    /// 只在父目录的文件中查找，不查子文件夹
    pub async fn lookup(&self, parent: u64, name: &OsStr) -> Result<FileAttr> {
        debug!("lookup: parent={}, name={:?}", parent, name);
        let files = self.store.list_files(Self::folder_ref(parent)).await?;

        let found = files
            .iter()
            .find(|item| item.name().as_bytes() == name.as_bytes())
            .ok_or_else(|| FsError::NoSuchEntry(format!("{:?} in {}", name, parent)))?;

        self.getattr(found.id(), Some(found)).await
    }

    /// 只有文件夹可以作为目录打开；句柄即 inode
    pub async fn opendir(&self, inode: u64) -> Result<u64> {
        if inode == ROOT_INODE {
            return Ok(ROOT_INODE);
        }

        match self.store.get_item(inode).await? {
            Some(Item::Folder(_)) => Ok(inode),
            Some(Item::File(_)) => Err(FsError::NoSuchEntry(format!("{} is not a folder", inode))),
            None => Err(FsError::NoSuchEntry(format!("inode {}", inode))),
        }
    }

    /// 每次调用都重新计算完整列表，再从 `offset` 处切片发出。
    /// `emit` 返回 true 表示调用方缓冲已满，遍历就此停止。
    pub async fn readdir<F>(&self, fh: u64, offset: i64, mut emit: F) -> Result<()>
    where
        F: FnMut(DirEntry) -> bool + Send,
    {
        let children = self.store.list_children(Self::folder_ref(fh)).await?;
        let start = usize::try_from(offset).unwrap_or(0);
        debug!("readdir: fh={}, offset={}, total={}", fh, offset, children.len());

        for (i, item) in children.iter().enumerate().skip(start) {
            let entry = DirEntry {
                name: item.name().to_string(),
                attr: self.getattr(item.id(), Some(item)).await?,
                offset: (i + 1) as i64,
            };
            if emit(entry) {
                break;
            }
        }
        Ok(())
    }

    /// 只读文件系统：带写意图的打开一律拒绝；句柄即文件 ID
    pub async fn open(&self, inode: u64, flags: i32) -> Result<u64> {
        if posix::wants_write(flags) {
            return Err(FsError::PermissionDenied(format!("write access to {}", inode)));
        }

        self.store
            .get_file(inode)
            .await
            .map_err(|e| FsError::NoSuchEntry(format!("open {}: {}", inode, e)))?;
        Ok(inode)
    }

    /// 按范围读取；越过文件末尾时返回较短（或空）的缓冲区
    pub async fn read(&self, fh: u64, offset: i64, size: u32) -> Result<Vec<u8>> {
        let file = self
            .store
            .get_file(fh)
            .await
            .map_err(|e| FsError::NoSuchEntry(format!("read {}: {}", fh, e)))?;

        let offset = u64::try_from(offset).unwrap_or(0);
        if offset >= file.size || size == 0 {
            return Ok(Vec::new());
        }
        let length = u64::from(size).min(file.size - offset) as u32;

        let url = file
            .url
            .as_deref()
            .ok_or_else(|| FsError::PermissionDenied(format!("{} is locked", file.display_name)))?;

        debug!("read: fh={}, offset={}, length={}", fh, offset, length);
        Ok(self.store.read_range(url, offset, length).await?)
    }

    pub fn release(&self, fh: u64) {
        debug!("release: fh={}", fh);
    }
}
