//! 测试用的内存 `RemoteStore`

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::RemoteStore;
use crate::error::{StoreError, StoreResult};
use crate::item::{File, Folder, FolderRef, Item};

const CREATED: &str = "2020-01-01T00:00:00Z";
const UPDATED: &str = "2020-01-02T00:00:00Z";

#[derive(Debug, Default)]
pub(crate) struct MemoryStorage {
    root: Option<u64>,
    folders: HashMap<u64, Folder>,
    files: HashMap<u64, File>,
    listings: HashMap<String, Vec<Item>>,
    contents: HashMap<String, Vec<u8>>,
    denied: HashSet<u64>,
    failing: HashSet<String>,
    range_requests: Mutex<Vec<(u64, u32)>>,
}

impl MemoryStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn files_url(folder_id: u64) -> String {
        format!("mem://folders/{}/files", folder_id)
    }

    pub(crate) fn folders_url(folder_id: u64) -> String {
        format!("mem://folders/{}/folders", folder_id)
    }

    pub(crate) fn set_root(&mut self, folder_id: u64) {
        self.root = Some(folder_id);
    }

    pub(crate) fn add_folder(&mut self, id: u64, name: &str, parent: Option<u64>) -> Folder {
        let folder = Folder {
            id,
            name: name.to_string(),
            files_url: Self::files_url(id),
            folders_url: Self::folders_url(id),
            created_at: Some(CREATED.to_string()),
            updated_at: Some(UPDATED.to_string()),
            modified_at: None,
        };
        self.listings.entry(folder.files_url.clone()).or_default();
        self.listings.entry(folder.folders_url.clone()).or_default();
        if let Some(parent) = parent {
            self.listings
                .entry(Self::folders_url(parent))
                .or_default()
                .push(Item::Folder(folder.clone()));
        }
        self.folders.insert(id, folder.clone());
        folder
    }

    pub(crate) fn add_file(&mut self, id: u64, name: &str, parent: u64, content: &[u8]) -> File {
        let url = format!("mem://files/{}", id);
        let file = File {
            id,
            display_name: name.to_string(),
            filename: Some(name.to_string()),
            size: content.len() as u64,
            url: Some(url.clone()),
            created_at: Some(CREATED.to_string()),
            updated_at: Some(UPDATED.to_string()),
            modified_at: None,
        };
        self.contents.insert(url, content.to_vec());
        self.listings
            .entry(Self::files_url(parent))
            .or_default()
            .push(Item::File(file.clone()));
        self.files.insert(id, file.clone());
        file
    }

    /// 之后对该 ID 的解析都返回 Unauthorized
    pub(crate) fn deny(&mut self, id: u64) {
        self.denied.insert(id);
    }

    /// 模拟被锁定的文件：元数据中不再带 `url`
    pub(crate) fn lock_file(&mut self, id: u64) {
        if let Some(file) = self.files.get_mut(&id) {
            file.url = None;
        }
    }

    pub(crate) fn fail_listing(&mut self, locator: &str) {
        self.failing.insert(locator.to_string());
    }

    pub(crate) fn range_requests(&self) -> Vec<(u64, u32)> {
        self.range_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryStorage {
    async fn get_folder(&self, folder: FolderRef) -> StoreResult<Folder> {
        let id = match folder {
            FolderRef::Root => self
                .root
                .ok_or_else(|| StoreError::NotFound("root".into()))?,
            FolderRef::Id(id) => id,
        };
        if self.denied.contains(&id) {
            return Err(StoreError::Unauthorized(format!("folder {}", id)));
        }
        self.folders
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("folder {}", id)))
    }

    async fn get_file(&self, file_id: u64) -> StoreResult<File> {
        if self.denied.contains(&file_id) {
            return Err(StoreError::Unauthorized(format!("file {}", file_id)));
        }
        self.files
            .get(&file_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("file {}", file_id)))
    }

    async fn fetch_listing(&self, locator: &str) -> StoreResult<Vec<Item>> {
        if self.failing.contains(locator) {
            return Err(StoreError::Connectivity(format!("{}: connection reset", locator)));
        }
        Ok(self.listings.get(locator).cloned().unwrap_or_default())
    }

    async fn read_range(&self, content_url: &str, offset: u64, length: u32) -> StoreResult<Vec<u8>> {
        self.range_requests.lock().unwrap().push((offset, length));
        let content = self
            .contents
            .get(content_url)
            .ok_or_else(|| StoreError::NotFound(content_url.to_string()))?;
        let len = content.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(u64::from(length)).min(len) as usize;
        Ok(content[start..end].to_vec())
    }
}
