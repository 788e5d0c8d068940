use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// 远端时间戳格式
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// 文件夹的寻址方式：数字 ID 或上下文根目录的符号路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderRef {
    Root,
    Id(u64),
}

impl FolderRef {
    /// 拼在 `.../folders/` 之后的路径段
    pub fn path_segment(&self) -> String {
        match self {
            FolderRef::Root => "by_path/".to_string(),
            FolderRef::Id(id) => id.to_string(),
        }
    }
}

impl From<u64> for FolderRef {
    fn from(id: u64) -> Self {
        FolderRef::Id(id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Folder {
    pub id: u64,
    pub name: String,
    pub files_url: String,
    pub folders_url: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct File {
    pub id: u64,
    pub display_name: String,
    #[serde(default)]
    pub filename: Option<String>,
    pub size: u64,
    /// 文件对当前用户锁定时没有该字段
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Folder,
    File,
}

/// 远端条目，构造时即确定类型
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Folder(Folder),
    File(File),
}

/// 远端不带类型标记，只能按字段判断：有 `name` 的是文件夹，有 `display_name` 的是文件
pub fn classify(value: &Value) -> Option<ItemKind> {
    let obj = value.as_object()?;
    if obj.contains_key("name") {
        Some(ItemKind::Folder)
    } else if obj.contains_key("display_name") {
        Some(ItemKind::File)
    } else {
        None
    }
}

impl Item {
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match classify(&value) {
            Some(ItemKind::Folder) => serde_json::from_value(value)
                .map(Item::Folder)
                .map_err(|e| StoreError::Malformed(format!("folder: {}", e))),
            Some(ItemKind::File) => serde_json::from_value(value)
                .map(Item::File)
                .map_err(|e| StoreError::Malformed(format!("file: {}", e))),
            None => Err(StoreError::Malformed(
                "item carries neither name nor display_name".into(),
            )),
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Item::Folder(folder) => folder.id,
            Item::File(file) => file.id,
        }
    }

    /// 目录项中显示的名字
    pub fn name(&self) -> &str {
        match self {
            Item::Folder(folder) => &folder.name,
            Item::File(file) => &file.display_name,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Folder(_) => ItemKind::Folder,
            Item::File(_) => ItemKind::File,
        }
    }

    pub fn timestamps(&self) -> Timestamps {
        let (created, updated, modified) = match self {
            Item::Folder(f) => (&f.created_at, &f.updated_at, &f.modified_at),
            Item::File(f) => (&f.created_at, &f.updated_at, &f.modified_at),
        };
        let updated_time = timestamp_or_epoch(updated.as_deref());

        Timestamps {
            created: timestamp_or_epoch(created.as_deref()),
            updated: updated_time,
            modified: match modified.as_deref() {
                Some(m) => timestamp_or_epoch(Some(m)),
                None => updated_time,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub created: SystemTime,
    pub updated: SystemTime,
    /// 有 `modified_at` 时取之，否则取 `updated_at`
    pub modified: SystemTime,
}

/// 解析为 Unix 秒；不符合固定格式时退回 RFC 3339
pub fn parse_timestamp(s: &str) -> Option<i64> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Some(naive.and_utc().timestamp());
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp())
}

pub fn unix_to_system_time(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

fn timestamp_or_epoch(s: Option<&str>) -> SystemTime {
    match s {
        Some(raw) => match parse_timestamp(raw) {
            Some(secs) => unix_to_system_time(secs),
            None => {
                warn!("unparseable timestamp {:?}, using epoch", raw);
                UNIX_EPOCH
            }
        },
        None => UNIX_EPOCH,
    }
}
