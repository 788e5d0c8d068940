use libc::{c_int, EACCES, ENOENT};
use thiserror::Error;

/// 远端存储客户端的失败类型
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Remote item not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Connectivity failure: {0}")]
    Connectivity(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Connectivity(e.to_string())
    }
}

/// 文件系统边界上的失败类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("No such entry: {0}")]
    NoSuchEntry(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl FsError {
    /// FsError -> errno
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NoSuchEntry(_) => ENOENT,
            FsError::PermissionDenied(_) => EACCES,
        }
    }
}

/// 客户端的所有失败（包括 Unauthorized）在边界上统一为 NoSuchEntry
impl From<StoreError> for FsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg)
            | StoreError::Unauthorized(msg)
            | StoreError::Connectivity(msg)
            | StoreError::Malformed(msg) => FsError::NoSuchEntry(msg),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type Result<T> = std::result::Result<T, FsError>;
