pub mod error;
pub mod config;
pub mod item;
pub mod storage;
pub mod posix;
pub mod fs;
pub mod fuse;

pub use error::{FsError, Result, StoreError, StoreResult};
pub use config::{Config, ContextKind};
pub use item::{File, Folder, FolderRef, Item, ItemKind};
pub use storage::{CanvasStorage, RemoteStore};
pub use fs::{CanvasFs, DirEntry, ROOT_INODE};
pub use fuse::FuseAdapter;
