use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fuser::{
    BackgroundSession, Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, Request,
};
use libc::c_int;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::fs::CanvasFs;

const TTL: Duration = Duration::from_secs(1);

/// 把 fuser 的回调转发给 [`CanvasFs`]。每个回调在 tokio 运行时上独立执行，
/// 等待网络时不会阻塞会话线程。
pub struct FuseAdapter {
    fs: Arc<CanvasFs>,
    runtime: Handle,
    debug: bool,
}

impl FuseAdapter {
    pub fn new(fs: CanvasFs, runtime: Handle) -> Self {
        Self {
            fs: Arc::new(fs),
            runtime,
            debug: false,
        }
    }

    /// 打开内核 FUSE 协议调试输出
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn mount_options(debug: bool) -> Vec<MountOption> {
        let mut options = vec![
            MountOption::RO,
            MountOption::FSName("canvas".into()),
            MountOption::AutoUnmount,
        ];
        if debug {
            options.push(MountOption::CUSTOM("debug".into()));
        }
        options
    }

    /// 在后台线程挂载；丢弃或 join 返回的会话即卸载
    pub fn spawn_mount(self, mount_point: &Path) -> io::Result<BackgroundSession> {
        info!("Mounting FUSE filesystem at {:?}", mount_point);
        let options = Self::mount_options(self.debug);
        fuser::spawn_mount2(self, mount_point, &options)
    }
}

/// 挂载点不存在则创建；存在则必须是目录
pub fn prepare_mount_point(mount_point: &Path) -> io::Result<()> {
    if !mount_point.exists() {
        info!("Creating mount point {:?}", mount_point);
        std::fs::create_dir_all(mount_point)?;
        return Ok(());
    }

    if !std::fs::metadata(mount_point)?.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("mount point {:?} is not a directory", mount_point),
        ));
    }
    Ok(())
}

impl Filesystem for FuseAdapter {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!("canvas filesystem initialised");
        Ok(())
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let fs = Arc::clone(&self.fs);
        let name = name.to_os_string();
        self.runtime.spawn(async move {
            match fs.lookup(parent, &name).await {
                Ok(attr) => reply.entry(&TTL, &attr, 0),
                Err(e) => {
                    debug!("lookup parent={}, name={:?}: {}", parent, name, e);
                    reply.error(e.errno());
                }
            }
        });
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.getattr(ino, None).await {
                Ok(attr) => reply.attr(&TTL, &attr),
                Err(e) => {
                    warn!("getattr ino={}: {}", ino, e);
                    reply.error(e.errno());
                }
            }
        });
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.opendir(ino).await {
                Ok(fh) => reply.opened(fh, 0),
                Err(e) => {
                    warn!("opendir ino={}: {}", ino, e);
                    reply.error(e.errno());
                }
            }
        });
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            let result = fs
                .readdir(fh, offset, |entry| {
                    reply.add(entry.attr.ino, entry.offset, entry.attr.kind, &entry.name)
                })
                .await;
            match result {
                Ok(()) => reply.ok(),
                Err(e) => {
                    warn!("readdir ino={}, offset={}: {}", ino, offset, e);
                    reply.error(e.errno());
                }
            }
        });
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.open(ino, flags).await {
                Ok(fh) => reply.opened(fh, 0),
                Err(e) => {
                    warn!("open ino={}, flags={:#o}: {}", ino, flags, e);
                    reply.error(e.errno());
                }
            }
        });
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.read(fh, offset, size).await {
                Ok(data) => {
                    debug!("read ino={}: {} bytes at {}", ino, data.len(), offset);
                    reply.data(&data);
                }
                Err(e) => {
                    warn!("read ino={}, offset={}, size={}: {}", ino, offset, size, e);
                    reply.error(e.errno());
                }
            }
        });
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.fs.release(fh);
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_mount_point_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mount_point = temp_dir.path().join("mnt").join("canvas");

        prepare_mount_point(&mount_point).unwrap();
        assert!(mount_point.is_dir());

        // 已存在的目录可以直接使用
        prepare_mount_point(&mount_point).unwrap();
    }

    #[test]
    fn test_prepare_mount_point_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let err = prepare_mount_point(&file).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_mount_options_are_read_only() {
        let options = FuseAdapter::mount_options(false);
        assert!(options.contains(&MountOption::RO));
        assert!(options.contains(&MountOption::FSName("canvas".into())));
        assert!(!options.contains(&MountOption::CUSTOM("debug".into())));
    }

    #[test]
    fn test_mount_options_debug() {
        let options = FuseAdapter::mount_options(true);
        assert!(options.contains(&MountOption::RO));
        assert!(options.contains(&MountOption::CUSTOM("debug".into())));
    }
}
