use rustix::fs::OFlags;
use rustix::process::{getgid, getuid};

/// 目录权限：r-x 给所有人，无写位
pub const DIR_PERM: u16 = 0o555;
/// 普通文件权限：只读
pub const FILE_PERM: u16 = 0o444;
/// 目录的名义大小
pub const DIR_SIZE: u64 = 0;
pub const BLOCK_SIZE: u32 = 512;

/// 本地进程的属主，远端没有本地用户的概念
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

impl Ownership {
    pub fn current() -> Self {
        Self {
            uid: getuid().as_raw(),
            gid: getgid().as_raw(),
        }
    }
}

/// open(2) 的 flags 是否带写意图（O_WRONLY 或 O_RDWR）
pub fn wants_write(flags: i32) -> bool {
    let access = OFlags::from_bits_retain((flags & libc::O_ACCMODE) as u32);
    access.contains(OFlags::WRONLY) || access.contains(OFlags::RDWR)
}

pub fn blocks(size: u64) -> u64 {
    size.div_ceil(u64::from(BLOCK_SIZE))
}
