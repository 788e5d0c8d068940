use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use canvasfs::config::{Config, ContextKind};
use canvasfs::fs::CanvasFs;
use canvasfs::fuse::{prepare_mount_point, FuseAdapter};
use canvasfs::storage::CanvasStorage;
use clap::Parser;
use tokio::runtime::Handle;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Mount Canvas LMS files as a read-only filesystem", long_about = None)]
struct Args {
    /// 要挂载的课程/用户/小组 ID
    context_id: u64,

    /// 挂载点路径
    mountpoint: PathBuf,

    /// 上下文类型
    #[arg(short, long, value_enum, default_value = "course")]
    context: ContextKind,

    /// Canvas 实例地址，如 https://canvas.example.edu
    #[arg(long, env = "CANVAS_URL")]
    canvas_url: String,

    /// API 访问令牌
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// 输出调试日志
    #[arg(short, long)]
    debug: bool,

    /// 打开 FUSE 调试输出
    #[arg(long)]
    debug_fuse: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 允许从 .env 读取 CANVAS_URL / ACCESS_TOKEN
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // 初始化日志系统，RUST_LOG 优先
    let default_level = if args.debug { "debug" } else { "info" };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(false)
        .init();

    let config = Config::new(&args.canvas_url, args.access_token, args.context, args.context_id)
        .context("invalid configuration")?;
    info!(
        "mounting {} {} from {} at {:?}",
        config.context, config.context_id, config.api_url, args.mountpoint
    );

    let storage = CanvasStorage::new(config).context("failed to build HTTP client")?;
    let fs = CanvasFs::new(Arc::new(storage));

    prepare_mount_point(&args.mountpoint)
        .with_context(|| format!("unusable mount point {:?}", args.mountpoint))?;

    let adapter = FuseAdapter::new(fs, Handle::current()).with_debug(args.debug_fuse);
    let session = adapter
        .spawn_mount(&args.mountpoint)
        .with_context(|| format!("failed to mount at {:?}", args.mountpoint))?;

    info!("mounted, press Ctrl+C to unmount");
    signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;

    info!("unmounting {:?}", args.mountpoint);
    // join 会阻塞到会话线程退出
    tokio::task::block_in_place(|| session.join());
    Ok(())
}
