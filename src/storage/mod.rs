use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK, RANGE};
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::item::{File, Folder, FolderRef, Item};

#[cfg(test)]
pub(crate) mod memory;

/// 每页请求的条目数
const PER_PAGE: u32 = 100;

/// 远端文件存储。实现只需提供四个原语，其余操作由默认方法组合而成。
#[async_trait]
pub trait RemoteStore: Send + Sync + std::fmt::Debug {
    async fn get_folder(&self, folder: FolderRef) -> StoreResult<Folder>;

    async fn get_file(&self, file_id: u64) -> StoreResult<File>;

    /// 获取列表定位符（`files_url` / `folders_url`）指向的全部条目，保持远端顺序
    async fn fetch_listing(&self, locator: &str) -> StoreResult<Vec<Item>>;

    /// 读取 `[offset, offset + length - 1]`，文件末尾处可能短于 `length`
    async fn read_range(&self, content_url: &str, offset: u64, length: u32) -> StoreResult<Vec<u8>>;

    /// 先按文件夹解析，NotFound 时再按文件解析；两者都不存在时返回 None
    async fn get_item(&self, id: u64) -> StoreResult<Option<Item>> {
        match self.get_folder(FolderRef::Id(id)).await {
            Ok(folder) => return Ok(Some(Item::Folder(folder))),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        match self.get_file(id).await {
            Ok(file) => Ok(Some(Item::File(file))),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_files(&self, folder: FolderRef) -> StoreResult<Vec<Item>> {
        let resolved = self.get_folder(folder).await?;
        self.fetch_listing(&resolved.files_url).await
    }

    async fn list_folders(&self, folder: FolderRef) -> StoreResult<Vec<Item>> {
        let resolved = self.get_folder(folder).await?;
        self.fetch_listing(&resolved.folders_url).await
    }

    /// 文件在前、子文件夹在后；任一子请求失败则整体失败
    async fn list_children(&self, folder: FolderRef) -> StoreResult<Vec<Item>> {
        let resolved = self.get_folder(folder).await?;
        let (mut files, folders) = futures::try_join!(
            self.fetch_listing(&resolved.files_url),
            self.fetch_listing(&resolved.folders_url),
        )?;
        files.extend(folders);
        Ok(files)
    }
}

/// Canvas REST API 上的一个上下文（课程/用户/小组）
#[derive(Debug, Clone)]
pub struct CanvasStorage {
    client: Client,
    config: Config,
}

impl CanvasStorage {
    pub fn new(config: Config) -> StoreResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("canvasfs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    fn folder_url(&self, folder: FolderRef) -> String {
        format!("{}/folders/{}", self.config.context_url(), folder.path_segment())
    }

    fn file_url(&self, file_id: u64) -> String {
        format!("{}/files/{}", self.config.context_url(), file_id)
    }

    async fn get(&self, url: &str) -> StoreResult<Response> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        check_status(response.status(), url)?;
        Ok(response)
    }
}

#[async_trait]
impl RemoteStore for CanvasStorage {
    async fn get_folder(&self, folder: FolderRef) -> StoreResult<Folder> {
        let url = self.folder_url(folder);
        let response = self.get(&url).await?;

        match folder {
            // by_path 返回从上下文根开始的路径数组，根目录是最后一个
            FolderRef::Root => {
                let path: Vec<Folder> = decode(response, &url).await?;
                path.into_iter()
                    .last()
                    .ok_or_else(|| StoreError::Malformed(format!("{}: empty folder path", url)))
            }
            FolderRef::Id(_) => decode(response, &url).await,
        }
    }

    async fn get_file(&self, file_id: u64) -> StoreResult<File> {
        let url = self.file_url(file_id);
        let response = self.get(&url).await?;
        decode(response, &url).await
    }

    async fn fetch_listing(&self, locator: &str) -> StoreResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut next = Some(with_per_page(locator)?);

        while let Some(url) = next.take() {
            let response = self.get(&url).await?;
            next = next_link(response.headers()).filter(|n| *n != url);

            let page: Vec<Value> = decode(response, &url).await?;
            for value in page {
                items.push(Item::from_value(value)?);
            }
        }

        debug!("listing {} -> {} entries", locator, items.len());
        Ok(items)
    }

    async fn read_range(&self, content_url: &str, offset: u64, length: u32) -> StoreResult<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }

        let end = offset + u64::from(length) - 1;
        let response = self
            .client
            .get(content_url)
            .bearer_auth(&self.config.access_token)
            .header(RANGE, format!("bytes={}-{}", offset, end))
            .send()
            .await?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => Ok(response.bytes().await?.to_vec()),
            StatusCode::RANGE_NOT_SATISFIABLE => Ok(Vec::new()),
            status if status.is_success() => {
                warn!("server ignored range request for {}, slicing full body", content_url);
                let body = response.bytes().await?;
                Ok(slice_window(&body, offset, length).to_vec())
            }
            status => {
                check_status(status, content_url)?;
                Err(StoreError::Connectivity(format!("{}: unexpected status {}", content_url, status)))
            }
        }
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response, url: &str) -> StoreResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| StoreError::Malformed(format!("{}: {}", url, e)))
}

/// 401 -> Unauthorized, 404 -> NotFound, 其余非成功状态 -> Connectivity
fn check_status(status: StatusCode, url: &str) -> StoreResult<()> {
    match status {
        StatusCode::UNAUTHORIZED => Err(StoreError::Unauthorized(url.to_string())),
        StatusCode::NOT_FOUND => Err(StoreError::NotFound(url.to_string())),
        s if s.is_success() => Ok(()),
        s => Err(StoreError::Connectivity(format!("{}: HTTP {}", url, s))),
    }
}

/// 列表定位符已带 `per_page` 时保持原样
fn with_per_page(locator: &str) -> StoreResult<String> {
    let mut url = Url::parse(locator)
        .map_err(|e| StoreError::Malformed(format!("{}: {}", locator, e)))?;
    if !url.query_pairs().any(|(key, _)| key == "per_page") {
        url.query_pairs_mut()
            .append_pair("per_page", &PER_PAGE.to_string());
    }
    Ok(url.to_string())
}

fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(parse_next_link)
}

/// 从 `Link` 头中取出 `rel="next"` 的地址
fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

fn slice_window(body: &[u8], offset: u64, length: u32) -> &[u8] {
    let len = body.len() as u64;
    let start = offset.min(len);
    let end = offset.saturating_add(u64::from(length)).min(len);
    &body[start as usize..end as usize]
}
