use std::fmt;

use clap::ValueEnum;

use crate::error::{StoreError, StoreResult};

/// 挂载的上下文类型：课程、用户或小组
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContextKind {
    Course,
    User,
    Group,
}

impl ContextKind {
    /// URL 中的路径段
    pub fn segment(&self) -> &'static str {
        match self {
            ContextKind::Course => "courses",
            ContextKind::User => "users",
            ContextKind::Group => "groups",
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

#[derive(Clone)]
pub struct Config {
    pub api_url: String,
    pub access_token: String,
    pub context: ContextKind,
    pub context_id: u64,
}

// 令牌不能出现在日志里
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("access_token", &"<redacted>")
            .field("context", &self.context)
            .field("context_id", &self.context_id)
            .finish()
    }
}

impl Config {
    /// 由实例地址（如 `https://canvas.example.edu`）构造配置，API 根为 `{url}/api/v1`
    pub fn new(
        canvas_url: &str,
        access_token: String,
        context: ContextKind,
        context_id: u64,
    ) -> StoreResult<Self> {
        let base = canvas_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(StoreError::Malformed("empty Canvas URL".into()));
        }
        if access_token.trim().is_empty() {
            return Err(StoreError::Unauthorized("empty access token".into()));
        }

        Ok(Self {
            api_url: format!("{}/api/v1", base),
            access_token,
            context,
            context_id,
        })
    }

    /// `{api}/{context}/{context_id}`
    pub fn context_url(&self) -> String {
        format!("{}/{}/{}", self.api_url, self.context, self.context_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_url() {
        let config = Config::new(
            "https://canvas.example.edu/",
            "token".into(),
            ContextKind::Group,
            12,
        )
        .unwrap();

        assert_eq!(config.api_url, "https://canvas.example.edu/api/v1");
        assert_eq!(
            config.context_url(),
            "https://canvas.example.edu/api/v1/groups/12"
        );
    }

    #[test]
    fn test_rejects_empty_settings() {
        assert!(Config::new("", "token".into(), ContextKind::Course, 1).is_err());
        assert!(Config::new("https://x", "  ".into(), ContextKind::Course, 1).is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config::new("https://x", "secret".into(), ContextKind::User, 3).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
