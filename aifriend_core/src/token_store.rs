//! 令牌存储
//!
//! 只负责保存访问令牌与刷新令牌，不做有效性检查，也不发起网络请求。

use crate::error::Result;
use crate::types::TokenPair;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// 令牌存储接口
///
/// 所有操作都是同步的；存储不可用时读取结果为 `None`。
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    /// 保存一对令牌，覆盖旧值
    fn set(&self, tokens: &TokenPair) -> Result<()>;

    fn access_token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    /// 删除两个令牌
    fn clear(&self) -> Result<()>;

    /// 仅判断访问令牌是否存在
    fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }
}

/// 进程内存储
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: RwLock::new(Some(tokens)),
        }
    }

    fn read(&self) -> Option<TokenPair> {
        self.tokens
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn set(&self, tokens: &TokenPair) -> Result<()> {
        *self
            .tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tokens.clone());
        Ok(())
    }

    fn access_token(&self) -> Option<String> {
        self.read().map(|t| t.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().map(|t| t.refresh_token)
    }

    fn clear(&self) -> Result<()> {
        *self
            .tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// 文件存储，令牌以 JSON 保存在单个文件中
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.aifriend/tokens.json`，没有 HOME 时落在当前目录
    pub fn default_path() -> PathBuf {
        let base = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        base.join(".aifriend").join("tokens.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoredTokens {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoredTokens::default(),
            Err(e) => {
                warn!("Failed to read token file {}: {}", self.path.display(), e);
                return StoredTokens::default();
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Ignoring corrupt token file {}: {}", self.path.display(), e);
                StoredTokens::default()
            }
        }
    }

    fn save(&self, tokens: &StoredTokens) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(tokens)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn set(&self, tokens: &TokenPair) -> Result<()> {
        self.save(&StoredTokens {
            access_token: Some(tokens.access_token.clone()),
            refresh_token: Some(tokens.refresh_token.clone()),
        })?;
        debug!("Tokens saved to {}", self.path.display());
        Ok(())
    }

    fn access_token(&self) -> Option<String> {
        self.load().access_token.filter(|t| !t.is_empty())
    }

    fn refresh_token(&self) -> Option<String> {
        self.load().refresh_token.filter(|t| !t.is_empty())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        }
    }

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryTokenStore::new();
        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token(), None);

        store.set(&pair("a", "b")).unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.access_token().as_deref(), Some("a"));
        assert_eq!(store.refresh_token().as_deref(), Some("b"));

        store.set(&pair("c", "d")).unwrap();
        assert_eq!(store.access_token().as_deref(), Some("c"));

        store.clear().unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token(), None);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        let store = FileTokenStore::new(&path);
        assert!(!store.is_authenticated());
        store.set(&pair("a", "b")).unwrap();

        let reopened = FileTokenStore::new(&path);
        assert!(reopened.is_authenticated());
        assert_eq!(reopened.access_token().as_deref(), Some("a"));
        assert_eq!(reopened.refresh_token().as_deref(), Some("b"));

        reopened.clear().unwrap();
        assert!(!store.is_authenticated());
        assert!(!path.exists());
        // 重复清除不报错
        reopened.clear().unwrap();
    }

    #[test]
    fn test_file_store_corrupt_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, b"not json").unwrap();

        let store = FileTokenStore::new(&path);
        assert_eq!(store.access_token(), None);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_file_store_empty_token_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, br#"{"access_token":"","refresh_token":"r"}"#).unwrap();

        let store = FileTokenStore::new(&path);
        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token().as_deref(), Some("r"));
    }
}
