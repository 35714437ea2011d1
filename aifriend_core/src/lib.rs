//! AIFriend 客户端核心库
//!
//! 提供与 AIFriend 后端交互所需的全部能力：
//! - 令牌存储（访问令牌 / 刷新令牌）
//! - API 客户端（统一响应信封、Bearer 认证、multipart 上传）
//! - 表单本地校验
//! - 会话相关页面的状态机（首页、登录、注册、个人资料、角色管理）

pub mod client;
pub mod config;
pub mod error;
pub mod token_store;
pub mod types;
pub mod validation;
pub mod views;

pub use client::{ApiClient, RequestBody};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use types::*;
pub use validation::ValidationError;
