//! 数据类型定义

use crate::error::{Error, Result, FALLBACK_MESSAGE};
use crate::validation;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// 用户信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    /// 相对路径（`/api/v1/uploads/...`）或完整 URL
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub created_at: String,
}

/// 角色信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub photo: String,
    #[serde(default)]
    pub background_image: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// 访问令牌与刷新令牌
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

/// 登录/刷新返回的令牌
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub tokens: TokenPair,
    /// 访问令牌有效期（秒），仅供展示，不在本地持久化
    pub expires_in: Option<i64>,
}

/// 无数据的成功响应
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ack {
    pub message: Option<String>,
}

/// 头像上传响应数据
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AvatarUpload {
    pub avatar: String,
}

/// 基本信息更新请求，未设置的字段不会提交
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.avatar.is_none()
    }
}

/// 统一响应信封
///
/// 各字段是否出现决定了含义，使用前先通过 [`Envelope::into_reply`] 分类。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    pub code: Option<i64>,
    pub message: Option<String>,
    pub data: Option<Value>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    /// 未包在 `data` 里的裸数据字段
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 分类后的响应
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    /// 成功，可能带数据
    Data { message: Option<String>, data: Option<T> },
    /// 成功，带一对令牌
    Tokens(TokenGrant),
    /// code 非 0
    Failure { code: i64, message: String },
}

impl Envelope {
    /// 按 code / 令牌 / 数据分类
    pub fn into_reply<T: DeserializeOwned>(self) -> Result<Reply<T>> {
        if let Some(code) = self.code.filter(|code| *code != 0) {
            return Ok(Reply::Failure {
                code,
                message: self
                    .message
                    .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            });
        }

        if let (Some(access_token), Some(refresh_token)) = (self.access_token, self.refresh_token)
        {
            return Ok(Reply::Tokens(TokenGrant {
                tokens: TokenPair {
                    access_token,
                    refresh_token,
                },
                expires_in: self.expires_in,
            }));
        }

        let data = self.data.map(serde_json::from_value).transpose()?;
        Ok(Reply::Data {
            message: self.message,
            data,
        })
    }

    /// 数据既可能在 `data` 中，也可能直接平铺在响应体里
    pub fn into_payload<T: DeserializeOwned>(self) -> Result<T> {
        if let Some(code) = self.code.filter(|code| *code != 0) {
            return Err(Error::Api {
                code,
                message: self
                    .message
                    .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            });
        }
        let value = match self.data {
            Some(data) => data,
            None => Value::Object(self.extra),
        };
        Ok(serde_json::from_value(value)?)
    }
}

impl<T> Reply<T> {
    /// 把 `Failure` 转为 `Error::Api`
    pub fn check(self) -> Result<Self> {
        match self {
            Reply::Failure { code, message } => Err(Error::Api { code, message }),
            other => Ok(other),
        }
    }

    /// 取出必需的数据
    pub fn into_data(self) -> Result<T> {
        match self.check()? {
            Reply::Data {
                data: Some(data), ..
            } => Ok(data),
            _ => Err(Error::InvalidState("No data in response".to_string())),
        }
    }

    /// 取出令牌，两个字段缺一不可
    pub fn into_tokens(self) -> Result<TokenGrant> {
        match self.check()? {
            Reply::Tokens(grant) => Ok(grant),
            _ => Err(Error::InvalidState("No token pair in response".to_string())),
        }
    }

    pub fn into_ack(self) -> Result<Ack> {
        match self {
            Reply::Data { message, .. } => Ok(Ack { message }),
            Reply::Tokens(_) => Ok(Ack::default()),
            Reply::Failure { code, message } => Err(Error::Api { code, message }),
        }
    }
}

/// 待上传的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// 读取文件，MIME 类型由扩展名推断
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self {
            mime: mime_from_extension(path).to_string(),
            file_name,
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub(crate) fn to_part(&self) -> Result<Part> {
        Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)
            .map_err(|e| Error::Encoding(e.to_string()))
    }
}

fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// 角色表单（创建与编辑共用）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterDraft {
    pub name: String,
    pub profile: String,
    pub photo: Option<ImageFile>,
    pub background_image: Option<ImageFile>,
}

impl CharacterDraft {
    pub fn new(name: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile: profile.into(),
            ..Default::default()
        }
    }

    pub fn with_photo(mut self, photo: ImageFile) -> Self {
        self.photo = Some(photo);
        self
    }

    pub fn with_background_image(mut self, image: ImageFile) -> Self {
        self.background_image = Some(image);
        self
    }

    /// 校验并返回去除首尾空白后的表单
    pub fn validated(&self) -> std::result::Result<Self, validation::ValidationError> {
        validation::validate_character_name(&self.name)?;
        for image in [&self.photo, &self.background_image].into_iter().flatten() {
            validation::validate_character_image(image.size())?;
        }
        Ok(Self {
            name: self.name.trim().to_string(),
            profile: self.profile.trim().to_string(),
            photo: self.photo.clone(),
            background_image: self.background_image.clone(),
        })
    }

    pub(crate) fn to_form(&self) -> Result<Form> {
        let mut form = Form::new()
            .text("name", self.name.clone())
            .text("profile", self.profile.clone());
        if let Some(photo) = &self.photo {
            form = form.part("photo", photo.to_part()?);
        }
        if let Some(image) = &self.background_image {
            form = form.part("background_image", image.to_part()?);
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_code_is_success() {
        let reply: Reply<Value> = envelope(json!({"message": "ok"})).into_reply().unwrap();
        assert_eq!(
            reply,
            Reply::Data {
                message: Some("ok".to_string()),
                data: None
            }
        );
    }

    #[test]
    fn test_nonzero_code_is_failure() {
        let reply: Reply<Value> = envelope(json!({"code": 400, "message": "用户名已存在"}))
            .into_reply()
            .unwrap();
        assert_eq!(
            reply,
            Reply::Failure {
                code: 400,
                message: "用户名已存在".to_string()
            }
        );

        let err = reply.into_ack().unwrap_err();
        assert!(matches!(err, Error::Api { code: 400, .. }));
    }

    #[test]
    fn test_tokens_need_both_fields() {
        let reply: Reply<Value> = envelope(json!({
            "access_token": "a",
            "refresh_token": "b",
            "expires_in": 7200
        }))
        .into_reply()
        .unwrap();
        let grant = reply.into_tokens().unwrap();
        assert_eq!(grant.tokens.access_token, "a");
        assert_eq!(grant.tokens.refresh_token, "b");
        assert_eq!(grant.expires_in, Some(7200));

        let reply: Reply<Value> = envelope(json!({"access_token": "a"})).into_reply().unwrap();
        assert!(matches!(reply.into_tokens(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_character_list_in_data() {
        let reply: Reply<Vec<CharacterInfo>> = envelope(json!({
            "code": 0,
            "message": "获取成功",
            "data": [{
                "id": 3,
                "name": "小助手",
                "photo": "",
                "profile": "温柔",
                "background_image": "",
                "created_at": "2025-01-01 00:00:00",
                "updated_at": "2025-01-01 00:00:00"
            }]
        }))
        .into_reply()
        .unwrap();
        let list = reply.into_data().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "小助手");
    }

    #[test]
    fn test_payload_bare_or_wrapped() {
        let bare = envelope(json!({
            "id": 1,
            "username": "alice",
            "email": "",
            "avatar": "/api/v1/uploads/avatars/a.png",
            "created_at": "2025-01-01 00:00:00"
        }));
        let user: UserInfo = bare.into_payload().unwrap();
        assert_eq!(user.username, "alice");

        let wrapped = envelope(json!({"code": 0, "data": {"id": 2, "username": "bob"}}));
        let user: UserInfo = wrapped.into_payload().unwrap();
        assert_eq!(user.id, 2);
        assert_eq!(user.email, "");
    }

    #[test]
    fn test_user_update_skips_unset_fields() {
        let update = UserUpdate {
            email: Some("a@b.c".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"email": "a@b.c"}));
    }

    #[test]
    fn test_draft_validation_trims() {
        let draft = CharacterDraft::new("  小助手 ", " 温柔 ");
        let valid = draft.validated().unwrap();
        assert_eq!(valid.name, "小助手");
        assert_eq!(valid.profile, "温柔");

        let big = ImageFile::new("big.png", "image/png", vec![0; 5 * 1024 * 1024 + 1]);
        let err = CharacterDraft::new("小助手", "").with_photo(big).validated().unwrap_err();
        assert_eq!(err.to_string(), "图片大小不能超过5MB");
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_from_extension(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_from_extension(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_from_extension(Path::new("a")), "application/octet-stream");
    }

    #[test]
    fn test_token_pair_debug_hides_secrets() {
        let pair = TokenPair {
            access_token: "secret-a".to_string(),
            refresh_token: "secret-b".to_string(),
        };
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("secret"));
    }
}
