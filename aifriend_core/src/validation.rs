//! 表单本地校验
//!
//! 所有规则都在发请求之前执行，校验失败直接短路，后端会再次校验。

use crate::types::{UserInfo, UserUpdate};
use thiserror::Error;

/// 密码最小长度（按字符计）
pub const MIN_PASSWORD_LEN: usize = 6;
/// 头像大小上限
pub const MAX_AVATAR_SIZE: u64 = 2 * 1024 * 1024;
/// 角色图片大小上限
pub const MAX_CHARACTER_IMAGE_SIZE: u64 = 5 * 1024 * 1024;

/// 校验错误，`Display` 即页面上的提示文案
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("请输入用户名和密码")]
    MissingCredentials,
    #[error("两次输入的密码不一致")]
    PasswordMismatch,
    #[error("密码长度至少为6位")]
    PasswordTooShort,
    #[error("用户名不能为空")]
    EmptyUsername,
    #[error("没有需要更新的数据")]
    NothingToUpdate,
    #[error("请输入当前密码")]
    MissingOldPassword,
    #[error("请输入新密码")]
    MissingNewPassword,
    #[error("新密码长度不能少于 6 位")]
    NewPasswordTooShort,
    #[error("两次输入的新密码不一致")]
    NewPasswordMismatch,
    #[error("头像大小不能超过 2MB")]
    AvatarTooLarge,
    #[error("图片大小不能超过5MB")]
    ImageTooLarge,
    #[error("请输入角色名称")]
    EmptyCharacterName,
}

pub fn validate_login(username: &str, password: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(ValidationError::MissingCredentials);
    }
    Ok(())
}

/// 注册表单：先比对确认密码，再检查长度
pub fn validate_registration(
    username: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), ValidationError> {
    validate_login(username, password)?;
    if password != confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// 修改密码表单
pub fn validate_password_change(
    old_password: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), ValidationError> {
    if old_password.is_empty() {
        return Err(ValidationError::MissingOldPassword);
    }
    if new_password.is_empty() {
        return Err(ValidationError::MissingNewPassword);
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::NewPasswordTooShort);
    }
    if new_password != confirm_password {
        return Err(ValidationError::NewPasswordMismatch);
    }
    Ok(())
}

/// 基本信息表单，只提交与当前值不同的字段
pub fn validate_profile_update(
    current: &UserInfo,
    username: &str,
    email: &str,
) -> Result<UserUpdate, ValidationError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ValidationError::EmptyUsername);
    }

    let email = email.trim();
    let update = UserUpdate {
        username: (username != current.username).then(|| username.to_string()),
        email: (email != current.email).then(|| email.to_string()),
        avatar: None,
    };

    if update.is_empty() {
        return Err(ValidationError::NothingToUpdate);
    }
    Ok(update)
}

pub fn validate_avatar(size: u64) -> Result<(), ValidationError> {
    if size > MAX_AVATAR_SIZE {
        return Err(ValidationError::AvatarTooLarge);
    }
    Ok(())
}

pub fn validate_character_image(size: u64) -> Result<(), ValidationError> {
    if size > MAX_CHARACTER_IMAGE_SIZE {
        return Err(ValidationError::ImageTooLarge);
    }
    Ok(())
}

pub fn validate_character_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyCharacterName);
    }
    Ok(())
}
