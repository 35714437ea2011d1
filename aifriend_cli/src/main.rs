//! AIFriend 命令行客户端

use aifriend_core::config::API_URL_ENV;
use aifriend_core::views::{
    CharactersView, HomeView, LoginView, Navigation, ProfileView, RegisterView, Route,
};
use aifriend_core::{
    ApiClient, CharacterDraft, CharacterInfo, ClientConfig, FileTokenStore, ImageFile, TokenStore,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aifriend")]
#[command(about = "AIFriend 客户端工具", long_about = None)]
struct Cli {
    /// 服务器地址
    #[arg(short, long, env = API_URL_ENV, default_value = aifriend_core::config::DEFAULT_API_URL)]
    server: String,

    /// 请求超时（秒）
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// 不验证 TLS 证书
    #[arg(long)]
    insecure: bool,

    /// 收到 401 时自动刷新令牌并重试
    #[arg(long)]
    auto_refresh: bool,

    /// Token 文件路径
    #[arg(long)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 用户注册
    Register {
        /// 用户名
        #[arg(short, long)]
        username: String,
        /// 密码
        #[arg(short, long)]
        password: String,
        /// 确认密码，默认与密码相同
        #[arg(long)]
        confirm: Option<String>,
        /// 邮箱
        #[arg(short, long, default_value = "")]
        email: String,
    },
    /// 用户登录
    Login {
        /// 用户名
        #[arg(short, long)]
        username: String,
        /// 密码
        #[arg(short, long)]
        password: String,
    },
    /// 用户登出（仅清除本地令牌）
    Logout,
    /// 刷新令牌
    Refresh,
    /// 当前登录状态
    Status,
    /// 个人资料
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// 角色管理
    #[command(subcommand)]
    Character(CharacterCommand),
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// 查看个人资料
    Show,
    /// 修改基本信息
    Update {
        /// 邮箱
        #[arg(short, long)]
        email: String,
    },
    /// 上传头像
    Avatar {
        /// 图片文件
        file: PathBuf,
    },
    /// 修改密码
    Password {
        /// 当前密码
        #[arg(long)]
        old: String,
        /// 新密码
        #[arg(long)]
        new: String,
        /// 确认新密码，默认与新密码相同
        #[arg(long)]
        confirm: Option<String>,
    },
}

#[derive(Subcommand)]
enum CharacterCommand {
    /// 角色列表
    List,
    /// 查看角色
    Show { id: i64 },
    /// 创建角色
    Create {
        /// 角色名称
        #[arg(short, long)]
        name: String,
        /// 角色介绍
        #[arg(short, long, default_value = "")]
        profile: String,
        /// 角色头像
        #[arg(long)]
        photo: Option<PathBuf>,
        /// 背景图
        #[arg(long)]
        background: Option<PathBuf>,
    },
    /// 编辑角色，未指定的字段保持不变
    Update {
        id: i64,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        profile: Option<String>,
        #[arg(long)]
        photo: Option<PathBuf>,
        #[arg(long)]
        background: Option<PathBuf>,
    },
    /// 删除角色
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ClientConfig {
        timeout: cli.timeout,
        verify_tls: !cli.insecure,
        auto_refresh: cli.auto_refresh,
        ..ClientConfig::default()
    }
    .with_server_url(&cli.server);

    let token_file = cli.token_file.unwrap_or_else(FileTokenStore::default_path);
    debug!("Using token file {}", token_file.display());
    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(token_file));
    let client = ApiClient::new(config, store)?;

    match cli.command {
        Commands::Register {
            username,
            password,
            confirm,
            email,
        } => {
            let confirm = confirm.unwrap_or_else(|| password.clone());
            do_register(&client, &username, &password, &confirm, &email).await?;
        }
        Commands::Login { username, password } => {
            do_login(&client, &username, &password).await?;
        }
        Commands::Logout => do_logout(&client)?,
        Commands::Refresh => do_refresh(&client).await?,
        Commands::Status => do_status(&client).await?,
        Commands::Profile(command) => do_profile(&client, command).await?,
        Commands::Character(command) => do_character(&client, command).await?,
    }

    Ok(())
}

fn require_login(nav: Navigation) -> anyhow::Result<()> {
    if nav == Navigation::Redirect(Route::Login) {
        anyhow::bail!("请先登录（aifriend login -u <用户名> -p <密码>）");
    }
    Ok(())
}

async fn do_register(
    client: &ApiClient,
    username: &str,
    password: &str,
    confirm: &str,
    email: &str,
) -> anyhow::Result<()> {
    println!("正在注册用户: {}", username);

    let mut view = RegisterView::new(client);
    if let Err(e) = view.submit(username, password, confirm, email).await {
        anyhow::bail!("注册失败: {}", e.user_message());
    }

    println!("注册成功! 请使用 aifriend login 登录");
    Ok(())
}

async fn do_login(client: &ApiClient, username: &str, password: &str) -> anyhow::Result<()> {
    println!("正在登录用户: {}", username);

    let mut view = LoginView::new(client);
    if let Err(e) = view.submit(username, password).await {
        anyhow::bail!("登录失败: {}", e.user_message());
    }

    println!("登录成功!");
    Ok(())
}

fn do_logout(client: &ApiClient) -> anyhow::Result<()> {
    let mut view = HomeView::new(client);
    view.logout()?;
    println!("已登出");
    Ok(())
}

async fn do_refresh(client: &ApiClient) -> anyhow::Result<()> {
    let grant = client.refresh_token().await.map_err(|e| {
        anyhow::anyhow!("刷新令牌失败: {}", e.user_message())
    })?;

    match grant.expires_in {
        Some(seconds) => println!("令牌已刷新，有效期 {} 秒", seconds),
        None => println!("令牌已刷新"),
    }
    Ok(())
}

async fn do_status(client: &ApiClient) -> anyhow::Result<()> {
    let mut view = HomeView::new(client);
    view.mount().await;

    println!("{}", view.greeting());
    if let Some(user) = view.user() {
        println!("用户名: {}", user.username);
        println!("邮箱: {}", or_unset(&user.email));
        println!("注册时间: {}", user.created_at);
    }
    Ok(())
}

async fn do_profile(client: &ApiClient, command: ProfileCommand) -> anyhow::Result<()> {
    let mut view = ProfileView::new(client);
    require_login(view.mount().await)?;

    match command {
        ProfileCommand::Show => {
            if let Some(user) = view.user() {
                println!("用户ID: {}", user.id);
                println!("用户名: {}", user.username);
                println!("邮箱: {}", or_unset(&user.email));
                println!("头像: {}", view.avatar_url().as_deref().unwrap_or("未设置"));
                println!("注册时间: {}", user.created_at);
            }
        }
        ProfileCommand::Update { email } => {
            let username = view.user().map(|u| u.username.clone()).unwrap_or_default();
            if let Err(e) = view.save_basic(&username, &email).await {
                anyhow::bail!("更新失败: {}", e.user_message());
            }
            println!("保存成功");
        }
        ProfileCommand::Avatar { file } => {
            let image = ImageFile::from_path(&file)?;
            match view.upload_avatar(&image).await {
                Ok(url) => {
                    println!("头像上传成功");
                    if let Some(url) = url {
                        println!("头像地址: {}", url);
                    }
                }
                Err(e) => anyhow::bail!("上传失败: {}", e.user_message()),
            }
        }
        ProfileCommand::Password { old, new, confirm } => {
            let confirm = confirm.unwrap_or_else(|| new.clone());
            if let Err(e) = view.change_password(&old, &new, &confirm).await {
                anyhow::bail!("修改失败: {}", e.user_message());
            }
            println!("密码修改成功");
        }
    }
    Ok(())
}

async fn do_character(client: &ApiClient, command: CharacterCommand) -> anyhow::Result<()> {
    let mut view = CharactersView::new(client);
    require_login(view.mount().await)?;

    match command {
        CharacterCommand::List => {}
        CharacterCommand::Show { id } => {
            let character = client
                .get_character(id)
                .await
                .map_err(|e| anyhow::anyhow!("获取角色失败: {}", e.user_message()))?;
            print_character(client, &character);
            return Ok(());
        }
        CharacterCommand::Create {
            name,
            profile,
            photo,
            background,
        } => {
            let draft = with_images(CharacterDraft::new(name, profile), photo, background)?;
            let nav = view
                .create(&draft)
                .await
                .map_err(|e| anyhow::anyhow!("创建失败: {}", e.user_message()))?;
            require_login(nav)?;
            println!("创建成功");
        }
        CharacterCommand::Update {
            id,
            name,
            profile,
            photo,
            background,
        } => {
            let current = client
                .get_character(id)
                .await
                .map_err(|e| anyhow::anyhow!("获取角色失败: {}", e.user_message()))?;
            let draft = CharacterDraft::new(
                name.unwrap_or(current.name),
                profile.unwrap_or(current.profile),
            );
            let draft = with_images(draft, photo, background)?;
            let nav = view
                .update(id, &draft)
                .await
                .map_err(|e| anyhow::anyhow!("保存失败: {}", e.user_message()))?;
            require_login(nav)?;
            println!("保存成功");
        }
        CharacterCommand::Delete { id } => {
            let nav = view
                .delete(id)
                .await
                .map_err(|e| anyhow::anyhow!("删除失败: {}", e.user_message()))?;
            require_login(nav)?;
            println!("删除成功");
        }
    }

    if let Some(message) = view.load_error() {
        anyhow::bail!("获取角色列表失败: {}", message);
    }
    let characters = view.characters();
    if characters.is_empty() {
        println!("还没有角色，使用 aifriend character create 创建一个");
    }
    for character in characters {
        println!("[{}] {}  {}", character.id, character.name, character.profile);
    }
    Ok(())
}

fn with_images(
    mut draft: CharacterDraft,
    photo: Option<PathBuf>,
    background: Option<PathBuf>,
) -> anyhow::Result<CharacterDraft> {
    if let Some(path) = photo {
        draft = draft.with_photo(read_image(&path)?);
    }
    if let Some(path) = background {
        draft = draft.with_background_image(read_image(&path)?);
    }
    Ok(draft)
}

fn read_image(path: &Path) -> anyhow::Result<ImageFile> {
    ImageFile::from_path(path)
        .map_err(|e| anyhow::anyhow!("读取图片 {:?} 失败: {}", path, e))
}

fn print_character(client: &ApiClient, character: &CharacterInfo) {
    let config = client.config();
    println!("角色ID: {}", character.id);
    println!("名称: {}", character.name);
    println!("介绍: {}", or_unset(&character.profile));
    println!(
        "头像: {}",
        config.asset_url(&character.photo).as_deref().unwrap_or("未设置")
    );
    println!(
        "背景图: {}",
        config
            .asset_url(&character.background_image)
            .as_deref()
            .unwrap_or("未设置")
    );
    println!("创建时间: {}", character.created_at);
    println!("更新时间: {}", character.updated_at);
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "未设置"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_character_update() {
        let cli = Cli::try_parse_from([
            "aifriend",
            "--server",
            "http://api.example.com",
            "character",
            "update",
            "7",
            "--name",
            "小助手",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://api.example.com");
        match cli.command {
            Commands::Character(CharacterCommand::Update { id, name, profile, .. }) => {
                assert_eq!(id, 7);
                assert_eq!(name.as_deref(), Some("小助手"));
                assert!(profile.is_none());
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_or_unset() {
        assert_eq!(or_unset(""), "未设置");
        assert_eq!(or_unset("a@b.c"), "a@b.c");
    }
}
