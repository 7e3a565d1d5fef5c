use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use itda_notify::actions::{BadgeActions, NotificationActions};
use itda_notify::config::{ConfigError, NotifyConfig};
use itda_notify::identity::{Identity, IdentityError, JsonFileStore, clear_identity, load_identity, save_identity};
use itda_notify::net::api::{ApiClient, ApiError};
use itda_notify::net::connection::ConnectionStatus;
use itda_notify::net::transport::WsConnector;
use itda_notify::session::{NotifySession, RetryPolicy, SessionError, confirm_session};
use itda_notify::state::NotifyState;
use itda_notify::state::cache::CacheKey;
use itda_notify::state::toast::ToastView;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("not logged in; pass --user-id or run `itda-notify login`")]
    NotLoggedIn,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "itda-notify", about = "IT-DA notification listener and REST CLI")]
struct Cli {
    #[arg(long, env = "ITDA_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Derived from the API base URL when absent.
    #[arg(long, env = "ITDA_WS_URL")]
    ws_url: Option<String>,

    /// Act as this user instead of the stored identity.
    #[arg(long, env = "ITDA_USER_ID")]
    user_id: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and print pushed notifications until interrupted.
    Listen(ListenArgs),
    Notifications(NotificationsCommand),
    Badges(BadgesCommand),
    /// Print the stored identity.
    Whoami,
    /// Store an identity for later commands.
    Login {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        nickname: Option<String>,
    },
    /// Forget the stored identity.
    Logout,
    /// Poll the session endpoint until the server reports a login, then store it.
    ConfirmSession {
        #[arg(long, default_value_t = 15)]
        attempts: u32,
        #[arg(long, default_value_t = 2000)]
        delay_ms: u64,
    },
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// Skip the initial REST fetch of the notification list.
    #[arg(long, default_value_t = false)]
    no_sync: bool,
}

#[derive(Args, Debug)]
struct NotificationsCommand {
    #[command(subcommand)]
    command: NotificationsSubcommand,
}

#[derive(Subcommand, Debug)]
enum NotificationsSubcommand {
    List,
    Unread,
    Read { notification_id: i64 },
    ReadAll,
    Delete { notification_id: i64 },
    Clear,
}

#[derive(Args, Debug)]
struct BadgesCommand {
    #[command(subcommand)]
    command: BadgesSubcommand,
}

#[derive(Subcommand, Debug)]
enum BadgesSubcommand {
    List,
    Unlocked,
    /// Recompute progress for every badge, or one with `--code`.
    Refresh {
        #[arg(long)]
        code: Option<String>,
    },
}

struct CliContext {
    config: NotifyConfig,
    store: JsonFileStore,
    user_id: Option<i64>,
}

impl CliContext {
    fn identity(&self) -> Result<Identity, CliError> {
        if let Some(user_id) = self.user_id {
            return Ok(Identity::new(user_id));
        }
        load_identity(&self.store)?.ok_or(CliError::NotLoggedIn)
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = NotifyConfig::from_env()?.with_endpoints(cli.api_base_url.as_deref(), cli.ws_url.as_deref())?;
    let ctx = CliContext { store: JsonFileStore::new(config.identity_file.clone()), config, user_id: cli.user_id };

    match cli.command {
        Command::Listen(args) => run_listen(&ctx, args).await,
        Command::Notifications(cmd) => run_notifications(&ctx, cmd).await,
        Command::Badges(cmd) => run_badges(&ctx, cmd).await,
        Command::Whoami => {
            match load_identity(&ctx.store)? {
                Some(identity) => print_json(&identity)?,
                None => println!("not logged in"),
            }
            Ok(())
        }
        Command::Login { user_id, nickname } => {
            let mut identity = Identity::new(user_id);
            identity.nickname = nickname;
            save_identity(&ctx.store, &identity)?;
            println!("logged in as {user_id}");
            Ok(())
        }
        Command::Logout => {
            clear_identity(&ctx.store)?;
            println!("logged out");
            Ok(())
        }
        Command::ConfirmSession { attempts, delay_ms } => {
            let client = ApiClient::from_config(&ctx.config)?;
            let policy = RetryPolicy { max_attempts: attempts, delay: std::time::Duration::from_millis(delay_ms) };
            let identity = confirm_session(&client, policy).await?;
            save_identity(&ctx.store, &identity)?;
            print_json(&identity)
        }
    }
}

// =============================================================================
// LISTEN
// =============================================================================

async fn run_listen(ctx: &CliContext, args: ListenArgs) -> Result<(), CliError> {
    let identity = ctx.identity()?;
    let session = NotifySession::start(&ctx.config, identity.clone(), Arc::new(WsConnector));
    let state = Arc::clone(session.state());
    let actions = NotificationActions::new(ApiClient::from_config(&ctx.config)?, Arc::clone(&state), identity);

    if !args.no_sync {
        resync(&actions, &state).await;
    }

    let mut status = session.status();
    let mut toasts = state.presenter().subscribe();
    let mut invalidations = state.caches().subscribe();
    let mut printed = Printed::default();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                break;
            }
            Ok(()) = status.changed() => {
                let current = *status.borrow_and_update();
                println!("status: {}", status_label(current));
            }
            Ok(()) = toasts.changed() => {
                let view = toasts.borrow_and_update().clone();
                printed.print_new(&view);
            }
            key = invalidations.recv() => match key {
                Ok(CacheKey::Notifications) => resync(&actions, &state).await,
                Ok(key) => println!("cache stale: {}", key.as_str()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "listen: invalidations lagged");
                    resync(&actions, &state).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn resync(actions: &NotificationActions<ApiClient>, state: &NotifyState) {
    match actions.refresh().await {
        Ok(count) => println!("synced {count} notifications ({} unread)", state.unread_count().await),
        Err(e) => warn!(error = %e, "listen: notification sync failed"),
    }
}

/// Highest toast ids already written to stdout.
#[derive(Default)]
struct Printed {
    unlock: u64,
    push: u64,
}

impl Printed {
    fn print_new(&mut self, view: &ToastView) {
        if let Some(toast) = view.unlock.as_ref().filter(|t| t.id > self.unlock) {
            self.unlock = toast.id;
            let badge = &toast.event;
            println!("{} badge unlocked: {} ({})", badge.badge_icon, badge.badge_name, badge.badge_grade);
        }
        let seen = self.push;
        for toast in view.pushes.iter().filter(|t| t.id > seen) {
            self.push = toast.id;
            let n = &toast.event;
            println!("{} [{}] {}", n.kind.icon(), n.id, n.content);
        }
    }
}

fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Disconnected => "disconnected",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "connected",
    }
}

// =============================================================================
// REST
// =============================================================================

async fn run_notifications(ctx: &CliContext, cmd: NotificationsCommand) -> Result<(), CliError> {
    let state = Arc::new(NotifyState::new(ctx.config.toasts));
    let actions = NotificationActions::new(ApiClient::from_config(&ctx.config)?, Arc::clone(&state), ctx.identity()?);

    match cmd.command {
        NotificationsSubcommand::List => {
            actions.refresh().await?;
            print_json(&state.notifications().await)
        }
        NotificationsSubcommand::Unread => {
            println!("{}", actions.server_unread_count().await?);
            Ok(())
        }
        NotificationsSubcommand::Read { notification_id } => {
            actions.mark_read(notification_id).await?;
            println!("marked {notification_id} read");
            Ok(())
        }
        NotificationsSubcommand::ReadAll => {
            let count = actions.mark_all_read().await?;
            println!("marked {count} read");
            Ok(())
        }
        NotificationsSubcommand::Delete { notification_id } => {
            actions.delete(notification_id).await?;
            println!("deleted {notification_id}");
            Ok(())
        }
        NotificationsSubcommand::Clear => {
            actions.delete_all().await?;
            println!("deleted all notifications");
            Ok(())
        }
    }
}

async fn run_badges(ctx: &CliContext, cmd: BadgesCommand) -> Result<(), CliError> {
    let state = Arc::new(NotifyState::new(ctx.config.toasts));
    let actions = BadgeActions::new(ApiClient::from_config(&ctx.config)?, state, ctx.identity()?);

    match cmd.command {
        BadgesSubcommand::List => print_json(&actions.list().await?),
        BadgesSubcommand::Unlocked => print_json(&actions.unlocked().await?),
        BadgesSubcommand::Refresh { code: Some(code) } => {
            actions.refresh_one(&code).await?;
            println!("refreshed {code}");
            Ok(())
        }
        BadgesSubcommand::Refresh { code: None } => {
            actions.refresh_progress().await?;
            println!("refreshed all badges");
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
