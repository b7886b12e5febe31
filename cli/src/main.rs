use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use growpromise::api::{ChildSignup, ParentSignup};
use growpromise::config::{ApiConfig, ConfigError};
use growpromise::guard::{Decision, GuardView, decide, segments_of};
use growpromise::storage::FileStore;
use growpromise::{AppContext, AuthError, Session, UserType, ValidationError};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{}", .0.user_message())]
    Auth(#[from] AuthError),
    #[error("{0}")]
    Rejected(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "growpromise", about = "GrowPromise session CLI")]
struct Cli {
    /// Backend root. Falls back to `GROWPROMISE_API_URL` via config.
    #[arg(long, env = "GROWPROMISE_API_URL")]
    api_url: Option<String>,

    /// Where the credential record and app flags are kept.
    #[arg(long, env = "GROWPROMISE_STORE", default_value = ".growpromise.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long, env = "GROWPROMISE_PASSWORD")]
        password: String,
        #[arg(long = "as", default_value = "PARENT")]
        user_type: UserType,
    },
    Logout,
    /// Rehydrate and validate the stored session, then print it.
    Status,
    SignupParent(ParentSignupArgs),
    SignupChild(ChildSignupArgs),
    /// Show what the route guard would do for a path.
    Route {
        path: String,
    },
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
    RequestReset {
        email: String,
    },
    ResetPassword {
        #[arg(long)]
        code: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
    FindUsername {
        email: String,
    },
    ConnectionCode,
    ConnectParent {
        code: String,
    },
    Flags(FlagsCommand),
}

#[derive(Args, Debug)]
struct ParentSignupArgs {
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm: String,
}

#[derive(Args, Debug)]
struct ChildSignupArgs {
    username: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm: String,
}

#[derive(Args, Debug)]
struct FlagsCommand {
    #[command(subcommand)]
    command: Option<FlagsSubcommand>,
}

#[derive(Subcommand, Debug)]
enum FlagsSubcommand {
    MarkLaunched,
    Onboarding { completed: bool },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match cli.api_url.as_deref() {
        Some(url) => {
            let timeouts = ApiConfig::from_env().map(|c| c.timeouts).unwrap_or_default();
            ApiConfig { timeouts, ..ApiConfig::new(url)? }
        }
        None => ApiConfig::from_env()?,
    };
    tracing::debug!(store = %cli.store.display(), "using credential store");
    let ctx = AppContext::from_config(config, Arc::new(FileStore::new(&cli.store)))?;

    match cli.command {
        Command::Login { username, password, user_type } => run_login(&ctx, &username, &password, user_type).await,
        Command::Logout => run_logout(&ctx).await,
        Command::Status => run_status(&ctx).await,
        Command::SignupParent(args) => run_signup_parent(&ctx, args).await,
        Command::SignupChild(args) => run_signup_child(&ctx, args).await,
        Command::Route { path } => run_route(&ctx, &path).await,
        Command::ChangePassword { current, new, confirm } => {
            ctx.resolver.resolve().await;
            ctx.account.change_password(&current, &new, &confirm).await?;
            println!("password changed");
            Ok(())
        }
        Command::RequestReset { email } => {
            ctx.account.request_password_reset(&email).await?;
            println!("reset code sent");
            Ok(())
        }
        Command::ResetPassword { code, new, confirm } => {
            ctx.account.reset_password(&code, &new, &confirm).await?;
            println!("password reset");
            Ok(())
        }
        Command::FindUsername { email } => {
            println!("{}", ctx.account.find_username(&email).await?);
            Ok(())
        }
        Command::ConnectionCode => {
            ctx.resolver.resolve().await;
            println!("{}", ctx.account.parent_connection_code().await?);
            Ok(())
        }
        Command::ConnectParent { code } => {
            ctx.resolver.resolve().await;
            ctx.account.connect_parent(&code).await?;
            println!("connected");
            Ok(())
        }
        Command::Flags(flags) => run_flags(&ctx, flags).await,
    }
}

async fn run_login(ctx: &AppContext, username: &str, password: &str, user_type: UserType) -> Result<(), CliError> {
    ctx.store.login(username, password, user_type).await?;
    let session = ctx.store.snapshot();
    if let Some(error) = &session.error {
        return Err(CliError::Rejected(error.clone()));
    }
    print_json(&session_json(&session))
}

async fn run_logout(ctx: &AppContext) -> Result<(), CliError> {
    ctx.resolver.resolve().await;
    if !ctx.store.snapshot().is_authenticated {
        return Err(CliError::NotLoggedIn);
    }
    ctx.store.logout().await;
    println!("logged out");
    Ok(())
}

async fn run_status(ctx: &AppContext) -> Result<(), CliError> {
    ctx.resolver.resolve().await;
    let mut out = session_json(&ctx.store.snapshot());
    out["first_launch"] = json!(ctx.flags.is_first_launch().await);
    print_json(&out)
}

async fn run_signup_parent(ctx: &AppContext, args: ParentSignupArgs) -> Result<(), CliError> {
    let form = ParentSignup {
        username: args.username,
        password: args.password,
        password_confirmation: args.confirm,
        email: args.email,
    };
    ctx.store.parent_signup(&form).await?;
    signup_outcome(ctx)
}

async fn run_signup_child(ctx: &AppContext, args: ChildSignupArgs) -> Result<(), CliError> {
    let form = ChildSignup { username: args.username, password: args.password, password_confirmation: args.confirm };
    ctx.store.child_signup(&form).await?;
    signup_outcome(ctx)
}

fn signup_outcome(ctx: &AppContext) -> Result<(), CliError> {
    if let Some(error) = ctx.store.snapshot().error {
        return Err(CliError::Rejected(error));
    }
    println!("account created; log in to continue");
    Ok(())
}

async fn run_route(ctx: &AppContext, path: &str) -> Result<(), CliError> {
    ctx.resolver.resolve().await;
    let view = GuardView::from(&ctx.store.snapshot());
    let verdict = match decide(&segments_of(path), &view) {
        Decision::Wait => json!({ "action": "wait" }),
        Decision::Allow => json!({ "action": "allow", "path": path }),
        Decision::Redirect(target) => json!({ "action": "redirect", "path": target.path() }),
    };
    print_json(&verdict)
}

async fn run_flags(ctx: &AppContext, flags: FlagsCommand) -> Result<(), CliError> {
    match flags.command {
        Some(FlagsSubcommand::MarkLaunched) => ctx.flags.mark_launched().await,
        Some(FlagsSubcommand::Onboarding { completed }) => ctx.flags.set_onboarding_completed(completed).await,
        None => {}
    }
    print_json(&json!({
        "first_launch": ctx.flags.is_first_launch().await,
        "onboarding_completed": ctx.flags.onboarding_completed().await,
    }))
}

fn session_json(session: &Session) -> Value {
    json!({
        "authenticated": session.is_authenticated,
        "checked": session.is_auth_checked,
        "user": session.user.as_ref().map(|u| json!({
            "id": u.id,
            "username": u.username,
            "user_type": u.user_type.as_str(),
        })),
        "error": session.error,
    })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
