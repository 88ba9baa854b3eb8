//! `opsconsole` entry point: a line-oriented console over the session core.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use opsconsole_auth::{Capability, registry};
use opsconsole_client::{ClientConfig, Console, ConsoleError, HttpAuthApi, Route, SqliteSessionStore};
use opsconsole_core::SystemClock;

type AppConsole = Console<SqliteSessionStore, HttpAuthApi>;

const HELP: &str = "\
commands:
  login <identifier> <secret>   submit credentials
  otp <code>                    submit the verification code
  resend                        send a new verification code
  back                          cancel verification
  logout | confirm | cancel     log out (asks for confirmation)
  go <path>                     navigate, e.g. `go /contracts`
  can <CAPABILITY>              check a capability, e.g. `can CONTRACT.UPDATE`
  menu                          list reachable screens
  whoami                        show the session
  refresh                       reload permissions
  caps                          list known capabilities
  quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    opsconsole_observability::init();

    let config = ClientConfig::from_env().context("failed to load configuration")?;
    tracing::info!(api_url = %config.api_url, session_db = %config.session_db.display(), "starting ops console");

    let store = SqliteSessionStore::open(&config.session_db)
        .await
        .with_context(|| format!("failed to open session store at {}", config.session_db.display()))?;
    let api = HttpAuthApi::new(config.api_url.clone(), config.http_timeout).context("failed to build HTTP client")?;

    let console = Console::new(store, api, Arc::new(SystemClock));
    console.start().await.context("failed to restore session")?;
    show_location(&console);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&console);
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["quit" | "exit"] => break,
            ["help"] => println!("{HELP}"),
            command => {
                if let Err(err) = run(&console, command).await {
                    report(&console, &err);
                }
                if let Some(route) = console.pending_navigation() {
                    let (_, landed) = console.open(route.path());
                    println!("-> {} ({})", landed.title(), landed.path());
                }
            }
        }
        prompt(&console);
    }

    Ok(())
}

async fn run(console: &AppConsole, command: &[&str]) -> Result<(), ConsoleError> {
    match command {
        ["login", identifier, secret] => console.submit_credentials(identifier, secret).await?,
        ["otp", code] => console.submit_otp(code).await?,
        ["resend"] => {
            console.resend_otp().await?;
            println!("a new code has been sent");
        }
        ["back"] => console.cancel_verification().await?,
        ["logout"] => {
            console.request_logout();
            println!("log out? type `confirm` or `cancel`");
        }
        ["confirm"] => console.confirm_logout().await?,
        ["cancel"] => console.cancel_logout(),
        ["go", path] => {
            let (shell, route) = console.open(path);
            if route != Route::parse(path) {
                println!("redirected");
            }
            println!("{} ({}) [{:?} shell]", route.title(), route.path(), shell);
        }
        ["can", raw] => match raw.parse::<Capability>() {
            Ok(capability) => {
                let verdict = if console.has(&capability) { "yes" } else { "no" };
                println!("{capability}: {verdict}");
            }
            Err(err) => println!("{err}"),
        },
        ["menu"] => {
            for item in console.menu() {
                println!("  {:<20} {}", item.title, item.path);
            }
        }
        ["whoami"] => show_session(console),
        ["refresh"] => {
            console.refresh_permissions().await?;
            println!("{} capabilities", console.permissions().snapshot().entries().len());
        }
        ["caps"] => {
            for capability in registry::ALL {
                println!("  {:<24} {}", capability, registry::describe(capability).unwrap_or_default());
            }
        }
        _ => println!("unknown command; type `help`"),
    }
    Ok(())
}

fn report(console: &AppConsole, err: &ConsoleError) {
    println!("error: {err}");
    if console.can_resend() {
        println!("too many failed attempts; type `resend` for a new code");
    }
}

fn prompt(console: &AppConsole) {
    use std::io::Write;

    let phase = console.phase();
    print!("[{phase}] > ");
    let _ = std::io::stdout().flush();
}

fn show_location(console: &AppConsole) {
    let (_, route) = console.open("/");
    println!("{} ({})", route.title(), route.path());
}

fn show_session(console: &AppConsole) {
    let phase = console.phase();
    match console.account() {
        Some(account) => println!("{phase}: {} ({})", account.label(), account.id),
        None => println!("{phase}"),
    }
    if let Some(credential) = console.session().credential() {
        println!("session expires {}", credential.expires_at().to_rfc3339());
    }
    println!("permissions: {:?}", console.permission_status());
    if console.is_logout_requested() {
        println!("logout awaiting confirmation");
    }
}
