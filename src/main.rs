use std::io::{self, Write};

use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use podoru::models::ServiceStatus;
use podoru::{ApiError, ClientConfig, ControlPlane, ErrorCategory, PreferencesManager, SessionEvent, Theme};
use tokio::sync::broadcast::error::RecvError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable supplying the login email.
const ENV_EMAIL: &str = "PODORU_EMAIL";

/// Lines requested by `logs`.
const LOG_TAIL: u32 = 100;

const USAGE: &str = "\
usage: podoru [--version] [--email <email>] <command>

commands:
  login                 sign in and print the session identity
  whoami                print the signed-in user's profile
  teams                 list your teams
  projects <team>       list a team's projects
  services <project>    list a project's services
  watch <service>       follow a service's status until interrupted
  logs <service>        follow a service's logs until interrupted
  theme [light|dark|system]
                        show or set the UI theme";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Login,
    WhoAmI,
    Teams,
    Projects(String),
    Services(String),
    Watch(String),
    Logs(String),
    Theme(Option<String>),
}

struct Cli {
    email: Option<String>,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Cli> {
    let mut email = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--email" => {
                let value = iter.next().ok_or_else(|| eyre!("--email needs a value"))?;
                email = Some(value.clone());
            }
            flag if flag.starts_with("--") => bail!("unknown flag {}\n\n{}", flag, USAGE),
            _ => positional.push(arg.as_str()),
        }
    }

    let argument = |name: &str| -> Result<String> {
        positional
            .get(1)
            .map(|value| value.to_string())
            .ok_or_else(|| eyre!("missing <{}>\n\n{}", name, USAGE))
    };

    let command = match positional.first().copied() {
        Some("login") => Command::Login,
        Some("whoami") => Command::WhoAmI,
        Some("teams") => Command::Teams,
        Some("projects") => Command::Projects(argument("team")?),
        Some("services") => Command::Services(argument("project")?),
        Some("watch") => Command::Watch(argument("service")?),
        Some("logs") => Command::Logs(argument("service")?),
        Some("theme") => Command::Theme(positional.get(1).map(|value| value.to_string())),
        Some(other) => bail!("unknown command {}\n\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    };

    Ok(Cli { email, command })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("podoru=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

/// Sign in with the configured email and a prompted password.
async fn sign_in(client: &ControlPlane, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| std::env::var(ENV_EMAIL).ok()) {
        Some(email) => email,
        None => {
            print!("Email: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    if email.is_empty() {
        bail!("an email is required (--email or {})", ENV_EMAIL);
    }

    let password = rpassword::prompt_password("Password: ").wrap_err("failed to read password")?;
    let user = client
        .login(&email, &password)
        .await
        .map_err(|err| eyre!(err.user_message()))?;
    tracing::debug!(user_id = %user.id, "Signed in");
    Ok(())
}

fn status_marker(status: ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Running => "●",
        ServiceStatus::Deploying => "◐",
        ServiceStatus::Stopped => "○",
        ServiceStatus::Failed => "✗",
    }
}

async fn run(client: &ControlPlane, cli: Cli) -> Result<()> {
    let command = match cli.command {
        Command::Theme(choice) => return theme(choice),
        command => command,
    };

    sign_in(client, cli.email).await?;

    match command {
        Command::Login => {
            let identity = client
                .session_store()
                .identity()
                .ok_or_else(|| eyre!("no session after login"))?;
            println!("Signed in as {} ({})", identity.email, identity.user_id);
        }
        Command::WhoAmI => {
            let user = client.current_user().await?;
            println!("{} <{}>", user.name, user.email);
            println!("  id:     {}", user.id);
            println!("  active: {}", user.is_active);
        }
        Command::Teams => {
            for entry in client.teams().await?.iter() {
                println!("{:<38} {:<24} {:?}", entry.team.id, entry.team.name, entry.role);
            }
        }
        Command::Projects(team_id) => {
            for project in client.team_projects(&team_id).await?.iter() {
                println!("{:<38} {:<24} {}", project.id, project.name, project.slug);
            }
        }
        Command::Services(project_id) => {
            for service in client.project_services(&project_id).await?.iter() {
                println!(
                    "{} {:<38} {:<24} {} x{}",
                    status_marker(service.status),
                    service.id,
                    service.name,
                    service.status,
                    service.replicas
                );
            }
        }
        Command::Watch(service_id) => watch_service(client, &service_id).await?,
        Command::Logs(service_id) => follow_logs(client, &service_id).await?,
        Command::Theme(_) => {}
    }

    if let Err(err) = client.logout().await {
        tracing::warn!(error = %err, "Logout was not confirmed by the server");
    }
    Ok(())
}

async fn watch_service(client: &ControlPlane, service_id: &str) -> Result<()> {
    let mut subscription = client.watch_service(service_id).await?;
    let mut events = client.session_events();
    let mut current = subscription.latest()?;
    let mut last = None;

    loop {
        if let Some(service) = current.take() {
            if last != Some(service.status) {
                println!(
                    "{} {} {}",
                    chrono::Utc::now().format("%H:%M:%S"),
                    status_marker(service.status),
                    service.status
                );
                last = Some(service.status);
            }
        }

        tokio::select! {
            next = subscription.next() => match next {
                Some(Ok(service)) => current = Some(service),
                Some(Err(err)) => poll_failed(&err)?,
                None => return session_check(client),
            },
            event = events.recv() => session_event(event)?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn follow_logs(client: &ControlPlane, service_id: &str) -> Result<()> {
    let mut subscription = client.watch_logs(service_id, Some(LOG_TAIL), None).await?;
    let mut events = client.session_events();
    let mut current = subscription.latest()?;
    let mut printed = String::new();

    loop {
        if let Some(logs) = current.take() {
            print!("{}", unseen_lines(&printed, &logs.logs));
            io::stdout().flush()?;
            printed = logs.logs.clone();
        }

        tokio::select! {
            next = subscription.next() => match next {
                Some(Ok(logs)) => current = Some(logs),
                Some(Err(err)) => poll_failed(&err)?,
                None => return session_check(client),
            },
            event = events.recv() => session_event(event)?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

/// Auth failures end a follow loop; anything else is reported and polling
/// continues.
fn poll_failed(err: &ApiError) -> Result<()> {
    if err.category() == ErrorCategory::Auth {
        bail!("{}", err.user_message());
    }
    eprintln!("refresh failed: {}", err.user_message());
    Ok(())
}

fn session_event(event: Result<SessionEvent, RecvError>) -> Result<()> {
    match event {
        Ok(SessionEvent::Cleared { reason }) => bail!("session ended ({:?}); sign in again", reason),
        Ok(_) | Err(RecvError::Lagged(_)) => Ok(()),
        Err(RecvError::Closed) => bail!("session store closed"),
    }
}

/// A subscription closes when the cache is cleared, which happens on logout.
fn session_check(client: &ControlPlane) -> Result<()> {
    if client.is_authenticated() {
        Ok(())
    } else {
        bail!("session ended; sign in again")
    }
}

/// The part of `current` after the last line of `previous`, or all of it
/// when the tail window moved past that line.
fn unseen_lines<'a>(previous: &str, current: &'a str) -> &'a str {
    let last = match previous.lines().last() {
        Some(line) if !line.is_empty() => line,
        _ => return current,
    };
    match current.rfind(last) {
        Some(at) => current[at + last.len()..].trim_start_matches('\n'),
        None => current,
    }
}

fn theme(choice: Option<String>) -> Result<()> {
    let manager = PreferencesManager::new()?;

    match choice {
        Some(value) => {
            let theme: Theme = value.parse()?;
            let preferences = manager.update(|p| p.theme = theme)?;
            println!("Theme set to {}", preferences.theme);
        }
        None => println!("{}", manager.load().theme),
    }
    Ok(())
}

fn main() -> Result<()> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("podoru {}", VERSION);
        return Ok(());
    }

    color_eyre::install()?;
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let client = ControlPlane::new(ClientConfig::from_env());
    runtime.block_on(run(&client, cli))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        let cli = parse_args(&args(&["--email", "ada@example.com", "services", "p-1"])).unwrap();
        assert_eq!(cli.email.as_deref(), Some("ada@example.com"));
        assert_eq!(cli.command, Command::Services("p-1".to_string()));

        let cli = parse_args(&args(&["theme"])).unwrap();
        assert_eq!(cli.command, Command::Theme(None));
    }

    #[test]
    fn test_unseen_lines() {
        assert_eq!(unseen_lines("", "a\nb\n"), "a\nb\n");
        assert_eq!(unseen_lines("a\nb\n", "a\nb\nc\n"), "c\n");
        assert_eq!(unseen_lines("a\nb\n", "b\nc\nd\n"), "c\nd\n");
        assert_eq!(unseen_lines("x\n", "y\n"), "y\n");
    }

    #[test]
    fn test_follow_loop_stops_on_lost_session() {
        let cleared = Ok(SessionEvent::Cleared {
            reason: podoru::ClearReason::RenewalFailed,
        });
        assert!(session_event(cleared).is_err());
        assert!(session_event(Err(RecvError::Lagged(3))).is_ok());

        let expired = ApiError::AuthExpired {
            message: "token expired".to_string(),
        };
        assert!(poll_failed(&expired).is_err());
        let missing = ApiError::NotFound {
            message: "Service not found".to_string(),
        };
        assert!(poll_failed(&missing).is_ok());
    }

    #[test]
    fn test_parse_rejects_missing_argument() {
        assert!(parse_args(&args(&["watch"])).is_err());
        assert!(parse_args(&args(&["deploy", "s-1"])).is_err());
        assert!(parse_args(&args(&[])).is_err());
    }
}
