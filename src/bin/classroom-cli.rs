//! Terminal front end for the classroom service.
//!
//! Keeps the signed-in session in a state file between runs and drives the
//! same typed client and attendance editor a graphical shell would.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use classroom::client::navigation::{Resolution, Route, resolve};
use classroom::client::{ApiClient, Session, SessionStore, Theme};
use classroom::editor::{AttendanceEditor, Banner, Mode};
use classroom::model::attendance::AttendanceStatus;

#[derive(Parser, Debug)]
#[command(
    name = "classroom-cli",
    version,
    about = "Classroom management from the terminal",
    after_help = "EXAMPLES:\n    \
                  classroom-cli login asha                      # Sign in\n    \
                  classroom-cli batches                         # Batches for the signed-in role\n    \
                  classroom-cli attendance mark 1 --date 2024-01-10 --absent 12\n    \
                  classroom-cli open /teacher/batches/1/fees    # Where the view router sends you"
)]
struct Cli {
    /// Base URL of the classroom service
    #[arg(long, env = "CLASSROOM_SERVER", default_value = "http://127.0.0.1:8080", global = true)]
    server: String,

    /// Prefix the service mounts `/admin` and `/user` under
    #[arg(long, env = "CLASSROOM_API_PREFIX", default_value = "", global = true)]
    api_prefix: String,

    /// Session state file
    #[arg(long, env = "CLASSROOM_STATE", default_value = ".classroom/state.json", global = true)]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and remember the session
    Login {
        username: String,

        /// Password (prompting is not supported; prefer the env var)
        #[arg(long, env = "CLASSROOM_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Revoke the session and forget it
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Show or change the colour theme
    Theme {
        #[arg(value_enum)]
        action: Option<ThemeAction>,
    },

    /// Batches visible to the signed-in account
    Batches,

    /// Attendance sessions
    #[command(subcommand)]
    Attendance(AttendanceCommands),

    /// Resolve a view path for the current session
    Open { path: String },
}

#[derive(Subcommand, Debug)]
enum AttendanceCommands {
    /// List sessions (teachers) or own attendance (students and parents)
    List { batch_id: u64 },

    /// Mark or update attendance for a date; unlisted students are present
    /// and earlier remarks are dropped
    Mark {
        batch_id: u64,

        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// Student ids to mark absent
        #[arg(long, value_delimiter = ',')]
        absent: Vec<u64>,

        /// Remarks as `<student id>=<text>`
        #[arg(long = "remark")]
        remarks: Vec<String>,
    },

    /// Delete the session for a date
    Delete {
        batch_id: u64,

        #[arg(long)]
        date: String,

        /// Skip the confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ThemeAction {
    Light,
    Dark,
    Toggle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let store = Arc::new(SessionStore::open(&cli.state_file)?);
    let client = ApiClient::new(cli.server.as_str(), store.clone()).with_api_prefix(&cli.api_prefix);

    match cli.command {
        Commands::Login { username, password } => {
            let session = client.login(&username, &password).await?;
            let profile = session.profile();
            println!("Signed in as {} ({})", profile.name, session.role());
        }
        Commands::Logout => {
            client.logout().await?;
            println!("Signed out");
        }
        Commands::Whoami => match store.session() {
            Some(session) => print_session(&session),
            None => println!("Not signed in"),
        },
        Commands::Theme { action } => {
            let theme = match action {
                None => store.theme(),
                Some(ThemeAction::Toggle) => store.toggle_theme()?,
                Some(ThemeAction::Light) => set_theme(&store, Theme::Light)?,
                Some(ThemeAction::Dark) => set_theme(&store, Theme::Dark)?,
            };
            println!("Theme: {theme}");
        }
        Commands::Batches => list_batches(&client).await?,
        Commands::Attendance(command) => attendance(&client, command).await?,
        Commands::Open { path } => {
            let session = store.session();
            match resolve(Route::parse(&path), session.as_ref()) {
                Resolution::Render(route) => println!("render {route}"),
                Resolution::Redirect(route) => println!("redirect {route}"),
            }
        }
    }

    Ok(())
}

fn set_theme(store: &SessionStore, theme: Theme) -> anyhow::Result<Theme> {
    store.set_theme(theme)?;
    Ok(theme)
}

fn print_session(session: &Session) {
    let profile = session.profile();
    println!("{} <{}>", profile.name, profile.email);
    println!("role: {}", session.role());
    if let Session::Parent { student_id, .. } = session {
        println!("linked student: {student_id}");
    }
}

async fn list_batches(client: &ApiClient) -> anyhow::Result<()> {
    let session = client.session().session().context("Not signed in")?;
    let batches = match session {
        Session::Teacher(_) => client.list_batches().await?,
        _ => client.my_batches().await?,
    };

    if batches.is_empty() {
        println!("No batches");
    }
    for batch in batches {
        println!("{:>5}  {:<30}  {}", batch.id, batch.name, batch.subject);
    }
    Ok(())
}

async fn attendance(client: &ApiClient, command: AttendanceCommands) -> anyhow::Result<()> {
    match command {
        AttendanceCommands::List { batch_id } => {
            let session = client.session().session().context("Not signed in")?;
            if let Session::Teacher(_) = session {
                for s in client.list_attendance(batch_id).await? {
                    let absent = s
                        .records
                        .iter()
                        .filter(|r| r.status == AttendanceStatus::Absent)
                        .count();
                    println!(
                        "{:>5}  {}  {} present, {} absent",
                        s.id,
                        s.date,
                        s.records.len() - absent,
                        absent
                    );
                }
            } else {
                for entry in client.my_attendance(batch_id).await? {
                    match entry.remarks {
                        Some(remarks) => println!("{}  {}  {}", entry.date, entry.status, remarks),
                        None => println!("{}  {}", entry.date, entry.status),
                    }
                }
            }
        }
        AttendanceCommands::Mark {
            batch_id,
            date,
            absent,
            remarks,
        } => {
            let mut editor = AttendanceEditor::new(client.clone(), batch_id);
            editor.load().await?;
            editor.select_date_input(&date)?;
            if editor.mode() == Mode::Viewing {
                editor.begin_edit()?;
            }
            // the command states the whole day; earlier absences do not carry over
            editor.reset_to_present()?;
            for student_id in absent {
                editor.set_status(student_id, AttendanceStatus::Absent)?;
            }
            for remark in remarks {
                let (id, text) = remark
                    .split_once('=')
                    .with_context(|| format!("remark must look like <id>=<text>: {remark}"))?;
                let id: u64 = id.trim().parse().context("remark student id")?;
                editor.set_remark(id, text)?;
            }
            editor.submit().await?;
            print_banner(editor.banner());
        }
        AttendanceCommands::Delete {
            batch_id,
            date,
            yes,
        } => {
            let mut editor = AttendanceEditor::new(client.clone(), batch_id);
            editor.load().await?;
            editor.select_date_input(&date)?;
            let Some(session_id) = editor.current_session().map(|s| s.id) else {
                bail!("No attendance marked for {date}");
            };
            editor
                .delete(session_id, |session| {
                    if !yes {
                        eprintln!(
                            "Refusing to delete attendance for {} without --yes",
                            session.date
                        );
                    }
                    yes
                })
                .await?;
            print_banner(editor.banner());
        }
    }
    Ok(())
}

fn print_banner(banner: Option<&Banner>) {
    match banner {
        Some(Banner::Success(msg)) => println!("{msg}"),
        Some(Banner::Error(msg)) => eprintln!("{msg}"),
        None => {}
    }
}
