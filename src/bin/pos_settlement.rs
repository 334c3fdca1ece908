use std::{collections::BTreeMap, path::PathBuf, process::ExitCode};

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use fractic_pos_settlement::{
    config::PosConfig,
    entities::{
        BackupReport, BackupStart, Period, ReportKind, ReportQuery, SettlementRequest, User,
        ADMIN_ROLE,
    },
    errors::{EntityNotFound, InvalidInput, WriteError},
    util::PosSettlementUtil,
};
use fractic_server_error::ServerError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pos-settlement", about = "Multi-location POS and daily settlement")]
struct Cli {
    /// TOML configuration file. Falls back to `POS_SETTLEMENT_CONFIG`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Database maintenance.
    #[command(subcommand)]
    Db(DbCommand),
    /// User accounts.
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Instance file backups to Drive.
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Combined daily settlement.
    #[command(subcommand)]
    Settlement(SettlementCommand),
    /// Report exports.
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Subcommand, Debug)]
enum DbCommand {
    /// Creates the schema and the Admin role.
    Init,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    CreateUser {
        username: String,
        password: String,
        #[arg(long)]
        email: Option<String>,
        /// Grants the Admin role.
        #[arg(long)]
        admin: bool,
    },
    ResetPassword {
        username: String,
        password: String,
    },
}

#[derive(Subcommand, Debug)]
enum BackupCommand {
    /// Applies the configured frequency; keeps running in interval mode.
    Init,
    /// Uploads the configured files once.
    Run,
}

#[derive(Args, Debug)]
struct Login {
    #[arg(long)]
    user: String,
    #[arg(long)]
    password: String,
}

#[derive(Subcommand, Debug)]
enum SettlementCommand {
    Show {
        date: NaiveDate,
        #[command(flatten)]
        login: Login,
    },
    Print {
        date: NaiveDate,
        #[command(flatten)]
        login: Login,
    },
    Save {
        date: NaiveDate,
        #[arg(long)]
        next_day_cash: f64,
        /// Defaults to total cash minus next-day cash.
        #[arg(long)]
        deposit: Option<f64>,
        /// `KEY=VALUE`; repeatable.
        #[arg(long = "remark", value_parser = parse_remark)]
        remarks: Vec<(String, String)>,
        #[command(flatten)]
        login: Login,
    },
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    Export {
        #[arg(value_parser = parse_kind)]
        kind: ReportKind,
        start: NaiveDate,
        end: Option<NaiveDate>,
        /// Location slug; all locations when omitted.
        #[arg(long)]
        location: Option<String>,
        /// Two periods to compare, e.g. `2024-Q1,2025-Q1`.
        #[arg(long, value_delimiter = ',')]
        periods: Vec<String>,
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[command(flatten)]
        login: Login,
    },
}

fn parse_kind(s: &str) -> Result<ReportKind, String> {
    s.parse::<ReportKind>().map_err(|e| e.to_string())
}

fn parse_remark(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

fn init_logging() {
    let default_level = "info";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    let config = PosConfig::load(cli.config.as_deref())?;
    let pos = PosSettlementUtil::open(config)?;

    match cli.command {
        Command::Db(DbCommand::Init) => {
            let role = pos.auth().ensure_admin_role().await?;
            println!("database ready at {}", pos.config().db_path.display());
            println!("role '{}' available", role.name);
        }
        Command::Auth(AuthCommand::CreateUser {
            username,
            password,
            email,
            admin,
        }) => {
            if admin {
                pos.auth().ensure_admin_role().await?;
            }
            let roles: &[&str] = if admin { &[ADMIN_ROLE] } else { &[] };
            let user = pos
                .auth()
                .create_user(&username, email.as_deref(), &password, roles)
                .await?;
            println!("created user '{}'", user.username);
        }
        Command::Auth(AuthCommand::ResetPassword { username, password }) => {
            pos.auth().reset_password(&username, &password).await?;
            println!("password reset for '{username}'");
        }
        Command::Backup(BackupCommand::Run) => {
            let report = pos.backup().run_backup(Local::now().naive_local()).await?;
            print_backup_report(&report);
        }
        Command::Backup(BackupCommand::Init) => match pos.backup().init().await? {
            BackupStart::Off => println!("backups are off"),
            BackupStart::RanAtStartup(report) => print_backup_report(&report),
            BackupStart::OnShutdown => {
                println!("backups run on shutdown; use `backup run` from the stop script")
            }
            BackupStart::Scheduled(handle) => {
                println!("interval backups scheduled; press Ctrl-C to stop");
                tokio::select! {
                    _ = handle => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
        },
        Command::Settlement(command) => settlement(&pos, command).await?,
        Command::Report(command) => report(&pos, command).await?,
    }
    Ok(())
}

async fn login(pos: &PosSettlementUtil, login: &Login) -> Result<User, ServerError> {
    pos.auth().login(&login.user, &login.password).await
}

async fn settlement(
    pos: &PosSettlementUtil,
    command: SettlementCommand,
) -> Result<(), ServerError> {
    match command {
        SettlementCommand::Show { date, login: creds } => {
            let actor = login(pos, &creds).await?;
            let view = pos.settlement().settlement_view(&actor, date).await?;
            for report in &view.reports {
                println!(
                    "{:<20} {:>12.2} {:>6}",
                    report.location_name, report.day.total_sales, report.day.total_transactions
                );
            }
            if !view.unclosed_locations.is_empty() {
                println!("not closed: {}", view.unclosed_locations.join(", "));
            }
            let totals = &view.totals;
            println!("total sales  {:.2}", totals.total_sales);
            println!("total cash   {:.2}", totals.total_cash);
            println!("deposit      {:.2}", totals.deposit);
            println!("next day     {:.2}", totals.next_day_cash);
            println!(
                "status       {}",
                match (&view.settlement, view.all_closed) {
                    (Some(_), _) => "settled",
                    (None, true) => "ready to settle",
                    (None, false) => "waiting for locations",
                }
            );
        }
        SettlementCommand::Print { date, login: creds } => {
            let actor = login(pos, &creds).await?;
            print!("{}", pos.settlement().print_settlement(&actor, date).await?);
        }
        SettlementCommand::Save {
            date,
            next_day_cash,
            deposit,
            remarks,
            login: creds,
        } => {
            let actor = login(pos, &creds).await?;
            let request = SettlementRequest {
                total_deposit: deposit,
                total_next_day_opening_cash: Some(next_day_cash),
                remarks: remarks.into_iter().collect::<BTreeMap<_, _>>(),
            };
            let saved = pos.settlement().save_settlement(&actor, date, request).await?;
            println!(
                "settled {}: deposit {:.2}, next day {:.2}",
                saved.date, saved.total_deposit, saved.total_next_day_opening_cash
            );
        }
    }
    Ok(())
}

async fn report(pos: &PosSettlementUtil, command: ReportCommand) -> Result<(), ServerError> {
    let ReportCommand::Export {
        kind,
        start,
        end,
        location,
        periods,
        out,
        login: creds,
    } = command;
    let actor = login(pos, &creds).await?;

    let mut query = ReportQuery::new(kind, start);
    if let Some(end) = end {
        query = query.until(end);
    }
    if let Some(slug) = location {
        let location = pos
            .reports()
            .locations(&actor)
            .await?
            .into_iter()
            .find(|l| l.slug == slug)
            .ok_or_else(|| EntityNotFound::new("Location", &slug))?;
        query = query.at_location(location.id);
    }
    match periods.as_slice() {
        [] => {}
        [a, b] => query = query.comparing(a.parse::<Period>()?, b.parse::<Period>()?),
        _ => return Err(InvalidInput::new("periods", "expected exactly two")),
    }

    let export = pos
        .reports()
        .export_csv(&actor, &query, Local::now().date_naive())
        .await?;
    let path = out.join(&export.file_name);
    let path_str = path.display().to_string();
    tokio::fs::write(&path, &export.content)
        .await
        .map_err(|e| WriteError::with_debug(&path_str, &e))?;
    println!("wrote {path_str}");
    Ok(())
}

fn print_backup_report(report: &BackupReport) {
    for name in &report.uploaded {
        println!("uploaded {name}");
    }
    for name in &report.skipped {
        println!("skipped  {name} (not found)");
    }
    for name in &report.failed {
        println!("failed   {name}");
    }
}
