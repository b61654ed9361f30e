use clap::Parser;
use expense_sync::args::{Args, Command, ExpensesSubcommand, ProfileSubcommand};
use expense_sync::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            match e.api_error() {
                Some(api) => error!("{}", api.user_message()),
                None => error!("Exiting with error: {e}"),
            }
            debug!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().expenses_home().path();

    // This allows for running the program without a backend. When EXPENSES_IN_TEST_MODE is set
    // and non-zero in length, then the mode will be Mode::Test, otherwise it will be Mode::Live.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.api_url()).await?.print(),

        Command::Login(login_args) => {
            commands::login(Config::load(home).await?, mode, login_args)
                .await?
                .print()
        }

        Command::Register(register_args) => {
            commands::register(Config::load(home).await?, mode, register_args)
                .await?
                .print()
        }

        Command::Logout => commands::logout(Config::load(home).await?, mode)
            .await?
            .print(),

        Command::Whoami => commands::whoami(Config::load(home).await?, mode)
            .await?
            .print(),

        Command::Profile(profile_args) => {
            let config = Config::load(home).await?;
            match profile_args.action() {
                ProfileSubcommand::Update(args) => commands::update_profile(config, mode, args)
                    .await?
                    .print(),
                ProfileSubcommand::Delete => commands::delete_profile(config, mode).await?.print(),
            }
        }

        Command::Password(password_args) => {
            commands::password(Config::load(home).await?, mode, password_args)
                .await?
                .print()
        }

        Command::Expenses(expenses_args) => {
            let config = Config::load(home).await?;
            match expenses_args.action() {
                ExpensesSubcommand::List(args) => {
                    let out = commands::list_expenses(config, mode, args).await?;
                    out.print();
                    if let Some(rows) = out.structure() {
                        println!("{rows}");
                    }
                }
                ExpensesSubcommand::Show(args) => commands::show_expense(config, mode, args.id)
                    .await?
                    .print(),
                ExpensesSubcommand::Add(args) => {
                    commands::add_expense(config, mode, args).await?.print()
                }
                ExpensesSubcommand::Update(args) => {
                    commands::update_expense(config, mode, args).await?.print()
                }
                ExpensesSubcommand::Delete(args) => {
                    commands::delete_expense(config, mode, args.id)
                        .await?
                        .print()
                }
            }
        }

        Command::Dashboard(dashboard_args) => {
            commands::dashboard(Config::load(home).await?, mode, dashboard_args.days())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                "expense_sync",
                level,
                env!("CARGO_CRATE_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
