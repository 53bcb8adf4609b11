use clap::Parser;

use warden::Config;
use warden::cli::{Cli, Commands};
use warden::commands::{
    handle_account, handle_asset, handle_config, handle_platform, handle_push_log,
    handle_template,
};
use warden::db::{SqliteRepository, init_db};
use warden::error::{Result, WardenError};
use warden::logging::init_logging;
use warden::utils::print_json;

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.config.clone().or_else(Config::find_existing_config);
    let config = match &config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::default(),
    };

    init_logging(&config.log_level(), config.log_json());

    let db_path = cli.config.db.clone().unwrap_or_else(|| config.db_path());
    let open = || -> Result<SqliteRepository> {
        tracing::debug!(db = %db_path.display(), "opening database");
        Ok(SqliteRepository::new(init_db(&db_path)?))
    };

    match cli.command {
        // Config commands don't need the database
        Commands::Config { command } => handle_config(config, config_path, command),
        Commands::Platform { command } => handle_platform(&open()?, &config, command),
        Commands::Asset { command } => handle_asset(&open()?, &config, command),
        Commands::Template { command } => handle_template(&open()?, &config, command),
        Commands::Account { command } => handle_account(&open()?, &config, command),
        Commands::PushLog { limit } => handle_push_log(&open()?, limit),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        match &e {
            WardenError::BulkFailed(errors) => {
                eprintln!("error: {}", e);
                let _ = print_json(errors);
            }
            _ => eprintln!("error: {}", e),
        }
        std::process::exit(1);
    }
}
