//! robot-deploy binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use robot_deploy::api::{serve_with_state, AppState};
use robot_deploy::cli::{self, Args};
use robot_deploy::config::Config;
use robot_deploy::{logging, Command, Outcome};
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'robot-deploy --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> robot_deploy::Result<ExitCode> {
    let config = Config::load(&args)?;
    if let Err(e) = logging::init_with_filter(config.log_filter()) {
        eprintln!("warning: logging not initialized: {}", e);
    }

    let runner = config.runner();

    if let Some(line) = args.exec {
        let outcome = runner.run_async(Command::new(line)).await?;
        return Ok(match outcome {
            Outcome::Success(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Outcome::Failure(failure) => {
                eprintln!("{}", failure.diagnostics);
                ExitCode::FAILURE
            }
        });
    }

    info!("robot-deploy v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::new(Arc::new(runner), config.deploy.clone())
        .with_default_timeout(config.runner.default_timeout())
        .with_access(config.access_policy());
    if !state.access.execution_enabled() {
        info!("no API key configured, POST /api/v1/execute is disabled");
    }
    serve_with_state(config.to_server_config()?, state).await?;

    Ok(ExitCode::SUCCESS)
}
