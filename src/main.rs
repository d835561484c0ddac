use altoro::adapter::{
    AccountsAdapter, CardsAdapter, HttpApiClient, HttpPageDriver, LoginAdapter, TransferAdapter,
};
use altoro::config::Settings;
use altoro::error::Result;
use altoro::report::export::{CsvExporter, ReportExporter};
use altoro::runner::{RunController, RunSummary};
use altoro::workflow::{
    AccountsStep, ApiStep, AuthStep, CardsStep, FiltersStep, Step, TransferStep,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Banking workflow automation and reconciliation
#[derive(Parser)]
#[command(name = "altoro")]
#[command(about = "Drive the Altoro Mutual demo bank and reconcile web vs API data", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the settings file
    #[arg(short = 'c', long, default_value = "config/settings.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the full workflow run (default command)
    Run {
        /// Run without a visible browser window
        #[arg(long)]
        headless: bool,

        /// Override the report output directory
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Print the resolved settings and exit
    Info,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,hyper=debug,reqwest=debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("started with verbosity level: {}", cli.verbose);

    let settings = match Settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            error!("configuration error: {e}");
            std::process::exit(2);
        }
    };

    let result = match cli.command {
        Some(Commands::Info) => {
            print_info(&settings);
            return;
        }
        Some(Commands::Run { headless, output }) => {
            let mut settings = settings;
            if headless {
                settings.headless = true;
            }
            if let Some(dir) = output {
                settings.output.report_dir = dir;
            }
            run_automation(settings).await
        }
        None => run_automation(settings).await,
    };

    match result {
        Ok(summary) if summary.success() => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            error!("run aborted: {e}");
            std::process::exit(2);
        }
    }
}

fn print_info(settings: &Settings) {
    println!("base URL:       {}", settings.urls.base);
    println!("API base URL:   {}", settings.urls.api_base);
    println!("valid user:     {}", settings.credentials.valid.username);
    println!("API user:       {}", settings.credentials.api.username);
    println!(
        "transfer:       {} -> {} ({})",
        settings.transfer.from_account, settings.transfer.to_account, settings.transfer.amount
    );
    println!(
        "date filter:    {} to {}",
        settings.filters.date_range.start, settings.filters.date_range.end
    );
    println!("min deposit:    {}", settings.filters.min_deposit);
    println!("tolerance:      {}", settings.reconcile.tolerance);
    println!("report dir:     {}", settings.output.report_dir.display());
    println!("headless:       {}", settings.headless);
}

/// Wire the real adapters, run the controller, export the report. The
/// browser session is signed off on every exit path.
async fn run_automation(settings: Settings) -> Result<RunSummary> {
    std::fs::create_dir_all(&settings.output.screenshots_dir).map_err(|e| {
        altoro::error::AutomationError::config(format!("cannot create screenshots dir: {e}"))
    })?;

    let driver = Arc::new(HttpPageDriver::new(
        &settings.urls.base,
        settings.timeouts.navigation_ms,
        settings.output.screenshots_dir.clone(),
    )?);
    let api = Arc::new(HttpApiClient::new(&settings)?);
    let session = LoginAdapter::new(driver.clone(), &settings, settings.credentials.valid.clone());

    let steps: Vec<Box<dyn Step>> = vec![
        Box::new(AuthStep::new(
            LoginAdapter::new(driver.clone(), &settings, settings.credentials.valid.clone()),
            LoginAdapter::new(driver.clone(), &settings, settings.credentials.invalid.clone()),
        )),
        Box::new(AccountsStep::new(AccountsAdapter::new(
            driver.clone(),
            &settings,
        ))),
        Box::new(FiltersStep::new(
            settings.filters.date_range.parse()?,
            settings.filters.min_deposit,
        )),
        Box::new(TransferStep::new(TransferAdapter::new(
            driver.clone(),
            &settings,
        ))),
        Box::new(CardsStep::new(CardsAdapter::new(driver.clone(), &settings))),
        Box::new(ApiStep::new(
            api,
            settings.credentials.api.clone(),
            settings.filters.api_dates.parse()?,
        )),
    ];

    let controller = RunController::new(
        steps,
        settings.reconcile.tolerance,
        settings.retry.max_attempts,
        Duration::from_secs(settings.timeouts.run_deadline_secs),
    );

    let result = controller.run().await;
    session.sign_off().await;
    let summary = result?;

    let written = CsvExporter::new(&settings.output.report_dir).export(&summary.report)?;

    println!("run {}", summary.report.run_id);
    for (step, status) in &summary.statuses {
        println!("  {step:<10} {status}");
    }
    println!("{} report sheet(s) written", written.len());
    if !summary.unexpected_failures.is_empty() {
        println!("failed steps: {}", summary.unexpected_failures.join(", "));
    }

    Ok(summary)
}
