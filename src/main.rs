use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use yansi::Paint;

use getspot::config::{self, Config, DEFAULT_CONFIG_PATH, DEFAULT_INSTANCE_TYPE};
use getspot::menu::run_menu;
use getspot::models::Teardown;
use getspot::services::{acquire, plan_bid, Acquisition, Provisioner};
use getspot::utils::{network_table, print_price_table};
use getspot::ProvisionError;

#[derive(Parser)]
#[command(
    name = "getspot",
    author,
    version,
    about = "Acquire a cheap EC2 spot instance",
    long_about = r#"getspot finds the cheapest availability zone for an instance type, places a persistent spot request a few percent above the current price, waits for it to be fulfilled, tags the instance and prints how to connect to it. It then keeps a small menu open until you cancel the reservation.

Examples:
  1) Request the default instance type with ec2-dev.json:
      getspot
  2) Request a specific type and zone:
      getspot -t m5.large -z eu-west-1b -c ec2-prod.json
  3) Only look at prices:
      getspot prices -t r4.xlarge
"#,
    after_help = "Set RUST_LOG=getspot=debug to see every polling step."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Instance type to request
    #[arg(long = "type", short = 't', global = true, default_value = DEFAULT_INSTANCE_TYPE)]
    instance_type: String,
    /// Path to the JSON configuration file
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    /// Availability zone to use instead of asking (defaults to the cheapest)
    #[arg(long, short = 'z', global = true)]
    zone: Option<String>,
    /// Path to .env file with AWS_* overrides
    #[arg(long, global = true)]
    env_file: Option<String>,
    /// Disable colorized output
    #[arg(long, global = true)]
    no_color: bool,
    /// Do not echo EC2 requests and responses
    #[arg(long, global = true)]
    silent: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and resolve the network resources
    #[command(about = "Validate configuration and network discovery.", long_about = "Load the configuration file, open the AWS session and resolve the VPC, public subnets and security group without placing any request.")]
    CheckConfig,
    /// Show current spot prices without placing a request
    #[command(about = "Show the spot price table.", long_about = "Print current Linux/UNIX spot prices per availability zone, cheapest first, and the price a request would be placed at.")]
    Prices,
}

fn prompt(message: &str) -> io::Result<Option<String>> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let trimmed = line.trim();
    Ok(if trimmed.is_empty() { None } else { Some(trimmed.to_string()) })
}

fn polling_spinner(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn report_teardown(teardown: &Teardown) {
    println!("{}", Paint::new("Spot instance request canceled").green());
    if let Teardown::Terminated { instance_id, state } = teardown {
        println!(
            "Instance {} terminated ({})",
            instance_id,
            state.as_deref().unwrap_or("state unknown")
        );
    }
}

async fn check_config(config: Config) -> Result<(), ProvisionError> {
    let provisioner = Provisioner::connect(config).await?;
    println!("\n{}\n", network_table(provisioner.network()));
    println!("{}", Paint::new("Configuration looks valid").green());
    Ok(())
}

async fn show_prices(config: Config, instance_type: &str) -> Result<(), ProvisionError> {
    let provisioner = Provisioner::connect(config).await?;
    let quotes = provisioner.spot_prices(instance_type).await?;
    print_price_table(&quotes);
    let bid = plan_bid(&quotes, None, provisioner.config().price_premium_percent)
        .ok_or_else(|| ProvisionError::NoSpotPrices(instance_type.to_string()))?;
    println!(
        "Cheapest zone {} would be requested at {}",
        Paint::new(&bid.availability_zone).cyan(),
        Paint::new(&bid.spot_price).cyan()
    );
    Ok(())
}

async fn run_acquisition(config: Config, instance_type: &str, zone: Option<&str>, show_spinner: bool) -> Result<(), ProvisionError> {
    let provisioner = Provisioner::connect(config).await?;

    // Find cheapest zone
    let quotes = provisioner.spot_prices(instance_type).await?;
    print_price_table(&quotes);
    let cheapest = quotes
        .first()
        .ok_or_else(|| ProvisionError::NoSpotPrices(instance_type.to_string()))?;
    println!(
        "Recommended availability zone (price): {} ( {} )",
        cheapest.availability_zone, cheapest.price
    );
    let zone_override = match zone {
        Some(z) => Some(z.to_string()),
        None => prompt("Enter your preference availability zone:")?,
    };
    let bid = plan_bid(&quotes, zone_override.as_deref(), provisioner.config().price_premium_percent)
        .ok_or_else(|| ProvisionError::NoSpotPrices(instance_type.to_string()))?;

    // Request spot instance and wait for it
    let spinner = polling_spinner(show_spinner);
    let acquisition = acquire(
        &provisioner,
        instance_type,
        &bid,
        |request_id| {
            spinner.suspend(|| println!("Request_Id: {}", Paint::new(request_id).cyan()));
            spinner.set_message(format!("Waiting for spot request {}", request_id));
        },
        |status| {
            spinner.set_message(format!(
                "Waiting for spot request {} ({})",
                status.request_id,
                status.progress_label()
            ));
        },
    )
    .await;
    spinner.finish_and_clear();

    let acquisition = acquisition?;
    if let Some(notice) = acquisition.notice() {
        println!("{}", Paint::new(notice).yellow());
    }
    let mut reservation = match acquisition {
        Acquisition::Ready { reservation, tagged } => {
            println!("Instance_Id {}", Paint::new(&reservation.instance_id).cyan());
            if tagged {
                println!("{}", Paint::new("Instance successfully tagged").green());
            } else {
                eprintln!("{}", Paint::new("Failed to tag instance; continuing untagged").yellow());
            }
            reservation
        }
        Acquisition::CapacityNotAvailable { teardown, .. } => {
            report_teardown(&teardown);
            return Ok(());
        }
    };

    if reservation.public_ip.is_empty() {
        println!(
            "{}",
            Paint::new("Public IP Address not assigned yet; use option 1 to look it up again").yellow()
        );
    } else {
        println!("Public IP Address: {} . Connect using: ", reservation.public_ip);
        println!("{}", reservation.ssh_command(&provisioner.config().key_name));
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    run_menu(&provisioner, &mut reservation, stdin.lock(), &mut stdout).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // CLI parsing
    let cli = Cli::parse();

    if cli.no_color {
        yansi::whenever(yansi::Condition::NEVER);
    }

    if cli.silent {
        getspot::api::set_silent(true);
    }

    config::load_env_file(cli.env_file.as_deref());

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(%e, "Failed to load configuration");
            eprintln!("{}: {}", Paint::new("Invalid configuration").red(), e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::CheckConfig) => check_config(config).await,
        Some(Commands::Prices) => show_prices(config, &cli.instance_type).await,
        None => run_acquisition(config, &cli.instance_type, cli.zone.as_deref(), cli.silent).await,
    };

    if let Err(e) = result {
        tracing::error!(%e, "getspot failed");
        eprintln!("{}: {}", Paint::new("Error").red(), e);
        process::exit(1);
    }
}
