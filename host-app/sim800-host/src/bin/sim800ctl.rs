//! Command-line control of a SIM800 module.
//!
//! ```text
//! sim800ctl --config modem.json signal
//! sim800ctl --config modem.json http-get http://example.com/
//! RUST_LOG=sim800::wire=debug sim800ctl --config modem.json at ATI
//! ```

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, warn};
use sim800_host::{open, wait_until_ready, HostConfig, HostModem, Result};

#[derive(Parser, Debug)]
#[command(name = "sim800ctl", version, about = "Drive a SIM800 module over a serial port")]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: PathBuf,

    /// Override the serial port from the config file
    #[arg(short, long)]
    port: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a raw AT command and print the reply
    At { command: String },
    /// Signal strength
    Signal,
    /// Supply voltage
    Battery,
    /// Registered operator
    Operator,
    /// Cell-based location (opens the bearer)
    Location,
    /// HTTP GET (opens the bearer)
    HttpGet { url: String },
    /// HTTP POST (opens the bearer)
    HttpPost {
        url: String,
        payload: String,
        #[arg(long, default_value = "text/plain")]
        content_type: String,
    },
    /// Send a text message
    SmsSend { number: String, text: String },
    /// Wait for an incoming text message
    SmsReceive {
        #[arg(long, default_value_t = 60)]
        timeout_secs: u32,
    },
    /// Wait until the module is registered on a network
    Ready,
}

impl Command {
    fn needs_bearer(&self) -> bool {
        matches!(
            self,
            Command::Location | Command::HttpGet { .. } | Command::HttpPost { .. }
        )
    }
}

fn execute(modem: &mut HostModem, command: &Command, config: &HostConfig) -> Result<()> {
    match command {
        Command::At { command } => {
            let reply = modem.command(command)?;
            io::stdout().write_all(reply)?;
        }
        Command::Signal => {
            let level = modem.signal_level()?;
            println!(
                "signal {} ({} dBm, {:?})",
                level.0,
                level.dbm(),
                level.quality()
            );
        }
        Command::Battery => {
            println!("battery {} mV", modem.battery_voltage()?.0);
        }
        Command::Operator => {
            println!("operator {}", modem.operator_name()?);
        }
        Command::Location => {
            let fix = modem.gsm_location()?;
            println!(
                "lat {} lon {} at {} {}",
                fix.latitude, fix.longitude, fix.date, fix.time
            );
        }
        Command::HttpGet { url } => {
            let response = modem.http_get(url)?;
            eprintln!("status {}", response.status());
            io::stdout().write_all(response.body)?;
        }
        Command::HttpPost {
            url,
            payload,
            content_type,
        } => {
            let response = modem.http_post(url, payload.as_bytes(), content_type)?;
            eprintln!("status {}", response.status());
            io::stdout().write_all(response.body)?;
        }
        Command::SmsSend { number, text } => match modem.send_sms(number, text)? {
            Some(reference) => println!("sent (reference {})", reference),
            None => println!("sent"),
        },
        Command::SmsReceive { timeout_secs } => {
            let wait_ms = timeout_secs.saturating_mul(1_000);
            let message = modem.receive_sms(wait_ms)?;
            println!("from {}", message.sender().unwrap_or("unknown"));
            println!("{}", message.text());
        }
        Command::Ready => {
            let ready = wait_until_ready(modem, &config.ready)?;
            println!("ready: {} (signal {})", ready.operator, ready.signal.0);
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = HostConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    let mut modem = open(&config)?;

    let bearer = match (&config.bearer, cli.command.needs_bearer()) {
        (Some(bearer), true) => {
            modem.setup_bearer(
                &bearer.apn,
                bearer.user.as_deref(),
                bearer.password.as_deref(),
            )?;
            true
        }
        (None, true) => {
            warn!("no bearer configured, assuming it is already open");
            false
        }
        _ => false,
    };

    let result = execute(&mut modem, &cli.command, &config);

    if bearer {
        if let Err(e) = modem.close_bearer() {
            warn!("failed to close bearer: {}", e);
        }
    }
    result
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()) {
        error!("{}", e);
        eprintln!("sim800ctl: {e}");
        std::process::exit(1);
    }
}
