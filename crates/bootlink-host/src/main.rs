//! # bootlink
//!
//! CLI for talking to a device running the bootlink bootloader over a
//! serial port: ping it, flash an application image, erase a partition,
//! and select and trigger the boot hand-off.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use bootlink_host::{upload, Client, ClientError};
use bootlink_protocol::{AppId, BootAction};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use serialport::SerialPort;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AppArg {
    App1,
    App2,
}

impl From<AppArg> for AppId {
    fn from(app: AppArg) -> Self {
        match app {
            AppArg::App1 => AppId::App1,
            AppArg::App2 => AppId::App2,
        }
    }
}

impl From<AppArg> for BootAction {
    fn from(app: AppArg) -> Self {
        match app {
            AppArg::App1 => BootAction::App1,
            AppArg::App2 => BootAction::App2,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ActionArg {
    App1,
    App2,
    Bootloader,
}

impl From<ActionArg> for BootAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::App1 => BootAction::App1,
            ActionArg::App2 => BootAction::App2,
            ActionArg::Bootloader => BootAction::Bootloader,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the bootloader is alive and speaking the protocol.
    Ping,
    /// Flash an application image into a partition.
    Flash {
        /// Raw binary image to flash.
        binfile: PathBuf,
        /// Target application partition.
        #[arg(long, value_enum, default_value = "app1")]
        app: AppArg,
        /// Flash page size of the target, in bytes.
        #[arg(long, default_value_t = 256)]
        page_size: usize,
        /// Select the flashed partition and boot it once flashing is done.
        #[arg(long)]
        boot: bool,
    },
    /// Erase an application partition.
    Erase {
        #[arg(value_enum)]
        app: AppArg,
    },
    /// Select the partition to execute on the next boot hand-off.
    SetBootAction {
        #[arg(value_enum)]
        action: ActionArg,
    },
    /// Arm the boot hand-off.
    Boot,
}

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Serial port the device is attached to.
    port: PathBuf,

    /// Baud rate of the serial connection.
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// Read timeout for device replies, in milliseconds.
    #[arg(long, default_value_t = 500)]
    timeout_ms: u64,

    /// The level of output verbosity.
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    #[command(subcommand)]
    command: Commands,
}

fn run(cli: &Cli, client: &mut Client<Box<dyn SerialPort>>) -> Result<(), ClientError> {
    match &cli.command {
        Commands::Ping => {
            client.ping()?;
            println!("Bootloader is alive");
        }
        Commands::Flash {
            binfile,
            app,
            page_size,
            boot,
        } => {
            let image = fs::read(binfile)?;
            let report = upload(client, AppId::from(*app), &image, *page_size)?;
            println!(
                "Flashed {} bytes in {} pages to {:?}",
                report.bytes,
                report.pages,
                AppId::from(*app)
            );

            if *boot {
                client.set_boot_action(BootAction::from(*app))?;
                client.boot()?;
                println!("Booting {:?}", AppId::from(*app));
            }
        }
        Commands::Erase { app } => {
            client.erase_app(AppId::from(*app))?;
            println!("Erased {:?}", AppId::from(*app));
        }
        Commands::SetBootAction { action } => {
            client.set_boot_action(BootAction::from(*action))?;
            println!("Boot action set");
        }
        Commands::Boot => {
            client.boot()?;
            println!("Boot hand-off armed");
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let port = match serialport::new(cli.port.to_string_lossy(), cli.baud)
        .timeout(Duration::from_millis(cli.timeout_ms))
        .open()
    {
        Ok(port) => port,
        Err(err) => {
            error!("Unable to open serial port {}: {err}", cli.port.display());
            std::process::exit(1);
        }
    };
    info!("Opened {} at {} baud", cli.port.display(), cli.baud);

    let mut client = Client::new(port);
    if let Err(err) = run(&cli, &mut client) {
        error!("{err}");
        std::process::exit(1);
    }
}
