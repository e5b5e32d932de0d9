// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
mod blink;
mod cancel;
mod config;
mod coordinator;
mod feed;
mod gpio;
mod monitor;
mod samples;
mod util;

use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser};
use tracing::info;

use cancel::CancelHandle;
use coordinator::Coordinator;
use monitor::Monitor;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=counter blinker

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/blinkd
ExecStart=/usr/local/bin/blinkd "$BLINKD_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=blinkd.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A counter blinker."
)]
struct Cli {
    /// The path to the blinker config.
    config: Option<String>,

    /// Prints a systemd service definition to stdout and exits.
    #[arg(long)]
    systemd: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if cli.systemd {
        println!("{}", SYSTEMD_SERVICE);
        return Ok(());
    }

    let config_path = match cli.config {
        Some(config_path) => config_path,
        None => return Err("expected a path to the blinker config".into()),
    };
    let config = config::parse(&PathBuf::from(config_path))?;

    let confirmed_line = gpio::get_line(config.confirmed_line())?;
    let deaths_line = gpio::get_line(config.deaths_line())?;
    let source = feed::get_source(config.feed())?;

    let cancel_handle = CancelHandle::new();
    let coordinator = Coordinator::new(
        confirmed_line,
        deaths_line,
        config.min_launch_gap()?,
        config.window()?,
        config.blink_width()?,
        cancel_handle.clone(),
    );
    let monitor = Monitor::new(
        source,
        coordinator,
        config.poll_interval()?,
        cancel_handle.clone(),
    );

    let join = tokio::spawn(monitor.run());

    tokio::signal::ctrl_c().await?;
    info!("Received interrupt, shutting down.");

    // Cancelling wakes any in-flight pulse trains so their lines get
    // released before the process exits.
    cancel_handle.cancel();
    join.await?;

    Ok(())
}
