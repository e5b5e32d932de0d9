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
use std::{error::Error, fmt, process::ExitStatus, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::config;

mod command;
mod mock;

/// The pair of counter totals reported by the external data source.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_confirmed: i64,
    pub total_deaths: i64,
}

/// Errors that can occur while fetching counter totals.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The fetch mechanism itself could not be run.
    #[error("error running fetch command: {0}")]
    Exec(#[from] std::io::Error),
    /// The fetch ran but reported a failure.
    #[error("fetch command exited with {status}")]
    Failed { status: ExitStatus, stderr: String },
    /// The fetch produced output that could not be understood.
    #[error("invalid fetch output: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The fetch exceeded its deadline and was killed.
    #[error("fetch killed after {0:?}")]
    Timeout(Duration),
}

/// A source of counter totals. Fetches are synchronous from the caller's
/// perspective and are bounded by the source's configured timeout.
pub trait Source: fmt::Display + Send + Sync {
    /// Fetches the current counter totals.
    fn fetch(&self) -> Result<Totals, FetchError>;
}

/// Gets the source described by the given configuration.
pub fn get_source(config: &config::Feed) -> Result<Arc<dyn Source>, Box<dyn Error>> {
    let command = config.command();
    if command.first().is_some_and(|program| program.starts_with("mock")) {
        return Ok(Arc::new(mock::Source::get()));
    };

    Ok(Arc::new(command::Source::new(command, config.timeout()?)?))
}

#[cfg(test)]
pub mod test {
    pub use super::mock::Source;
}
