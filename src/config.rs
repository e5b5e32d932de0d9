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
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

/// How long each pulse holds its line high.
pub const DEFAULT_BLINK_WIDTH: Duration = Duration::from_millis(100);
/// The window a batch of pulses is spread across.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60 * 24);
/// How often the external source is polled.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// The minimum time between pulse train launches across both lines.
pub const DEFAULT_MIN_LAUNCH_GAP: Duration = Duration::from_secs(60);
/// How long a fetch may run before it is killed.
pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(120);

/// A YAML representation of the blinker configuration.
#[derive(Deserialize)]
pub struct Blinker {
    /// The GPIO line to blink confirmed counter increases on.
    confirmed_line: String,

    /// The GPIO line to blink deaths counter increases on.
    deaths_line: String,

    /// Controls how long each pulse holds its line high.
    blink_width: Option<String>,

    /// Controls the window a batch of pulses is spread across.
    window: Option<String>,

    /// Controls how often the external source is polled.
    poll_interval: Option<String>,

    /// Controls the minimum time between pulse train launches.
    min_launch_gap: Option<String>,

    /// The external data source configuration.
    feed: Feed,
}

impl Blinker {
    /// Returns the name of the confirmed counter line.
    pub fn confirmed_line(&self) -> &str {
        &self.confirmed_line
    }

    /// Returns the name of the deaths counter line.
    pub fn deaths_line(&self) -> &str {
        &self.deaths_line
    }

    /// Returns the pulse width.
    pub fn blink_width(&self) -> Result<Duration, Box<dyn Error>> {
        parse_duration(&self.blink_width, DEFAULT_BLINK_WIDTH)
    }

    /// Returns the pulse train window.
    pub fn window(&self) -> Result<Duration, Box<dyn Error>> {
        parse_duration(&self.window, DEFAULT_WINDOW)
    }

    /// Returns the poll interval.
    pub fn poll_interval(&self) -> Result<Duration, Box<dyn Error>> {
        parse_duration(&self.poll_interval, DEFAULT_POLL_INTERVAL)
    }

    /// Returns the minimum launch gap.
    pub fn min_launch_gap(&self) -> Result<Duration, Box<dyn Error>> {
        parse_duration(&self.min_launch_gap, DEFAULT_MIN_LAUNCH_GAP)
    }

    /// Returns the feed configuration.
    pub fn feed(&self) -> &Feed {
        &self.feed
    }
}

/// A YAML representation of the external data source configuration.
#[derive(Deserialize)]
pub struct Feed {
    /// The command to run to fetch the current totals.
    command: Vec<String>,

    /// Controls how long the command may run before it is killed.
    timeout: Option<String>,
}

impl Feed {
    /// Returns the fetch command and its arguments.
    pub fn command(&self) -> Vec<String> {
        self.command.clone()
    }

    /// Returns the fetch timeout.
    pub fn timeout(&self) -> Result<Duration, Box<dyn Error>> {
        parse_duration(&self.timeout, DEFAULT_FEED_TIMEOUT)
    }
}

/// Parses the blinker configuration from a YAML file.
pub fn parse(file: &Path) -> Result<Blinker, Box<dyn Error>> {
    let config: Blinker = serde_yml::from_str(&fs::read_to_string(file)?)
        .map_err(|e| format!("error parsing file {}: {}", file.display(), e))?;
    Ok(config)
}

fn parse_duration(value: &Option<String>, default: Duration) -> Result<Duration, Box<dyn Error>> {
    match value {
        Some(value) => Ok(DurationString::from_string(value.clone())?.into()),
        None => Ok(default),
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::io::Write;
    use std::time::Duration;

    use super::{
        Blinker, DEFAULT_BLINK_WIDTH, DEFAULT_FEED_TIMEOUT, DEFAULT_MIN_LAUNCH_GAP,
        DEFAULT_POLL_INTERVAL, DEFAULT_WINDOW,
    };

    #[test]
    fn test_parse_full_config() -> Result<(), Box<dyn Error>> {
        let config: Blinker = serde_yml::from_str(
            r#"
confirmed_line: "18"
deaths_line: "23"
blink_width: 50ms
window: 12h
poll_interval: 30m
min_launch_gap: 2m
feed:
  command: ["node", "index.js"]
  timeout: 60s
"#,
        )?;

        assert_eq!("18", config.confirmed_line());
        assert_eq!("23", config.deaths_line());
        assert_eq!(Duration::from_millis(50), config.blink_width()?);
        assert_eq!(Duration::from_secs(12 * 60 * 60), config.window()?);
        assert_eq!(Duration::from_secs(30 * 60), config.poll_interval()?);
        assert_eq!(Duration::from_secs(120), config.min_launch_gap()?);
        assert_eq!(
            vec!["node".to_string(), "index.js".to_string()],
            config.feed().command()
        );
        assert_eq!(Duration::from_secs(60), config.feed().timeout()?);
        Ok(())
    }

    #[test]
    fn test_parse_minimal_config_uses_defaults() -> Result<(), Box<dyn Error>> {
        let config: Blinker = serde_yml::from_str(
            r#"
confirmed_line: "18"
deaths_line: "23"
feed:
  command: ["node", "index.js"]
"#,
        )?;

        assert_eq!(DEFAULT_BLINK_WIDTH, config.blink_width()?);
        assert_eq!(DEFAULT_WINDOW, config.window()?);
        assert_eq!(DEFAULT_POLL_INTERVAL, config.poll_interval()?);
        assert_eq!(DEFAULT_MIN_LAUNCH_GAP, config.min_launch_gap()?);
        assert_eq!(DEFAULT_FEED_TIMEOUT, config.feed().timeout()?);
        Ok(())
    }

    #[test]
    fn test_parse_bad_duration_is_an_error() -> Result<(), Box<dyn Error>> {
        let config: Blinker = serde_yml::from_str(
            r#"
confirmed_line: "18"
deaths_line: "23"
blink_width: not-a-duration
feed:
  command: ["node", "index.js"]
"#,
        )?;

        assert!(config.blink_width().is_err());
        Ok(())
    }

    #[test]
    fn test_parse_from_file() -> Result<(), Box<dyn Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(
            br#"
confirmed_line: "18"
deaths_line: "23"
feed:
  command: ["mock"]
"#,
        )?;

        let config = super::parse(file.path())?;
        assert_eq!("18", config.confirmed_line());
        assert_eq!(vec!["mock".to_string()], config.feed().command());
        Ok(())
    }
}
