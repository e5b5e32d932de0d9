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
use std::{
    error::Error,
    fmt,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, error, info, span, Level};

use super::{FetchError, Totals};

/// How often the child process is checked for completion.
const POLL_TICK: Duration = Duration::from_millis(250);

/// A source that shells out to a command and parses the totals from its JSON
/// output. This is how the scraped dashboard is consumed: the command runs a
/// headless browser and prints a single JSON object to stdout.
pub struct Source {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Source {
    /// Creates a new command source.
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Source, Box<dyn Error>> {
        let (program, args) = match command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => return Err("feed command cannot be empty".into()),
        };

        Ok(Source {
            program,
            args,
            timeout,
        })
    }
}

impl super::Source for Source {
    fn fetch(&self) -> Result<Totals, FetchError> {
        let span = span!(Level::INFO, "fetch (command)");
        let _enter = span.enter();

        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Poll the child until it exits or overstays its deadline. A child
        // that is still running at the deadline is killed and reaped.
        loop {
            if child.try_wait()?.is_some() {
                break;
            }

            let elapsed = start.elapsed();
            if elapsed > self.timeout {
                child.kill()?;
                let _ = child.wait();
                error!(
                    elapsed = format!("{:?}", elapsed),
                    "Fetch command overstayed its deadline, killed."
                );
                return Err(FetchError::Timeout(elapsed));
            }

            debug!(elapsed = format!("{:?}", elapsed), "Process still running.");
            thread::sleep(POLL_TICK);
        }

        info!(
            elapsed = format!("{:?}", start.elapsed()),
            "Process finished, pulling stdout/stderr."
        );
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!(
                status = format!("{}", output.status),
                stdout = String::from_utf8_lossy(&output.stdout).to_string(),
                stderr = stderr,
                "Fetch command failed."
            );
            return Err(FetchError::Failed {
                status: output.status,
                stderr,
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (command)", self.program)
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, time::Duration};

    use crate::feed::{FetchError, Source as _, Totals};

    use super::Source;

    fn shell(script: &str, timeout: Duration) -> Source {
        Source::new(
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            timeout,
        )
        .expect("unable to create source")
    }

    #[test]
    fn test_fetch_parses_json_output() -> Result<(), Box<dyn Error>> {
        let source = shell(
            r#"echo '{"totalConfirmed": 100, "totalDeaths": 5}'"#,
            Duration::from_secs(5),
        );

        assert_eq!(
            Totals {
                total_confirmed: 100,
                total_deaths: 5,
            },
            source.fetch()?
        );
        Ok(())
    }

    #[test]
    fn test_fetch_fails_on_nonzero_exit() {
        let source = shell("echo boom >&2; exit 3", Duration::from_secs(5));

        match source.fetch() {
            Err(FetchError::Failed { stderr, .. }) => assert!(stderr.contains("boom")),
            result => panic!("unexpected fetch result: {:?}", result.err()),
        }
    }

    #[test]
    fn test_fetch_fails_on_malformed_output() {
        let source = shell("echo not json", Duration::from_secs(5));

        assert!(matches!(source.fetch(), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_fetch_kills_overstaying_command() {
        let source = shell("sleep 30", Duration::from_millis(100));

        assert!(matches!(source.fetch(), Err(FetchError::Timeout(_))));
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(Source::new(Vec::new(), Duration::from_secs(5)).is_err());
    }
}
