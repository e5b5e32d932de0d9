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
    error,
    fmt, fs,
    io::Write,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{info, warn};

use super::Error;

/// The base path of the kernel's GPIO control files.
const SYSFS_GPIO_BASE: &str = "/sys/class/gpio";

/// A GPIO line driven through the sysfs interface.
pub struct Line {
    pin: u32,
    base: PathBuf,
    in_use: Arc<AtomicBool>,
}

impl Line {
    /// Creates a line for the given pin number.
    pub fn new(name: &str) -> Result<Line, Box<dyn error::Error>> {
        let pin = name
            .parse::<u32>()
            .map_err(|e| format!("invalid GPIO pin number {}: {}", name, e))?;
        Ok(Line::with_base(pin, PathBuf::from(SYSFS_GPIO_BASE)))
    }

    /// Creates a line rooted at an arbitrary base path.
    pub(crate) fn with_base(pin: u32, base: PathBuf) -> Line {
        Line {
            pin,
            base,
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.base.join(format!("gpio{}", self.pin))
    }

    /// Exports the pin, configures it as an output and opens its value file.
    fn setup(&self) -> Result<fs::File, Error> {
        let pin_dir = self.pin_dir();

        // A pin directory that already exists is reused as-is. This lets the daemon
        // recover a pin that a previous run never got to unexport.
        if !pin_dir.exists() {
            fs::write(self.base.join("export"), self.pin.to_string())?;
            fs::write(pin_dir.join("direction"), "out")?;
        } else {
            info!(pin = self.pin, "Pin is already exported, reusing.");
        }

        Ok(fs::OpenOptions::new()
            .write(true)
            .open(pin_dir.join("value"))?)
    }
}

impl super::Line for Line {
    fn name(&self) -> String {
        format!("gpio{}", self.pin)
    }

    fn acquire(&self) -> Result<Box<dyn super::Handle>, Error> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Busy);
        }

        match self.setup() {
            Ok(value) => Ok(Box::new(Handle {
                pin: self.pin,
                base: self.base.clone(),
                value,
                in_use: self.in_use.clone(),
            })),
            Err(e) => {
                self.in_use.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpio{} (sysfs)", self.pin)
    }
}

/// An exported pin with its value file held open. Unexports the pin on drop.
struct Handle {
    pin: u32,
    base: PathBuf,
    value: fs::File,
    in_use: Arc<AtomicBool>,
}

impl super::Handle for Handle {
    fn set(&mut self, level: super::Level) -> Result<(), Error> {
        let value: &[u8] = match level {
            super::Level::High => b"1",
            super::Level::Low => b"0",
        };
        self.value.write_all(value)?;
        Ok(())
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Err(e) = fs::write(self.base.join("unexport"), self.pin.to_string()) {
            warn!(pin = self.pin, err = format!("{}", e), "Error unexporting pin.");
        }
        self.in_use.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, path::Path};

    use crate::gpio::{self, Level, Line as _};

    use super::Line;

    /// Lays out the control files the kernel would provide, with the pin
    /// directory already present.
    fn sysfs_root(pin: u32) -> Result<tempfile::TempDir, Box<dyn Error>> {
        let root = tempfile::tempdir()?;
        fs::write(root.path().join("export"), "")?;
        fs::write(root.path().join("unexport"), "")?;
        let pin_dir = root.path().join(format!("gpio{}", pin));
        fs::create_dir(&pin_dir)?;
        fs::write(pin_dir.join("direction"), "")?;
        fs::write(pin_dir.join("value"), "")?;
        Ok(root)
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).expect("unable to read file")
    }

    #[test]
    fn test_set_writes_values() -> Result<(), Box<dyn Error>> {
        let root = sysfs_root(18)?;
        let line = Line::with_base(18, root.path().to_path_buf());

        let mut handle = line.acquire()?;
        handle.set(Level::High)?;
        handle.set(Level::Low)?;
        handle.set(Level::High)?;

        // Writes against a regular file accumulate, so the value file records
        // the full transition sequence.
        assert_eq!("101", read(&root.path().join("gpio18/value")));
        Ok(())
    }

    #[test]
    fn test_release_unexports_pin() -> Result<(), Box<dyn Error>> {
        let root = sysfs_root(23)?;
        let line = Line::with_base(23, root.path().to_path_buf());

        let handle = line.acquire()?;
        assert_eq!("", read(&root.path().join("unexport")));
        drop(handle);
        assert_eq!("23", read(&root.path().join("unexport")));
        Ok(())
    }

    #[test]
    fn test_acquire_is_exclusive() -> Result<(), Box<dyn Error>> {
        let root = sysfs_root(18)?;
        let line = Line::with_base(18, root.path().to_path_buf());

        let handle = line.acquire()?;
        assert!(matches!(line.acquire(), Err(gpio::Error::Busy)));

        // Releasing makes the line acquirable again.
        drop(handle);
        assert!(line.acquire().is_ok());
        Ok(())
    }

    #[test]
    fn test_failed_setup_releases_reservation() -> Result<(), Box<dyn Error>> {
        let root = tempfile::tempdir()?;
        fs::write(root.path().join("export"), "")?;

        // No pin directory appears after exporting, so setup fails.
        let line = Line::with_base(18, root.path().to_path_buf());
        assert!(matches!(line.acquire(), Err(gpio::Error::Io(_))));

        // The reservation must not be left behind by the failed acquire.
        fs::write(root.path().join("unexport"), "")?;
        let pin_dir = root.path().join("gpio18");
        fs::create_dir(&pin_dir)?;
        fs::write(pin_dir.join("direction"), "")?;
        fs::write(pin_dir.join("value"), "")?;
        assert!(line.acquire().is_ok());
        Ok(())
    }
}
