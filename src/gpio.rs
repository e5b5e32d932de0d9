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
use std::{error, fmt, io, sync::Arc};

mod mock;
mod sysfs;

/// The output level of a GPIO line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

/// Errors that can occur while driving a GPIO line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The line is reserved by an acquire that has not been released yet.
    #[error("line is already in use")]
    Busy,
    /// The underlying line write or setup failed.
    #[error("GPIO I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A GPIO output line that pulse trains can be written out to.
pub trait Line: fmt::Display + Send + Sync {
    /// Returns the name of the line.
    fn name(&self) -> String;

    /// Reserves the line for exclusive use and configures it as an output.
    /// The line stays reserved until the returned handle is dropped.
    fn acquire(&self) -> Result<Box<dyn Handle>, Error>;
}

/// An acquired GPIO line. Dropping the handle releases the line.
pub trait Handle: Send {
    /// Writes the given level to the line.
    fn set(&mut self, level: Level) -> Result<(), Error>;
}

/// Gets the line with the given name.
pub fn get_line(name: &str) -> Result<Arc<dyn Line>, Box<dyn error::Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Line::get(name)));
    };

    Ok(Arc::new(sysfs::Line::new(name)?))
}

#[cfg(test)]
pub mod test {
    pub use super::mock::Line;
}
