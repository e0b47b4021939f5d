use embedded_hal::spi::ErrorKind;

use crate::comms::Status;
use crate::erase::EraseStep;

/// The error type used by this library.
///
/// The only failure the flash routines can observe is the abort signal; the
/// variants record how far things got when it was seen. Bus side effects that
/// already happened are not undone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// A transfer was cut short by the abort signal. `sent` and `received`
    /// count payload bytes only; skipped echo bytes are not included.
    Aborted { sent: usize, received: usize },
    /// Abort was raised while the flash still reported an operation in
    /// progress.
    AbortedWhileBusy(Status),
    /// The erase sequence stopped at `step`. Protection may already be
    /// cleared and the array may be partially erased.
    EraseInterrupted { step: EraseStep, cause: Interruption },
}

/// What stopped an erase step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interruption {
    /// A transfer inside the step was cut short.
    Transfer { sent: usize, received: usize },
    /// The flash still reported busy when the abort was seen.
    Busy(Status),
}

impl Error {
    /// The abort that produced this error.
    pub fn interruption(&self) -> Interruption {
        match *self {
            Error::Aborted { sent, received } => Interruption::Transfer { sent, received },
            Error::AbortedWhileBusy(status) => Interruption::Busy(status),
            Error::EraseInterrupted { cause, .. } => cause,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Aborted { sent, received } => {
                defmt::write!(fmt, "Error::Aborted(sent={}, received={})", sent, received)
            }
            Error::AbortedWhileBusy(status) => {
                defmt::write!(fmt, "Error::AbortedWhileBusy({:?})", status)
            }
            Error::EraseInterrupted { step, cause } => {
                defmt::write!(fmt, "Error::EraseInterrupted({:?}, {:?})", step, cause)
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Interruption {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Interruption::Transfer { sent, received } => {
                defmt::write!(fmt, "Transfer(sent={}, received={})", sent, received)
            }
            Interruption::Busy(status) => defmt::write!(fmt, "Busy({:?})", status),
        }
    }
}

impl embedded_hal::spi::Error for Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}
