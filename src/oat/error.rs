use std::fmt;
use std::io;

/// Errors surfaced by the oat writer.
///
/// Layout/emission disagreement is not represented here: a mismatch
/// between the two passes is a programming error and trips a debug
/// assertion naming the offending method instead.
#[derive(Debug)]
pub enum OatError
{
    /// A sink write or seek failed at the OS level.
    Sink
    {
        what: String,
        location: String,
        source: io::Error,
    },
    /// A seek succeeded but landed at the wrong absolute position.
    SeekMismatch
    {
        what: String,
        expected: u64,
        actual: u64,
        location: String,
    },
    /// An input violated its contract (zero-length present code blob,
    /// short payload buffer, unresolvable shorty).
    InputContract(String),
}

impl OatError
{
    pub(crate) fn sink(what: impl Into<String>, location: &str, source: io::Error) -> OatError
    {
        OatError::Sink { what: what.into(), location: location.to_string(), source }
    }

    pub(crate) fn seek_mismatch(what: impl Into<String>, expected: u64, actual: u64, location: &str) -> OatError
    {
        OatError::SeekMismatch {
            what: what.into(),
            expected,
            actual,
            location: location.to_string(),
        }
    }

    pub(crate) fn contract(msg: impl Into<String>) -> OatError
    {
        OatError::InputContract(msg.into())
    }
}

impl fmt::Display for OatError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self
        {
            OatError::Sink { what, location, source } =>
            {
                write!(f, "failed to write {what} to {location}: {source}")
            }
            OatError::SeekMismatch { what, expected, actual, location } =>
            {
                write!(f, "seek for {what} landed at {actual}, expected {expected} in {location}")
            }
            OatError::InputContract(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for OatError
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)>
    {
        match self
        {
            OatError::Sink { source, .. } => Some(source),
            _ => None,
        }
    }
}
