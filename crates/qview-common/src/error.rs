// error.rs - error taxonomy shared by the loader, the renderer and the driver

use std::fmt;
use std::io;

/// Errors raised while loading or walking a level.
#[derive(Debug)]
pub enum QError {
    /// A file is missing or could not be read.
    Io { path: String, source: io::Error },
    /// The file is not a well-formed map, palette, pack or script.
    Format(String),
    /// An index read from the map points outside the table it names,
    /// or the BSP tree does not terminate.
    CorruptData(String),
}

pub type QResult<T> = Result<T, QError>;

impl QError {
    pub fn io(path: &str, source: io::Error) -> Self {
        QError::Io { path: path.to_string(), source }
    }

    /// True for errors that mean the map contents cannot be trusted.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, QError::CorruptData(_))
    }
}

impl fmt::Display for QError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QError::Io { path, source } => write!(f, "couldn't read {}: {}", path, source),
            QError::Format(msg) => write!(f, "format error: {}", msg),
            QError::CorruptData(msg) => write!(f, "corrupt map data: {}", msg),
        }
    }
}

impl std::error::Error for QError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_messages() {
        let e = QError::Format("bad version".into());
        assert_eq!(e.to_string(), "format error: bad version");
        let e = QError::CorruptData("node 7 out of range".into());
        assert_eq!(e.to_string(), "corrupt map data: node 7 out of range");
        assert!(e.is_corrupt());
    }

    #[test]
    fn test_io_error_has_source() {
        let e = QError::io("maps/e1m1.bsp", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(e.source().is_some());
        assert!(e.to_string().starts_with("couldn't read maps/e1m1.bsp"));
        assert!(!e.is_corrupt());
    }
}
