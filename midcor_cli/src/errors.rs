use std::path::PathBuf;

use midcor::CorrectionError;

#[derive(Debug)]
pub enum CliError {
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    Csv {
        source: csv::Error,
        path: PathBuf,
    },
    Database {
        msg: String,
        path: Option<PathBuf>,
    },
    ParseError {
        msg: String,
    },
    Correction(CorrectionError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => match path {
                Some(path) => write!(f, "I/O error on {}: {}", path.display(), source),
                None => write!(f, "I/O error: {}", source),
            },
            Self::Csv { source, path } => {
                write!(f, "Cannot read {}: {}", path.display(), source)
            }
            Self::Database { msg, path } => match path {
                Some(path) => write!(f, "{} ({})", msg, path.display()),
                None => write!(f, "{}", msg),
            },
            Self::ParseError { msg } => write!(f, "{}", msg),
            Self::Correction(err) => write!(f, "{}", err),
        }
    }
}

impl From<CorrectionError> for CliError {
    fn from(err: CorrectionError) -> Self {
        Self::Correction(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }
}
