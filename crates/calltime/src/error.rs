use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Multiple processes match '{pattern}':\n{matches}\nUse --pid to specify exactly one.")]
    MultipleProcesses { pattern: String, matches: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("No function symbols in {path}. Build without `strip` to keep the symbol table")]
    MissingSymbols { path: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Symbol resolution error: {0}")]
    SymbolResolution(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_ARGUMENTS: i32 = 2;
    pub const PROCESS_NOT_FOUND: i32 = 3;
    pub const PERMISSION_DENIED: i32 = 4;
    pub const MISSING_SYMBOLS: i32 = 5;
    pub const DATABASE_ERROR: i32 = 6;
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ProcessNotFound(_) | Error::MultipleProcesses { .. } => {
                exit_code::PROCESS_NOT_FOUND
            }
            Error::PermissionDenied(_) => exit_code::PERMISSION_DENIED,
            Error::MissingSymbols { .. } => exit_code::MISSING_SYMBOLS,
            Error::Database(_) => exit_code::DATABASE_ERROR,
            Error::InvalidArgument(_) | Error::Config(_) => exit_code::INVALID_ARGUMENTS,
            _ => exit_code::GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            Error::ProcessNotFound("x".into()).exit_code(),
            exit_code::PROCESS_NOT_FOUND
        );
        assert_eq!(
            Error::MissingSymbols { path: "a.out".into() }.exit_code(),
            exit_code::MISSING_SYMBOLS
        );
        assert_eq!(
            Error::InvalidArgument("--sort".into()).exit_code(),
            exit_code::INVALID_ARGUMENTS
        );
        assert_eq!(
            Error::SymbolResolution("bad elf".into()).exit_code(),
            exit_code::GENERAL_ERROR
        );
    }

    #[test]
    fn test_config_error_is_invalid_argument() {
        let err: Error = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
        assert_eq!(err.exit_code(), exit_code::INVALID_ARGUMENTS);
        assert!(err.to_string().starts_with("Invalid config"));
    }
}
