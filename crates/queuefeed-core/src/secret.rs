use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A credential that never prints its value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(<redacted>)")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("invalid env file key {0:?}")]
    InvalidKey(String),

    #[error("value for {key} cannot be stored unquoted: {reason}")]
    InvalidValue { key: String, reason: &'static str },

    #[error("{key} was not supplied and is not set in {}", path.display())]
    Missing { key: String, path: PathBuf },

    #[error("failed to access env file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse env file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Writes `KEY=value` as the only line of the file at `path`, replacing any
/// previous contents. On Unix the file is readable by its owner only.
pub fn write_env_file(path: &Path, key: &str, secret: &SecretString) -> Result<(), SecretError> {
    validate_key(key)?;
    validate_value(key, secret.expose())?;

    let io_err = |source| SecretError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(io_err)?;
    writeln!(file, "{key}={}", secret.expose()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;

    // mode() only applies when the file is created
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
    }

    Ok(())
}

/// Reads one key from an env file without touching the process environment.
pub fn read_env_key(path: &Path, key: &str) -> Result<SecretString, SecretError> {
    let entries = dotenvy::from_path_iter(path).map_err(|err| env_file_error(path, key, err))?;

    for entry in entries {
        let (name, value) = entry.map_err(|err| env_file_error(path, key, err))?;
        if name == key && !value.is_empty() {
            return Ok(SecretString::new(value));
        }
    }

    Err(SecretError::Missing {
        key: key.to_string(),
        path: path.to_path_buf(),
    })
}

fn env_file_error(path: &Path, key: &str, err: dotenvy::Error) -> SecretError {
    match err {
        dotenvy::Error::Io(source) if source.kind() == io::ErrorKind::NotFound => {
            SecretError::Missing {
                key: key.to_string(),
                path: path.to_path_buf(),
            }
        }
        dotenvy::Error::Io(source) => SecretError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => SecretError::Parse {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}

fn validate_key(key: &str) -> Result<(), SecretError> {
    let mut chars = key.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SecretError::InvalidKey(key.to_string()))
    }
}

fn validate_value(key: &str, value: &str) -> Result<(), SecretError> {
    let invalid = |reason| {
        Err(SecretError::InvalidValue {
            key: key.to_string(),
            reason,
        })
    };

    if value.is_empty() {
        return invalid("value is empty");
    }
    if value.chars().any(|c| c.is_control()) {
        return invalid("contains a control character");
    }
    if value.chars().any(char::is_whitespace) {
        return invalid("contains whitespace");
    }
    if value.chars().any(|c| matches!(c, '\'' | '"' | '`' | '#' | '$' | '\\')) {
        return invalid("contains a quote, '#', '$' or '\\'");
    }
    Ok(())
}
