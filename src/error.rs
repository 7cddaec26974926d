use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Render error in {layout} layout at line {line}: {message}")]
    RenderError {
        layout: String,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProcessingError {
    /// The output sink went away (e.g. `logcat-color | head`)
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, ProcessingError::IoError(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Input file does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Unknown format '{0}' (possible formats: brief, process, tag, raw, time, threadtime, long)")]
    UnknownFormat(String),

    #[error("Invalid config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid filter pattern '{pattern}' in profile '{profile}': {source}")]
    InvalidPattern {
        profile: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("IO error reading '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error(
        "Error, adb could not be found using: \"{program}\"\n\
         To fix this: \n  \
         1) Add the directory containing adb to your PATH\n  \
         2) Set the ADB environment variable\n  \
         3) Set \"adb\" in ~/.logcat-color.yaml"
    )]
    NotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not run ADB: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    pub fn from_io(program: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            SpawnError::NotFound {
                program: program.to_string(),
                source: err,
            }
        } else {
            SpawnError::Io { source: err }
        }
    }

    /// Process exit code mirroring the underlying OS error
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            SpawnError::NotFound { source, .. } | SpawnError::Io { source } => source.raw_os_error(),
        };
        match code {
            Some(c) if c != 0 => c,
            _ => 1,
        }
    }
}

/// Anything that ends a session loop early
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl SessionError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Spawn(e) => e.exit_code(),
            SessionError::Processing(_) => 1,
        }
    }
}
