// src/producer.rs - the external process that feeds log lines
use async_trait::async_trait;
use is_terminal::IsTerminal;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::SpawnError;
use crate::format::FormatKind;

/// Byte stream a session reads from
pub type LogInput = Box<dyn AsyncRead + Unpin + Send>;

/// Delay before re-running a failed `wait-for-device`
pub const WAIT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Which device every adb invocation targets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceSelector {
    #[default]
    Any,
    /// `-d`: the only USB device
    Device,
    /// `-e`: the only running emulator
    Emulator,
    /// `-s SERIAL`
    Serial(String),
}

impl DeviceSelector {
    pub fn args(&self) -> Vec<String> {
        match self {
            DeviceSelector::Any => Vec::new(),
            DeviceSelector::Device => vec!["-d".to_string()],
            DeviceSelector::Emulator => vec!["-e".to_string()],
            DeviceSelector::Serial(serial) => vec!["-s".to_string(), serial.clone()],
        }
    }

    pub fn describe(&self) -> Option<&str> {
        match self {
            DeviceSelector::Any => None,
            DeviceSelector::Device => Some("device"),
            DeviceSelector::Emulator => Some("emulator"),
            DeviceSelector::Serial(serial) => Some(serial.as_str()),
        }
    }
}

/// Arguments following `adb [selector] logcat`.
///
/// The format goes first so custom filter specs can't swallow it; filter
/// specs always go last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogcatArgs {
    format: Option<FormatKind>,
    flags: Vec<String>,
    buffers: Vec<String>,
    file: Option<String>,
    max_rotated_logs: Option<u32>,
    rotate_kbytes: Option<u32>,
    filter_specs: Vec<String>,
}

impl LogcatArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: FormatKind) -> Self {
        self.format = Some(format);
        self
    }

    /// Bare logcat switch such as `-c`, `-d`, `-g` or `-s`
    pub fn flag(mut self, flag: &str) -> Self {
        self.flags.push(flag.to_string());
        self
    }

    pub fn buffer(mut self, buffer: &str) -> Self {
        self.buffers.push(buffer.to_string());
        self
    }

    pub fn file(mut self, path: &str) -> Self {
        self.file = Some(path.to_string());
        self
    }

    pub fn max_rotated_logs(mut self, count: u32) -> Self {
        self.max_rotated_logs = Some(count);
        self
    }

    pub fn rotate_kbytes(mut self, kbytes: u32) -> Self {
        self.rotate_kbytes = Some(kbytes);
        self
    }

    pub fn filter_spec(mut self, spec: &str) -> Self {
        self.filter_specs.push(spec.to_string());
        self
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(format) = self.format {
            args.push("-v".to_string());
            args.push(format.name().to_string());
        }
        args.extend(self.flags.iter().cloned());
        for buffer in &self.buffers {
            args.push("-b".to_string());
            args.push(buffer.clone());
        }
        if let Some(file) = &self.file {
            args.push("-f".to_string());
            args.push(file.clone());
        }
        if let Some(count) = self.max_rotated_logs {
            args.push("-n".to_string());
            args.push(count.to_string());
        }
        if let Some(kbytes) = self.rotate_kbytes {
            args.push("-r".to_string());
            args.push(kbytes.to_string());
        }
        args.extend(self.filter_specs.iter().cloned());
        args
    }
}

/// Source of log sessions and of the blocking reconnect wait
#[async_trait]
pub trait Producer: Send {
    /// Launch a new log process and hand back its output
    async fn start(&mut self) -> Result<LogInput, SpawnError>;

    /// Block until the device is reachable again
    async fn wait_for_device(&mut self) -> Result<(), SpawnError>;

    /// Reap whatever `start` launched; called once the session's stream is done
    async fn release(&mut self) {}

    fn device(&self) -> &DeviceSelector;
}

/// Runs `adb logcat` and `adb wait-for-device`
pub struct AdbProducer {
    adb: String,
    device: DeviceSelector,
    logcat: LogcatArgs,
    retry_delay: Duration,
    child: Option<Child>,
}

impl AdbProducer {
    pub fn new(adb: &str, device: DeviceSelector, logcat: LogcatArgs) -> Self {
        Self {
            adb: adb.to_string(),
            device,
            logcat,
            retry_delay: WAIT_RETRY_DELAY,
            child: None,
        }
    }

    /// Full command line for `adb [selector] <tail>`
    pub fn command_line(&self, tail: &[String]) -> Vec<String> {
        let mut line = vec![self.adb.clone()];
        line.extend(self.device.args());
        line.extend(tail.iter().cloned());
        line
    }

    pub fn logcat_command(&self) -> Vec<String> {
        let mut tail = vec!["logcat".to_string()];
        tail.extend(self.logcat.to_args());
        self.command_line(&tail)
    }

    pub fn wait_command(&self) -> Vec<String> {
        self.command_line(&["wait-for-device".to_string()])
    }

    fn command(line: &[String]) -> Command {
        let mut cmd = Command::new(&line[0]);
        cmd.args(&line[1..]);
        cmd
    }

    fn print_waiting_banner(&self) {
        let device = self
            .device
            .describe()
            .map(|d| format!("\"{}\" ", d))
            .unwrap_or_default();
        if std::io::stderr().is_terminal() {
            eprintln!(
                "\x1b[2;37;40m--- Waiting for device\x1b[0m\x1b[2;34;40m {}\x1b[0m\x1b[2;37;40m---\x1b[0m",
                device
            );
        } else {
            eprintln!("--- Waiting for device {}---", device);
        }
    }
}

#[async_trait]
impl Producer for AdbProducer {
    async fn start(&mut self) -> Result<LogInput, SpawnError> {
        self.release().await;

        let line = self.logcat_command();
        debug!(command = %line.join(" "), "starting logcat");
        let mut child = Self::command(&line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpawnError::from_io(&self.adb, e))?;

        let stdout = child.stdout.take().ok_or_else(|| SpawnError::Io {
            source: std::io::Error::new(std::io::ErrorKind::Other, "adb stdout was not captured"),
        })?;
        self.child = Some(child);
        Ok(Box::new(stdout))
    }

    async fn wait_for_device(&mut self) -> Result<(), SpawnError> {
        self.print_waiting_banner();
        let line = self.wait_command();
        loop {
            let status = Self::command(&line)
                .stdin(Stdio::null())
                .status()
                .await
                .map_err(|e| SpawnError::from_io(&self.adb, e))?;
            if status.success() {
                debug!("device available");
                return Ok(());
            }
            warn!(%status, "{} failed, retrying", line.join(" "));
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    async fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            match child.wait().await {
                Ok(status) => debug!(%status, "logcat exited"),
                Err(e) => warn!("could not reap logcat: {}", e),
            }
        }
    }

    fn device(&self) -> &DeviceSelector {
        &self.device
    }
}
