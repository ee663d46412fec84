use std::sync::Arc;
use std::time::Duration;

use ak_core::types::Point;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::command::{CommandOutput, CommandRunner, SystemRunner};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

// ---------------------------------------------------------------------------
// InputDevice trait
// ---------------------------------------------------------------------------

/// Input and observation capability of one controlled device.
///
/// Every method fails closed: a transport error is reported as `false` or
/// `None` and the cause is logged by the implementation. Callers treat that
/// as an ordinary, retryable failure.
pub trait InputDevice: Send + Sync {
    /// Tap at `(x, y)` and then wait `post_delay` for the UI to settle.
    fn click(&self, x: i32, y: i32, post_delay: Duration) -> bool;

    fn swipe(&self, from: Point, to: Point, duration: Duration) -> bool;

    /// Send the platform back / escape signal.
    fn send_dismiss(&self) -> bool;

    fn capture(&self) -> Option<Screenshot>;
}

/// One captured frame, PNG encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    png: Vec<u8>,
}

impl Screenshot {
    /// Wrap PNG bytes, rejecting anything without a PNG signature.
    pub fn from_png(png: Vec<u8>) -> Result<Self, DeviceError> {
        if png.is_empty() {
            return Err(DeviceError::EmptyCapture);
        }
        if !png.starts_with(PNG_SIGNATURE) {
            return Err(DeviceError::InvalidImage);
        }
        Ok(Self { png })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn len(&self) -> usize {
        self.png.len()
    }

    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to run adb: {0}")]
    Spawn(String),
    #[error("adb {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("adb connect to {serial} refused: {output}")]
    ConnectRefused { serial: String, output: String },
    #[error("screen capture returned no data")]
    EmptyCapture,
    #[error("screen capture is not a PNG image")]
    InvalidImage,
}

// ---------------------------------------------------------------------------
// AdbDevice
// ---------------------------------------------------------------------------

/// Android device or emulator driven through the `adb` CLI.
pub struct AdbDevice {
    adb_path: String,
    serial: String,
    runner: Arc<dyn CommandRunner>,
    cancel: CancelToken,
}

impl AdbDevice {
    pub fn new(adb_path: impl Into<String>, serial: impl Into<String>) -> Self {
        Self::with_runner(adb_path, serial, Arc::new(SystemRunner))
    }

    /// Use a custom command runner (for testing).
    pub fn with_runner(
        adb_path: impl Into<String>,
        serial: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial: serial.into(),
            runner,
            cancel: CancelToken::new(),
        }
    }

    /// Make post-click delays end early when `cancel` is stopped.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    fn adb(&self, args: &[&str]) -> Result<CommandOutput, DeviceError> {
        let mut full = vec!["-s", self.serial.as_str()];
        full.extend_from_slice(args);
        debug!(serial = %self.serial, args = ?args, "adb");
        let output = self
            .runner
            .run(&self.adb_path, &full, None)
            .map_err(DeviceError::Spawn)?;
        if !output.success {
            return Err(DeviceError::CommandFailed {
                command: args.join(" "),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    fn shell(&self, args: &[&str]) -> Result<(), DeviceError> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        self.adb(&full).map(|_| ())
    }

    /// `adb connect` for network serials (`host:port`). Local serials such as
    /// `emulator-5554` need no connect step.
    pub fn connect(&self) -> Result<(), DeviceError> {
        if !self.serial.contains(':') {
            return Ok(());
        }
        let output = self
            .runner
            .run(&self.adb_path, &["connect", self.serial.as_str()], None)
            .map_err(DeviceError::Spawn)?;
        let text = output.stdout_lossy();
        if output.success && text.contains("connected") && !text.contains("unable") {
            info!(serial = %self.serial, "adb connected");
            Ok(())
        } else {
            Err(DeviceError::ConnectRefused {
                serial: self.serial.clone(),
                output: format!("{} {}", text.trim(), output.stderr.trim()).trim().to_string(),
            })
        }
    }

    pub fn start_app(&self, package: &str, activity: &str) -> Result<(), DeviceError> {
        let component = format!("{package}/{activity}");
        self.shell(&["am", "start", "-n", component.as_str()])?;
        info!(serial = %self.serial, package, "app started");
        Ok(())
    }

    pub fn force_stop_app(&self, package: &str) -> Result<(), DeviceError> {
        self.shell(&["am", "force-stop", package])?;
        info!(serial = %self.serial, package, "app force-stopped");
        Ok(())
    }

    fn try_capture(&self) -> Result<Screenshot, DeviceError> {
        let output = self.adb(&["exec-out", "screencap", "-p"])?;
        Screenshot::from_png(output.stdout)
    }
}

impl InputDevice for AdbDevice {
    fn click(&self, x: i32, y: i32, post_delay: Duration) -> bool {
        let (xs, ys) = (x.to_string(), y.to_string());
        match self.shell(&["input", "tap", xs.as_str(), ys.as_str()]) {
            Ok(()) => {
                self.cancel.sleep(post_delay);
                true
            }
            Err(e) => {
                warn!(serial = %self.serial, x, y, error = %e, "click failed");
                false
            }
        }
    }

    fn swipe(&self, from: Point, to: Point, duration: Duration) -> bool {
        let args = [
            from.x.to_string(),
            from.y.to_string(),
            to.x.to_string(),
            to.y.to_string(),
            duration.as_millis().to_string(),
        ];
        let mut full = vec!["input", "swipe"];
        full.extend(args.iter().map(String::as_str));
        match self.shell(&full) {
            Ok(()) => true,
            Err(e) => {
                warn!(serial = %self.serial, error = %e, "swipe failed");
                false
            }
        }
    }

    fn send_dismiss(&self) -> bool {
        match self.shell(&["input", "keyevent", "4"]) {
            Ok(()) => true,
            Err(e) => {
                warn!(serial = %self.serial, error = %e, "dismiss failed");
                false
            }
        }
    }

    fn capture(&self) -> Option<Screenshot> {
        match self.try_capture() {
            Ok(shot) => Some(shot),
            Err(e) => {
                warn!(serial = %self.serial, error = %e, "capture failed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every invocation and answers from a fixed script.
    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<Vec<String>>>,
        fail: bool,
        stdout: Vec<u8>,
    }

    impl RecordingRunner {
        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, program: &str, args: &[&str], _stdin: Option<&[u8]>) -> Result<CommandOutput, String> {
            let mut call = vec![program.to_string()];
            call.extend(args.iter().map(|a| a.to_string()));
            self.calls.lock().unwrap().push(call);
            Ok(CommandOutput {
                success: !self.fail,
                stdout: self.stdout.clone(),
                stderr: if self.fail { "device offline".into() } else { String::new() },
            })
        }
    }

    fn device(runner: Arc<RecordingRunner>) -> AdbDevice {
        AdbDevice::with_runner("adb", "127.0.0.1:5555", runner)
    }

    #[test]
    fn click_issues_input_tap() {
        let runner = Arc::new(RecordingRunner::default());
        assert!(device(runner.clone()).click(10, 20, Duration::ZERO));
        assert_eq!(
            runner.calls()[0],
            ["adb", "-s", "127.0.0.1:5555", "shell", "input", "tap", "10", "20"]
        );
    }

    #[test]
    fn swipe_and_dismiss_commands() {
        let runner = Arc::new(RecordingRunner::default());
        let dev = device(runner.clone());
        assert!(dev.swipe(Point::new(1, 2), Point::new(3, 4), Duration::from_millis(500)));
        assert!(dev.send_dismiss());
        let calls = runner.calls();
        assert_eq!(calls[0][3..], ["shell", "input", "swipe", "1", "2", "3", "4", "500"]);
        assert_eq!(calls[1][3..], ["shell", "input", "keyevent", "4"]);
    }

    #[test]
    fn transport_errors_fail_closed() {
        let runner = Arc::new(RecordingRunner {
            fail: true,
            ..Default::default()
        });
        let dev = device(runner);
        assert!(!dev.click(1, 1, Duration::ZERO));
        assert!(!dev.send_dismiss());
        assert!(dev.capture().is_none());
    }

    #[test]
    fn capture_requires_png() {
        let runner = Arc::new(RecordingRunner {
            stdout: b"not an image".to_vec(),
            ..Default::default()
        });
        assert!(device(runner).capture().is_none());

        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(&[0, 1, 2]);
        let runner = Arc::new(RecordingRunner {
            stdout: png.clone(),
            ..Default::default()
        });
        let shot = device(runner).capture().expect("capture");
        assert_eq!(shot.as_bytes(), png.as_slice());
    }

    #[test]
    fn connect_checks_output() {
        let runner = Arc::new(RecordingRunner {
            stdout: b"already connected to 127.0.0.1:5555".to_vec(),
            ..Default::default()
        });
        assert!(device(runner).connect().is_ok());

        let runner = Arc::new(RecordingRunner {
            stdout: b"failed to connect to 127.0.0.1:5555".to_vec(),
            ..Default::default()
        });
        assert!(matches!(
            device(runner).connect(),
            Err(DeviceError::ConnectRefused { .. })
        ));
    }

    #[test]
    fn local_serial_skips_connect() {
        let runner = Arc::new(RecordingRunner::default());
        let dev = AdbDevice::with_runner("adb", "emulator-5554", runner.clone());
        assert!(dev.connect().is_ok());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn app_lifecycle_commands() {
        let runner = Arc::new(RecordingRunner::default());
        let dev = device(runner.clone());
        dev.start_app("com.example", ".Main").unwrap();
        dev.force_stop_app("com.example").unwrap();
        let calls = runner.calls();
        assert_eq!(calls[0][3..], ["shell", "am", "start", "-n", "com.example/.Main"]);
        assert_eq!(calls[1][3..], ["shell", "am", "force-stop", "com.example"]);
    }
}
