//! External command execution with a hard deadline.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Run `program` with `args`, killing it if it outlives `timeout`.
///
/// Returns trimmed stdout only for a successful exit with non-empty output.
/// Every failure mode (missing binary, nonzero exit, timeout) collapses to `None`.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    log::debug!("Running command: {} {:?}", program, args);

    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            log::debug!("Failed to spawn {}: {}", program, e);
            return None;
        }
    };

    // Drain stdout on a separate thread so a chatty child cannot block on a full pipe
    let mut stdout = child.stdout.take()?;
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let output = reader.join().ok()?;
                if !status.success() {
                    log::debug!("{} exited with {}", program, status);
                    return None;
                }

                let text = String::from_utf8_lossy(&output).trim().to_string();
                return if text.is_empty() { None } else { Some(text) };
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    log::debug!("{} timed out after {:?}", program, timeout);
                    return None;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log::debug!("Failed to wait for {}: {}", program, e);
                let _ = child.kill();
                return None;
            }
        }
    }
}
