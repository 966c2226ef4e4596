use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Text captured from a finished or killed process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl Captured {
    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() || self.stdout.ends_with('\n') {
            format!("{}{}", self.stdout, self.stderr)
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

#[derive(Debug)]
pub enum ProcessOutcome {
    Exited { status: ExitStatus, output: Captured },
    TimedOut { output: Captured },
    LaunchFailed(io::Error),
}

/// Kills the whole process group of a child unless it has been reaped.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn kill(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::killpg(self.child.id() as libc::pid_t, libc::SIGKILL);
        }
        #[cfg(not(unix))]
        let _ = self.child.kill();
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }

    /// Non-blocking exit check. Once the child has exited, the rest of its
    /// group is killed before the child is reaped: until then the zombie
    /// pins its pid, so the group id cannot have been handed to another run.
    #[cfg(target_os = "linux")]
    fn poll_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        // SAFETY: all-zero is a valid siginfo_t, and waitid only writes into it.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                self.child.id() as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // si_pid stays zero while the child is still running.
        if unsafe { info.si_pid() } == 0 {
            return Ok(None);
        }
        self.kill();
        self.wait().map(Some)
    }

    /// Without `WNOWAIT` the group cannot be killed safely after the reap,
    /// so descendants are left alone here.
    #[cfg(not(target_os = "linux"))]
    fn poll_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        self.reaped = status.is_some();
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill();
            let _ = self.child.wait();
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Runs `program args..` and kills it, with every process it started, once
/// `timeout` has elapsed. Both output pipes are drained while it runs.
pub fn run_with_timeout(program: &Path, args: &[String], timeout: Duration) -> ProcessOutcome {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let start = Instant::now();
    let mut guard = match command.spawn() {
        Ok(child) => ChildGuard { child, reaped: false },
        Err(e) => return ProcessOutcome::LaunchFailed(e),
    };
    let stdout = drain(guard.child.stdout.take());
    let stderr = drain(guard.child.stderr.take());

    // A timeout too large to add to `start` never expires.
    let deadline = start.checked_add(timeout);
    let exit = loop {
        match guard.poll_exit() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => match deadline {
                Some(deadline) if Instant::now() >= deadline => break None,
                Some(deadline) => thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now()))),
                None => thread::sleep(POLL_INTERVAL),
            },
            Err(e) => return ProcessOutcome::LaunchFailed(e),
        }
    };

    match exit {
        Some(status) => {
            let output = Captured {
                stdout: join(stdout),
                stderr: join(stderr),
                elapsed: start.elapsed(),
            };
            ProcessOutcome::Exited { status, output }
        }
        None => {
            guard.kill();
            let _ = guard.wait();
            let output = Captured {
                stdout: join(stdout),
                stderr: join(stderr),
                elapsed: start.elapsed(),
            };
            ProcessOutcome::TimedOut { output }
        }
    }
}
