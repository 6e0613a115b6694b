//! Non-blocking access to a child's output pipes.
//!
//! The runner needs three things from the host: a bounded wait for output,
//! a read that never blocks, and a way to tell when the writer side closed.
//! On Unix this is `O_NONBLOCK` plus `poll(2)`. Elsewhere a reader thread per
//! stream feeds a channel and `recv_timeout` stands in for `poll`.

use std::io::{self, Read};
use std::process::{ChildStderr, ChildStdout};
use std::time::Duration;

/// Default buffer size for reading pipe output.
const READ_BUFFER_SIZE: usize = 4096;

/// Upper bound on bytes taken from one stream per drain call, so a child that
/// writes without pause cannot keep the runner away from its clock.
const MAX_DRAIN_BYTES: usize = 1 << 20;

/// Read what is currently buffered in a non-blocking stream.
///
/// Returns `true` once the write side has been closed.
fn drain<R: Read>(reader: &mut R, sink: &mut Vec<u8>) -> io::Result<bool> {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut taken = 0;

    while taken < MAX_DRAIN_BYTES {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(true),
            Ok(n) => {
                sink.extend_from_slice(&buf[..n]);
                taken += n;
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(false)
}

#[cfg(unix)]
mod imp {
    use std::os::fd::{AsRawFd, RawFd};

    use super::*;

    fn set_nonblocking(fd: RawFd) -> io::Result<()> {
        // SAFETY: `fd` belongs to a pipe owned by the caller for the whole call.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: as above.
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Milliseconds for `poll`, rounded up so a sub-millisecond budget still waits.
    fn poll_millis(timeout: Duration) -> libc::c_int {
        let millis = timeout.as_micros().div_ceil(1000);
        millis.min(libc::c_int::MAX as u128) as libc::c_int
    }

    pub(crate) struct OutputStreams {
        stdout: ChildStdout,
        stderr: ChildStderr,
        stdout_closed: bool,
        stderr_closed: bool,
    }

    impl OutputStreams {
        pub(crate) fn new(stdout: ChildStdout, stderr: ChildStderr) -> io::Result<Self> {
            set_nonblocking(stdout.as_raw_fd())?;
            set_nonblocking(stderr.as_raw_fd())?;
            Ok(Self {
                stdout,
                stderr,
                stdout_closed: false,
                stderr_closed: false,
            })
        }

        /// Block until either stream is readable or `timeout` elapses.
        pub(crate) fn wait(&mut self, timeout: Duration) -> io::Result<()> {
            let mut fds: Vec<libc::pollfd> = [
                (self.stdout_closed, self.stdout.as_raw_fd()),
                (self.stderr_closed, self.stderr.as_raw_fd()),
            ]
            .into_iter()
            .filter(|(closed, _)| !closed)
            .map(|(_, fd)| libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

            if fds.is_empty() {
                std::thread::sleep(timeout);
                return Ok(());
            }

            // SAFETY: `fds` is a valid, exclusively borrowed array of `fds.len()` entries.
            let rc = unsafe {
                libc::poll(
                    fds.as_mut_ptr(),
                    fds.len() as libc::nfds_t,
                    poll_millis(timeout),
                )
            };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
            Ok(())
        }

        pub(crate) fn drain_stdout(&mut self, sink: &mut Vec<u8>) -> io::Result<()> {
            if !self.stdout_closed {
                self.stdout_closed = drain(&mut self.stdout, sink)?;
            }
            Ok(())
        }

        pub(crate) fn drain_stderr(&mut self, sink: &mut Vec<u8>) -> io::Result<()> {
            if !self.stderr_closed {
                self.stderr_closed = drain(&mut self.stderr, sink)?;
            }
            Ok(())
        }
    }

}

#[cfg(not(unix))]
mod imp {
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Source {
        Stdout,
        Stderr,
    }

    /// `None` marks end of stream.
    type Chunk = (Source, Option<Vec<u8>>);

    fn spawn_reader<R: Read + Send + 'static>(mut reader: R, source: Source, tx: Sender<Chunk>) {
        std::thread::spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send((source, Some(buf[..n].to_vec()))).is_err() {
                            return;
                        }
                    }
                }
            }
            let _ = tx.send((source, None));
        });
    }

    pub(crate) struct OutputStreams {
        rx: Receiver<Chunk>,
        pending_stdout: Vec<u8>,
        pending_stderr: Vec<u8>,
        open: usize,
    }

    impl OutputStreams {
        pub(crate) fn new(stdout: ChildStdout, stderr: ChildStderr) -> io::Result<Self> {
            let (tx, rx) = mpsc::channel();
            spawn_reader(stdout, Source::Stdout, tx.clone());
            spawn_reader(stderr, Source::Stderr, tx);
            Ok(Self {
                rx,
                pending_stdout: Vec::new(),
                pending_stderr: Vec::new(),
                open: 2,
            })
        }

        fn route(&mut self, (source, data): Chunk) {
            match (source, data) {
                (Source::Stdout, Some(data)) => self.pending_stdout.extend_from_slice(&data),
                (Source::Stderr, Some(data)) => self.pending_stderr.extend_from_slice(&data),
                (_, None) => self.open = self.open.saturating_sub(1),
            }
        }

        fn collect(&mut self) {
            let mut taken = 0;
            while taken < MAX_DRAIN_BYTES {
                match self.rx.try_recv() {
                    Ok(chunk) => {
                        taken += chunk.1.as_ref().map_or(0, Vec::len);
                        self.route(chunk);
                    }
                    Err(_) => break,
                }
            }
        }

        pub(crate) fn wait(&mut self, timeout: Duration) -> io::Result<()> {
            if self.open == 0 {
                std::thread::sleep(timeout);
                return Ok(());
            }
            match self.rx.recv_timeout(timeout) {
                Ok(chunk) => self.route(chunk),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.open = 0,
            }
            Ok(())
        }

        pub(crate) fn drain_stdout(&mut self, sink: &mut Vec<u8>) -> io::Result<()> {
            self.collect();
            sink.append(&mut self.pending_stdout);
            Ok(())
        }

        pub(crate) fn drain_stderr(&mut self, sink: &mut Vec<u8>) -> io::Result<()> {
            self.collect();
            sink.append(&mut self.pending_stderr);
            Ok(())
        }
    }
}

pub(crate) use imp::OutputStreams;
