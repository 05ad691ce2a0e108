use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

/// Runs an external executable to completion and captures its output.
///
/// Implementations must kill the child and return an
/// [`io::ErrorKind::TimedOut`] error once `timeout` elapses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[OsString], timeout: Duration) -> io::Result<Output>;
}
