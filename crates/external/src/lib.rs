//! A collection of external commands used throughout the program.
//!
//! Every failure carries the tool's combined stdout + stderr, so callers can
//! surface a useful diagnostic without re-running anything.

extern crate disk_types;
#[macro_use]
extern crate log;

pub mod block;
pub mod gdisk;
pub mod lvm;
pub mod sfdisk;

pub use self::{block::*, gdisk::*, lvm::*, sfdisk::*};

use std::{
    ffi::OsString,
    io::{self, Write},
    process::{Command, Stdio},
};

/// A generic function for executing a variety of external commands.
pub fn exec(
    cmd: &str,
    stdin: Option<&[u8]>,
    valid_codes: Option<&'static [i32]>,
    args: &[OsString],
) -> io::Result<()> {
    exec_with_output(cmd, stdin, valid_codes, args).map(|_| ())
}

/// As `exec`, but hands the combined output back to the caller for parsing.
pub fn exec_with_output(
    cmd: &str,
    stdin: Option<&[u8]>,
    valid_codes: Option<&'static [i32]>,
    args: &[OsString],
) -> io::Result<String> {
    info!("executing {} with {:?}", cmd, args);

    let mut child = Command::new(cmd)
        .args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(stdin) = stdin {
        child.stdin.as_mut().expect("stdin not obtained").write_all(stdin)?;
    }

    let output = child.wait_with_output()?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    let status = output.status;
    let success = status.success()
        || valid_codes
            .map_or(false, |codes| status.code().map_or(false, |code| codes.contains(&code)));

    if success {
        Ok(combined)
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!(
                "{} failed with status {}: {}",
                cmd,
                match status.code() {
                    Some(code) => format!("{}", code),
                    None => "unknown".into(),
                },
                combined.trim()
            ),
        ))
    }
}
