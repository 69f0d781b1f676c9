use std::{
    io::{self, BufReader, Read},
    process::Child,
    thread,
};

/// Iterates over the records a child process writes to its output stream.
///
/// Progress-reporting tools like rsync redraw a status line by ending each
/// update with a carriage return instead of a newline, so records are split
/// on either. Empty records are skipped and the stream is drained to the
/// end, which also keeps the child from blocking on a full pipe.
pub struct ProgressRecords<R: Read> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: Read> ProgressRecords<R> {
    pub fn new(reader: R) -> Self { ProgressRecords { reader, buffer: Vec::new() } }
}

impl<R: Read> Iterator for ProgressRecords<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<io::Result<String>> {
        let mut byte = [0u8];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => {
                    if self.buffer.is_empty() {
                        return None;
                    }
                    let record = String::from_utf8_lossy(&self.buffer).into_owned();
                    self.buffer.clear();
                    return Some(Ok(record));
                }
                Ok(_) => match byte[0] {
                    b'\r' | b'\n' => {
                        if self.buffer.is_empty() {
                            continue;
                        }
                        let record = String::from_utf8_lossy(&self.buffer).into_owned();
                        self.buffer.clear();
                        return Some(Ok(record));
                    }
                    other => self.buffer.push(other),
                },
                Err(why) => return Some(Err(why)),
            }
        }
    }
}

/// Reads a child's progress records, draining its stderr on a separate
/// thread in the meantime. A tool that writes more warnings than the stderr
/// pipe holds would otherwise block and never close its stdout. Returns
/// everything the child wrote to stderr; the caller still waits on the child.
pub fn watch_child(child: &mut Child, mut on_record: impl FnMut(&str)) -> io::Result<String> {
    let stdout = child.stdout.take().expect("stdout not obtained");
    let stderr = child.stderr.take().expect("stderr not obtained");

    let drain = thread::spawn(move || {
        let mut collected = String::new();
        let _ = BufReader::new(stderr).read_to_string(&mut collected);
        collected
    });

    for record in ProgressRecords::new(BufReader::new(stdout)) {
        on_record(&record?);
    }

    Ok(drain.join().unwrap_or_default())
}

/// Fraction complete from an `rsync --info=progress2` status record, where
/// the second field reads like `42%`.
pub fn rsync_progress(record: &str) -> Option<f64> {
    let mut fields = record.split_whitespace();
    fields.next()?;
    let percent = fields.next()?;
    if !percent.ends_with('%') {
        return None;
    }

    percent.trim_end_matches('%').parse::<f64>().ok().map(|value| value / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::process::{Command, Stdio};

    #[test]
    fn records_split_on_carriage_returns() {
        let stream = Cursor::new(b"  1,048,576  10%  4.21MB/s\r  2,097,152  20%  4.40MB/s\r\ndone\n".to_vec());
        let records: Vec<String> = ProgressRecords::new(stream).map(|r| r.unwrap()).collect();
        assert_eq!(records, vec![
            "  1,048,576  10%  4.21MB/s".to_string(),
            "  2,097,152  20%  4.40MB/s".to_string(),
            "done".to_string(),
        ]);
    }

    #[test]
    fn unterminated_final_record_still_arrives() {
        let stream = Cursor::new(b"a\rtail".to_vec());
        let records: Vec<String> = ProgressRecords::new(stream).map(|r| r.unwrap()).collect();
        assert_eq!(records, vec!["a".to_string(), "tail".to_string()]);
    }

    #[test]
    fn noisy_stderr_never_stalls_a_watched_child() {
        // A megabyte of stderr far exceeds the pipe buffer, so this only
        // finishes if stderr is drained while stdout is being read.
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(
                "head -c 1048576 /dev/zero | tr '\\0' e >&2; \
                 printf '%s\\r' '  524,288  50%  4.21MB/s'; \
                 printf '%s\\n' done",
            )
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let mut records = Vec::new();
        let stderr = watch_child(&mut child, |record| records.push(record.to_owned())).unwrap();

        assert!(child.wait().unwrap().success());
        assert_eq!(stderr.len(), 1024 * 1024);
        assert_eq!(records, vec!["  524,288  50%  4.21MB/s", "done"]);
    }

    #[test]
    fn progress_comes_from_the_percent_field() {
        assert_eq!(rsync_progress("  1,048,576  10%  4.21MB/s  0:00:04"), Some(0.10));
        assert_eq!(rsync_progress("  3,145,728 100%  4.21MB/s  0:00:04 (xfr#1, to-chk=0/4)"), Some(1.0));
        assert_eq!(rsync_progress("sending incremental file list"), None);
        assert_eq!(rsync_progress(""), None);
    }
}
