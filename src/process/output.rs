//! Background capture of a child's stdout
//!
//! A captured client must never block on a full pipe while the harness is
//! busy writing to it, so its stdout is drained continuously by a
//! dedicated thread and handed back in full once the client exits.

use std::io::{BufRead, BufReader, Read};
use std::thread::{self, JoinHandle};

use crate::errors::{HarnessError, HarnessResult};
use crate::observability::Logger;

/// Lines read from a child's stdout
pub struct OutputCapture {
    label: String,
    handle: JoinHandle<Vec<String>>,
}

impl OutputCapture {
    /// Start draining `reader` on a new thread
    pub fn spawn<R>(reader: R, label: impl Into<String>) -> HarnessResult<Self>
    where
        R: Read + Send + 'static,
    {
        let label = label.into();
        let thread_label = label.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-stdout", label))
            .spawn(move || drain(reader, &thread_label))
            .map_err(|e| HarnessError::io(label.clone(), e))?;

        Ok(Self { label, handle })
    }

    /// Wait for end of stream and return every line read
    ///
    /// Only returns once the writer side is closed, i.e. after the child
    /// exited or was killed.
    pub fn finish(self) -> Vec<String> {
        match self.handle.join() {
            Ok(lines) => lines,
            Err(_) => {
                Logger::error("OUTPUT_CAPTURE_PANICKED", &[("process", &self.label)]);
                Vec::new()
            }
        }
    }
}

fn drain<R: Read>(reader: R, label: &str) -> Vec<String> {
    let mut reader = BufReader::new(reader);
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                lines.push(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(e) => {
                let reason = e.to_string();
                Logger::warn(
                    "OUTPUT_CAPTURE_READ_FAILED",
                    &[("process", label), ("reason", &reason)],
                );
                break;
            }
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_capture_collects_lines() {
        let input = Cursor::new(b"+--------+\n| cnt_id |\r\n| 6 |\nno newline".to_vec());
        let capture = OutputCapture::spawn(input, "client0").unwrap();

        let lines = capture.finish();
        assert_eq!(lines, vec!["+--------+", "| cnt_id |", "| 6 |", "no newline"]);
    }

    #[test]
    fn test_capture_tolerates_invalid_utf8() {
        let input = Cursor::new(vec![0xff, 0xfe, b'\n', b'o', b'k', b'\n']);
        let lines = OutputCapture::spawn(input, "client0").unwrap().finish();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "ok");
    }
}
