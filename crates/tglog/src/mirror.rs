//! Local copy of everything written to the sink.
//!
//! Mirrors every write to a file (truncated when the sink starts) and
//! optionally to stdout, before filtering and regardless of delivery.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub struct LocalMirror {
    file: Option<Mutex<BufWriter<File>>>,
    echo_stdout: bool,
}

impl LocalMirror {
    pub fn open(path: Option<&Path>, echo_stdout: bool) -> io::Result<Self> {
        let file = match path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(path)?;
                Some(Mutex::new(BufWriter::with_capacity(8192, file)))
            }
            None => None,
        };

        Ok(Self { file, echo_stdout })
    }

    #[cfg(test)]
    fn disabled() -> Self {
        Self {
            file: None,
            echo_stdout: false,
        }
    }

    pub fn write(&self, buf: &[u8]) -> io::Result<()> {
        if let Some(file) = &self.file {
            let mut guard = file.lock();
            guard.write_all(buf)?;
            // Flushed per write so the file can be tailed
            guard.flush()?;
        }
        if self.echo_stdout {
            let mut stdout = io::stdout().lock();
            stdout.write_all(buf)?;
            stdout.flush()?;
        }
        Ok(())
    }

    pub fn flush(&self) -> io::Result<()> {
        match &self.file {
            Some(file) => file.lock().flush(),
            None => Ok(()),
        }
    }
}
