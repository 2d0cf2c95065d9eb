use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MAX_LOG_FILE_LEN: u64 = 10 * 1024 * 1024;

/// Where console logs go. The interactive session owns stdout, so it logs to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    Stdout,
    Stderr,
}

pub fn init_logging(log_level: Level, log_file: Option<&str>, console: Console) {
    let level_filter = LevelFilter::from_level(log_level);
    let console_writer = match console {
        Console::Stdout => BoxMakeWriter::new(io::stdout),
        Console::Stderr => BoxMakeWriter::new(io::stderr),
    };
    let console_layer = tracing_subscriber::fmt::layer().with_writer(console_writer);

    let file_layer = log_file.map(|path| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(rotating_file_writer(PathBuf::from(path), MAX_LOG_FILE_LEN))
            .with_filter(level_filter)
    });

    tracing_subscriber::registry()
        .with(console_layer.with_filter(level_filter))
        .with(file_layer)
        .init();
}

fn rotating_file_writer(path: PathBuf, max_len: u64) -> impl Fn() -> RotatingFileWriter {
    let lock = Arc::new(Mutex::new(()));
    move || RotatingFileWriter { path: path.clone(), max_len, lock: lock.clone() }
}

/// Appends to `path`; once the file would grow past `max_len` it is moved to
/// `<path>.1` (replacing any previous backup) and a fresh file is started.
struct RotatingFileWriter {
    path: PathBuf,
    max_len: u64,
    lock: Arc<Mutex<()>>,
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if current > 0 && current + buf.len() as u64 > self.max_len {
            std::fs::rename(&self.path, backup_path(&self.path))?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}
