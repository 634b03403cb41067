//! Progress bars for long tracking runs, with log lines printed above them.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

const ITEM_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// A bar counting `len` content items
pub fn add_progress_bar(len: u64) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template(ITEM_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    multi_progress().add(ProgressBar::new(len).with_style(style))
}

fn emit(line: &str) {
    let _ = multi_progress().println(line.trim_end_matches('\r'));
}

/// `tracing` writer that routes each log line through the progress display
#[derive(Default, Clone)]
pub struct LogWriterFactory;

pub struct LogWriter {
    pending: String,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));

        while let Some(idx) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=idx).collect();
            emit(line.trim_end_matches('\n'));
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            emit(&line);
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            pending: String::new(),
        }
    }
}
