//! Console rendering of the chat app

use std::io::{self, Write};

use howl_chat::{ChatApp, DownloadProgress};

/// Prints what changed in the app since the last refresh
#[derive(Debug, Default)]
pub struct ConsoleView {
    printed: usize,
    last_status: String,
    last_percent: Option<u64>,
    /// A `\r` progress line is on screen without its newline.
    progress_open: bool,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, app: &ChatApp, out: &mut impl Write) -> io::Result<()> {
        if let Some(percent) = app.progress().as_ref().and_then(whole_percent) {
            if self.last_percent != Some(percent) {
                self.last_percent = Some(percent);
                write!(out, "\r[download] {:>3}%", percent)?;
                self.progress_open = true;
                if percent == 100 {
                    self.close_progress(out)?;
                }
            }
        }

        if app.status() != self.last_status {
            self.close_progress(out)?;
            self.last_status = app.status().to_string();
            writeln!(out, "[status] {}", self.last_status)?;
        }

        let messages = app.transcript().messages();
        if messages.len() < self.printed {
            // Cleared since the last refresh.
            self.printed = 0;
        }
        for message in &messages[self.printed..] {
            self.close_progress(out)?;
            writeln!(out, "{}", message)?;
        }
        self.printed = messages.len();

        out.flush()
    }

    pub fn reprint_status(&mut self, app: &ChatApp, out: &mut impl Write) -> io::Result<()> {
        self.close_progress(out)?;
        writeln!(out, "[status] {} ({:?})", app.status(), app.state())?;
        out.flush()
    }

    pub fn cleared(&mut self, out: &mut impl Write) -> io::Result<()> {
        self.printed = 0;
        self.close_progress(out)?;
        writeln!(out, "--- cleared ---")?;
        out.flush()
    }

    fn close_progress(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.progress_open {
            self.progress_open = false;
            writeln!(out)?;
        }
        Ok(())
    }
}

fn whole_percent(progress: &DownloadProgress) -> Option<u64> {
    progress.percent().map(|p| p.floor() as u64)
}
