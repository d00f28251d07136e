//! Output streams for report lines and diagnostics
//!
//! Report lines, cycle summaries and between-cycle status go to the primary
//! stream. Classifier disagreements go to the diagnostic stream so they never
//! mix with lines scripts may grep for.

use console::Term;
use std::io;

pub trait ReportSink: Send {
    /// Write one line to the primary stream
    fn line(&mut self, line: &str) -> io::Result<()>;

    /// Write one line to the diagnostic stream
    fn diagnostic(&mut self, line: &str) -> io::Result<()>;
}

/// Primary stream on stdout, diagnostics on stderr
pub struct TerminalSink {
    out: Term,
    err: Term,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSink for TerminalSink {
    fn line(&mut self, line: &str) -> io::Result<()> {
        self.out.write_line(line)
    }

    fn diagnostic(&mut self, line: &str) -> io::Result<()> {
        self.err
            .write_line(&console::style(line).yellow().for_stderr().to_string())
    }
}

/// Collects everything in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub lines: Vec<String>,
    pub diagnostics: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for MemorySink {
    fn line(&mut self, line: &str) -> io::Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn diagnostic(&mut self, line: &str) -> io::Result<()> {
        self.diagnostics.push(line.to_string());
        Ok(())
    }
}
