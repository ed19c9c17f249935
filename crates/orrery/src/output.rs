//! Colored terminal output utilities.

use console::{Style, Term};
use orrery_site::BuildReport;

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
}

impl Output {
    /// Create a new output formatter writing to stderr.
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
        }
    }

    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print a highlighted message (cyan bold).
    pub(crate) fn highlight(&self, msg: &str) {
        let _ = self
            .term
            .write_line(&self.cyan_bold.apply_to(msg).to_string());
    }

    /// Print the outcome of one build cycle.
    ///
    /// Documents that failed are listed as warnings; they do not make the
    /// build fail.
    pub(crate) fn report(&self, report: &BuildReport) {
        for failure in &report.failed {
            self.warning(&format!("  skipped {failure}"));
        }
        if report.pages_with_errors > 0 {
            self.warning(&format!(
                "{} page(s) have validation errors, see {}",
                report.pages_with_errors,
                report.manifest_path.display()
            ));
        }
        self.success(&format!(
            "Built {} page(s): {} changed, {} written, {} failed in {:.2?}",
            report.discovered,
            report.changed,
            report.rendered,
            report.failed.len(),
            report.duration
        ));
    }
}
