//! Output formatting and terminal rendering

use colored::Colorize;
use meshplan::{Diagnostic, InvariantViolation, LinkRole, PlanSummary, PushPlan};

/// Output handler for terminal display
pub struct OutputHandler {
    pub show_links: bool,
}

impl OutputHandler {
    pub fn new(show_links: bool) -> Self {
        Self { show_links }
    }

    /// Print a section header
    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", format!("▶ {}", text).bright_yellow().bold());
        println!("{}", "─".repeat(60).dimmed());
    }

    /// Print a success message
    pub fn print_success(&self, text: &str) {
        println!("{} {}", "✓".bright_green(), text.bright_white());
    }

    /// Print an error message
    pub fn print_error(&self, text: &str) {
        eprintln!("{} {}", "✗".bright_red(), text.bright_red());
    }

    /// Print a warning message
    pub fn print_warning(&self, text: &str) {
        println!("{} {}", "⚠".bright_yellow(), text.yellow());
    }

    /// Print an info message
    pub fn print_info(&self, text: &str) {
        println!("{} {}", "ℹ".bright_blue(), text);
    }

    pub fn print_summary(&self, summary: &PlanSummary) {
        self.print_header("Plan");

        println!("  {:<16} {}", "Devices:".dimmed(), summary.devices);
        println!("  {:<16} {}", "Radios:".dimmed(), summary.modules);
        println!(
            "  {:<16} {}",
            "Primary links:".dimmed(),
            summary.primary_links.to_string().bright_green()
        );
        println!(
            "  {:<16} {}",
            "Backup links:".dimmed(),
            summary.backup_links.to_string().bright_cyan()
        );
        println!("  {:<16} {}", "Seed:".dimmed(), summary.seed);

        println!();
        println!("  {}", "Channel groups".bright_white());
        for usage in &summary.channel_usage {
            let bar = "█".repeat(usage.groups);
            println!(
                "  {:>5}  {:<3} {}",
                usage.channel.to_string().bright_white(),
                usage.groups,
                bar.bright_blue()
            );
        }
    }

    pub fn print_links(&self, push: &PushPlan) {
        if !self.show_links {
            return;
        }

        self.print_header("Links");
        println!(
            "  {:<6} {:<8} {:<4} {:<30} {:<30}",
            "Prio".dimmed(),
            "Role".dimmed(),
            "Ch".dimmed(),
            "From".dimmed(),
            "To".dimmed()
        );

        for link in &push.links {
            let role = match link.role {
                LinkRole::Primary => "primary".bright_green(),
                LinkRole::Backup => "backup".bright_cyan(),
            };
            println!(
                "  {:<6} {:<8} {:<4} {:<30} {:<30}",
                link.priority,
                role,
                link.channel.to_string(),
                format!("{} {}", link.source.device_name, link.source.interface_name),
                format!("{} {}", link.dest.device_name, link.dest.interface_name),
            );
        }
    }

    pub fn print_diagnostics(&self, diagnostics: &[Diagnostic], notices: &[InvariantViolation]) {
        if diagnostics.is_empty() && notices.is_empty() {
            return;
        }

        self.print_header("Diagnostics");
        for diagnostic in diagnostics {
            match diagnostic {
                Diagnostic::BackupNotFound { .. } => self.print_warning(&diagnostic.to_string()),
                _ => self.print_info(&diagnostic.to_string()),
            }
        }
        for notice in notices {
            self.print_info(&notice.message);
        }
    }
}
