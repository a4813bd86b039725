//! Print queue gateway
//!
//! Thin wrappers over the CUPS command line tools (`lpstat`, `lp`,
//! `cancel`) with line-oriented parsing of their text output. Queries are
//! best-effort: a sluggish or absent spooler turns into empty results, not
//! hard failures. Mutations (`submit`, `cancel`) validate caller input
//! before any process is spawned.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::command::{CmdResult, run_cmd};
use crate::error::{PalError, PalResult};

/// Printer configuration files consulted for display labels, in priority
/// order. The first file yielding any label wins.
const PRINTERS_CONF_PATHS: &[&str] = &["/etc/cups/printers.conf", "/etc/cups/printers.conf.O"];

/// CUPS on small boards can be sluggish; keep query timeouts modest.
const QUERY_TIMEOUT: Duration = Duration::from_secs(6);

/// One printer as reported by the scheduler.
///
/// Rebuilt on every query, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrinterInfo {
    pub name: String,
    /// idle | disabled | busy
    pub state: String,
    pub is_default: bool,
    /// None when `lpstat -a` did not mention the printer
    pub accepting: Option<bool>,
    /// Human label from printers.conf, if any
    pub display_name: Option<String>,
}

/// Read-only snapshot of one queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub job_id: String,
    pub user: String,
    pub size: String,
    pub raw: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    pub completed_jobs: usize,
    pub active_jobs: usize,
    pub last_completed_raw: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub cups_scheduler_running: bool,
    pub raw: String,
}

/// Probe whether the print subsystem responds at all.
pub async fn cups_available() -> bool {
    run_cmd(&["lpstat", "-r"], QUERY_TIMEOUT, false).await.is_ok()
}

/// Name of the system default destination, empty when unset.
pub async fn default_printer() -> String {
    match run_cmd(&["lpstat", "-d"], QUERY_TIMEOUT, false).await {
        // Example: "system default destination: HP_LaserJet"
        Ok(res) => parse_default_destination(&res.stdout),
        Err(_) => String::new(),
    }
}

fn parse_default_destination(stdout: &str) -> String {
    for line in stdout.lines() {
        if let Some(rest) = line.split("destination:").nth(1) {
            if let Some(name) = rest.split_whitespace().next() {
                return name.to_string();
            }
        }
    }
    String::new()
}

/// Parse `Info` labels per printer block out of printers.conf content.
fn parse_printers_conf(content: &str) -> HashMap<String, String> {
    let mut info_map = HashMap::new();
    let mut current: Option<String> = None;
    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("<Printer ") {
            if let Some(name) = rest.strip_suffix('>') {
                current = Some(name.trim().to_string());
            }
            continue;
        }
        if line.starts_with("</Printer>") {
            current = None;
            continue;
        }
        if let Some(printer) = &current {
            if let Some(label) = line.strip_prefix("Info ") {
                let label = label.trim().trim_matches('"');
                if !label.is_empty() {
                    info_map.insert(printer.clone(), label.to_string());
                }
            }
        }
    }
    info_map
}

fn load_printer_info_labels() -> HashMap<String, String> {
    for path in PRINTERS_CONF_PATHS {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let map = parse_printers_conf(&content);
                if !map.is_empty() {
                    return map;
                }
            }
            Err(_) => continue,
        }
    }
    HashMap::new()
}

/// Human label for the default printer, falling back to the raw name.
pub async fn default_printer_display() -> String {
    let default = default_printer().await;
    if default.is_empty() {
        return String::new();
    }
    let labels = load_printer_info_labels();
    labels.get(&default).cloned().unwrap_or(default)
}

fn parse_lpstat_printers(stdout: &str, default: &str, labels: &HashMap<String, String>) -> Vec<PrinterInfo> {
    let mut printers = Vec::new();
    for line in stdout.lines() {
        // Example: "printer HP_LaserJet idle.  enabled since ..."
        let mut parts = line.trim().split_whitespace();
        if parts.next() != Some("printer") {
            continue;
        }
        let Some(name) = parts.next() else { continue };
        let Some(state_token) = parts.next() else { continue };
        let state = state_token
            .trim_end_matches(['.', ','])
            .to_ascii_lowercase();
        if !matches!(state.as_str(), "idle" | "disabled" | "busy") {
            continue;
        }
        printers.push(PrinterInfo {
            name: name.to_string(),
            state,
            is_default: name == default,
            accepting: None,
            display_name: labels.get(name).cloned(),
        });
    }
    printers
}

fn merge_accepting(printers: &mut [PrinterInfo], stdout: &str) {
    for line in stdout.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&name) = parts.first() else { continue };
        let accepting = !(parts.contains(&"not") && parts.contains(&"accepting"));
        // Names only present in `lpstat -a` (classes, stale destinations)
        // are not printers; `lpstat -p` stays authoritative.
        if let Some(p) = printers.iter_mut().find(|p| p.name == name) {
            p.accepting = Some(accepting);
        }
    }
}

/// Enumerate printers with state, default flag, accepting status and
/// display label.
pub async fn list_printers() -> Vec<PrinterInfo> {
    let default = default_printer().await;
    let labels = load_printer_info_labels();

    let stdout = match run_cmd(&["lpstat", "-p"], QUERY_TIMEOUT, false).await {
        Ok(res) => res.stdout,
        Err(e) => {
            debug!(error = %e, "lpstat -p failed");
            return Vec::new();
        }
    };
    let mut printers = parse_lpstat_printers(&stdout, &default, &labels);

    if let Ok(res) = run_cmd(&["lpstat", "-a"], QUERY_TIMEOUT, false).await {
        merge_accepting(&mut printers, &res.stdout);
    }

    printers
}

fn parse_queue_lines(stdout: &str) -> Vec<Job> {
    let mut jobs = Vec::new();
    // Example: "HP_LaserJet-12  alice  1024  Mon 01 Jan 2026 10:00:00 AM"
    for line in stdout.lines() {
        let line = line.trim();
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        jobs.push(Job {
            job_id: parts[0].to_string(),
            user: parts[1].to_string(),
            size: parts[2].to_string(),
            raw: line.to_string(),
        });
    }
    jobs
}

/// Current queue entries, oldest first as reported by `lpstat -o`.
pub async fn queue_jobs() -> Vec<Job> {
    match run_cmd(&["lpstat", "-o"], QUERY_TIMEOUT, false).await {
        Ok(res) => parse_queue_lines(&res.stdout),
        Err(_) => Vec::new(),
    }
}

/// Completed/active counts plus the raw line of the last completed job.
pub async fn job_stats() -> JobStats {
    let completed_lines: Vec<String> =
        match run_cmd(&["lpstat", "-W", "completed", "-o"], QUERY_TIMEOUT, false).await {
            Ok(res) => res
                .stdout
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.to_string())
                .collect(),
            Err(_) => Vec::new(),
        };
    let active = queue_jobs().await;

    JobStats {
        completed_jobs: completed_lines.len(),
        active_jobs: active.len(),
        last_completed_raw: completed_lines.last().cloned().unwrap_or_default(),
    }
}

/// Whether the scheduler reports itself running.
pub async fn scheduler_status() -> SchedulerStatus {
    match run_cmd(&["lpstat", "-r"], QUERY_TIMEOUT, false).await {
        Ok(res) => SchedulerStatus {
            cups_scheduler_running: res.stdout.to_ascii_lowercase().contains("running"),
            raw: res.stdout.trim().to_string(),
        },
        Err(e) => {
            warn!(error = %e, "scheduler status probe failed");
            SchedulerStatus {
                cups_scheduler_running: false,
                raw: String::new(),
            }
        }
    }
}

/// Raw `lpstat -l -p NAME` text for one printer. An empty name yields an
/// empty detail rather than an error.
pub async fn printer_detail(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    match run_cmd(&["lpstat", "-l", "-p", name], QUERY_TIMEOUT, false).await {
        Ok(res) => res.stdout.trim().to_string(),
        Err(_) => String::new(),
    }
}

fn build_lp_argv<'a>(
    file_path: &'a str,
    printer: Option<&'a str>,
    copies_str: &'a str,
    title: &'a str,
    options: &'a [String],
) -> Vec<&'a str> {
    let mut argv: Vec<&str> = vec!["lp", "-n", copies_str, "-t", title];
    if let Some(p) = printer {
        argv.extend(["-d", p]);
    }
    // Force monochrome where supported; harmless if the driver ignores it.
    argv.extend(["-o", "print-color-mode=monochrome", "-o", "ColorModel=Gray"]);
    for opt in options {
        // Options are discrete arguments, never concatenated.
        if !opt.is_empty() {
            argv.extend(["-o", opt.as_str()]);
        }
    }
    argv.push(file_path);
    argv
}

/// Submit a file to the spooler via `lp`.
pub async fn print_file(
    file_path: &Path,
    printer: Option<&str>,
    copies: u32,
    title: &str,
    options: &[String],
    timeout: Duration,
) -> PalResult<CmdResult> {
    if !file_path.exists() {
        return Err(PalError::Validation(format!(
            "File does not exist: {}",
            file_path.display()
        )));
    }
    if !(1..=99).contains(&copies) {
        return Err(PalError::Validation("copies must be between 1 and 99".into()));
    }

    let path_str = file_path.to_string_lossy();
    let copies_str = copies.to_string();
    let argv = build_lp_argv(&path_str, printer, &copies_str, title, options);

    match run_cmd(&argv, timeout, true).await {
        Ok(res) => Ok(res),
        Err(PalError::CommandFailed(res)) => {
            let detail = res.stderr.trim();
            let detail = if detail.is_empty() { res.stdout.trim() } else { detail };
            let detail = if detail.is_empty() { "unknown error" } else { detail };
            Err(PalError::Print(detail.to_string()))
        }
        Err(e) => Err(e),
    }
}

fn valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Cancel one queued job.
///
/// The id charset check guards against argument confusion; arguments are
/// never shell-interpreted.
pub async fn cancel_job(job_id: &str) -> PalResult<()> {
    if !valid_job_id(job_id) {
        return Err(PalError::Validation("Invalid job id".into()));
    }
    run_cmd(&["cancel", job_id], QUERY_TIMEOUT, true).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_destination() {
        let out = "system default destination: HP_LaserJet\n";
        assert_eq!(parse_default_destination(out), "HP_LaserJet");
        assert_eq!(parse_default_destination("no system default destination\n"), "");
    }

    #[test]
    fn test_parse_lpstat_printers() {
        let out = "printer HP_LaserJet idle.  enabled since Mon 01 Jan\n\
                   printer Brother disabled since Tue\n\
                   some unrelated line\n\
                   printer Epson busy printing job 7\n";
        let labels = HashMap::from([("Brother".to_string(), "Office Brother".to_string())]);
        let printers = parse_lpstat_printers(out, "Epson", &labels);
        assert_eq!(printers.len(), 3);
        assert_eq!(printers[0].name, "HP_LaserJet");
        assert_eq!(printers[0].state, "idle");
        assert!(!printers[0].is_default);
        assert_eq!(printers[1].display_name.as_deref(), Some("Office Brother"));
        assert_eq!(printers[1].state, "disabled");
        assert!(printers[2].is_default);
        assert!(printers.iter().all(|p| p.accepting.is_none()));
    }

    #[test]
    fn test_merge_accepting() {
        let out = "printer A idle.\nprinter B idle.\n";
        let mut printers = parse_lpstat_printers(out, "", &HashMap::new());
        let acc = "A accepting requests since Mon\n\
                   B not accepting requests since Tue\n\
                   GhostQueue accepting requests since Wed\n";
        merge_accepting(&mut printers, acc);
        assert_eq!(printers[0].accepting, Some(true));
        assert_eq!(printers[1].accepting, Some(false));
        // GhostQueue only appears in -a output and is dropped
        assert_eq!(printers.len(), 2);
    }

    #[test]
    fn test_parse_printers_conf() {
        let conf = "# Printer configuration file\n\
                    <Printer HP_LaserJet>\n\
                    UUID urn:uuid:1234\n\
                    Info \"Hallway LaserJet\"\n\
                    </Printer>\n\
                    <Printer NoLabel>\n\
                    DeviceURI usb://x\n\
                    </Printer>\n";
        let map = parse_printers_conf(conf);
        assert_eq!(map.get("HP_LaserJet").map(String::as_str), Some("Hallway LaserJet"));
        assert!(!map.contains_key("NoLabel"));
    }

    #[test]
    fn test_parse_queue_lines() {
        let out = "HP_LaserJet-12  alice  1024  Mon 01 Jan 2026 10:00:00 AM\n\
                   short line\n\
                   HP_LaserJet-13 bob 2048\n";
        let jobs = parse_queue_lines(out);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, "HP_LaserJet-12");
        assert_eq!(jobs[0].user, "alice");
        assert_eq!(jobs[0].size, "1024");
        assert_eq!(jobs[1].job_id, "HP_LaserJet-13");
    }

    #[test]
    fn test_build_lp_argv() {
        let options = vec!["media=A4".to_string(), String::new(), "sides=two-sided-long-edge".to_string()];
        let argv = build_lp_argv("/tmp/x.pdf", Some("Epson"), "2", "PrinterPal: x.pdf", &options);
        assert_eq!(
            argv,
            vec![
                "lp", "-n", "2", "-t", "PrinterPal: x.pdf", "-d", "Epson",
                "-o", "print-color-mode=monochrome", "-o", "ColorModel=Gray",
                "-o", "media=A4", "-o", "sides=two-sided-long-edge",
                "/tmp/x.pdf",
            ]
        );
    }

    #[tokio::test]
    async fn test_print_file_rejects_missing_file() {
        let err = print_file(
            Path::new("/definitely/not/here.pdf"),
            None,
            1,
            "t",
            &[],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PalError::Validation(_)));
    }

    #[tokio::test]
    async fn test_print_file_rejects_copies_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        for copies in [0, 100] {
            let err = print_file(&path, None, copies, "t", &[], Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, PalError::Validation(_)), "copies={copies}");
        }
    }

    #[tokio::test]
    async fn test_cancel_rejects_malformed_job_id() {
        for id in ["", "job;rm -rf /", "a b", "job$", "спулер"] {
            let err = cancel_job(id).await.unwrap_err();
            assert!(matches!(err, PalError::Validation(_)), "id={id:?}");
        }
    }

    #[test]
    fn test_valid_job_id_charset() {
        assert!(valid_job_id("HP_LaserJet-12"));
        assert!(valid_job_id("a.b-c_9"));
        assert!(!valid_job_id("a/b"));
    }
}
