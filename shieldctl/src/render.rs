use std::fmt::Write;

use shield_model::{
    ComplianceReport, ControlStatus, Finding, PushEvent, ScanJob, sort_by_severity,
};

pub fn progress(job: &ScanJob) -> String {
    match job.progress {
        Some(percent) => format!("{} {:<9} {:>3}%", job.id, job.status.as_str(), percent),
        None => format!("{} {}", job.id, job.status),
    }
}

pub fn findings(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "no findings\n".to_string();
    }

    let mut sorted = findings.to_vec();
    sort_by_severity(&mut sorted);

    let mut out = format!("{} findings\n", sorted.len());
    for finding in &sorted {
        let _ = writeln!(out, "[{:<8}] {}", finding.severity.as_str(), finding.title);
        if !finding.description.is_empty() {
            let _ = writeln!(out, "           {}", finding.description);
        }
        if let Some(solution) = &finding.solution {
            let _ = writeln!(out, "           fix: {solution}");
        }
    }
    out
}

pub fn history(jobs: &[ScanJob]) -> String {
    if jobs.is_empty() {
        return "no scans\n".to_string();
    }

    let mut out = format!("{:<24} {:<10} {:>8}  TARGET\n", "SCAN", "STATUS", "FINDINGS");
    for job in jobs {
        let _ = writeln!(
            out,
            "{:<24} {:<10} {:>8}  {}",
            job.id,
            job.status.as_str(),
            job.findings.len(),
            job.target
        );
    }
    out
}

pub fn event(event: &PushEvent) -> String {
    format!("{} [{}] {}", event.timestamp, event.level, event.message)
}

pub fn compliance(report: &ComplianceReport) -> String {
    let mut out = String::new();
    for standard in &report.standards {
        let verdict = if standard.is_compliant() {
            "compliant"
        } else {
            "NON-COMPLIANT"
        };
        let _ = writeln!(out, "{} ({}): {verdict}", standard.name, standard.description);
        for control in &standard.controls {
            let mark = match control.status {
                ControlStatus::Pass => "pass",
                ControlStatus::Fail => "FAIL",
            };
            let _ = writeln!(out, "  {mark:<4} {:<10} {}", control.id, control.description);
            for issue in &control.issues {
                let _ = writeln!(out, "         - [{}] {}", issue.severity, issue.title);
            }
        }
    }
    out
}
