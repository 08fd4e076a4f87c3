use anyhow::{Context, Result};
use colored::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use probescope::scanner::{IdentificationSource, PortResult, ScanResult, ScanStatus};
use probescope::ProbeStatistics;

use crate::cli::OutputFormat;

pub struct OutputWriter {
    format: OutputFormat,
    file: Option<PathBuf>,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, file: Option<PathBuf>) -> Self {
        Self { format, file }
    }

    pub fn write(&self, results: &[ScanResult]) -> Result<()> {
        let output = match self.format {
            OutputFormat::Human => format_human(results),
            OutputFormat::Json => format_json(results)?,
        };
        self.emit(&output)
    }

    pub fn write_statistics(&self, stats: &[ProbeStatistics]) -> Result<()> {
        let output = match self.format {
            OutputFormat::Human => format_statistics(stats),
            OutputFormat::Json => serde_json::to_string_pretty(stats)? + "\n",
        };
        // the report goes to the terminal even when results go to a file
        print!("{}", output);
        io::stdout().flush()?;
        Ok(())
    }

    fn emit(&self, output: &str) -> Result<()> {
        match &self.file {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("cannot create output file {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                writer.write_all(output.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", output);
                io::stdout().flush()?;
            }
        }
        Ok(())
    }
}

fn format_json(results: &[ScanResult]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)? + "\n")
}

fn format_human(results: &[ScanResult]) -> String {
    let mut output = String::new();
    let mut hosts_with_open_ports = 0;
    let mut total_open_ports = 0;

    output.push('\n');
    for result in results {
        let status = match result.status {
            ScanStatus::Success => "done".truecolor(0, 255, 65),
            ScanStatus::Cancelled => "cancelled".truecolor(255, 140, 0),
            ScanStatus::Failed => "failed".truecolor(255, 64, 64),
        };
        output.push_str(&format!(
            "{} {} {} {} {}\n",
            "▶".truecolor(0, 255, 65).bold(),
            result.target.truecolor(255, 255, 255).bold(),
            "•".truecolor(64, 64, 64),
            status.bold(),
            format!("({}ms)", result.response_time_ms).truecolor(128, 128, 128),
        ));

        if let Some(error) = &result.error_message {
            output.push_str(&format!("  {}\n\n", error.truecolor(255, 64, 64)));
            continue;
        }

        let open: Vec<&PortResult> = result.open_ports().collect();
        if open.is_empty() {
            output.push_str(&format!("  {}\n\n", "no open ports".truecolor(128, 128, 128)));
            continue;
        }
        hosts_with_open_ports += 1;
        total_open_ports += open.len();

        for port in open {
            output.push_str(&format!(
                "  {:>5}/tcp {} {:<14} {}\n",
                port.port.to_string().truecolor(255, 255, 255).bold(),
                "●".truecolor(0, 255, 65),
                port.service.truecolor(0, 212, 255).bold(),
                describe(port).truecolor(128, 128, 128),
            ));
            if !port.banner.is_empty() {
                let banner: String = port.banner.lines().next().unwrap_or_default().chars().take(80).collect();
                output.push_str(&format!("            {}\n", banner.truecolor(96, 96, 96)));
            }
        }
        output.push('\n');
    }

    if total_open_ports == 0 {
        output.push_str(&format!(
            "{}\n",
            "No open ports detected".truecolor(128, 128, 128)
        ));
    } else {
        output.push_str(&format!(
            "{} {} {} {}\n",
            "Scan complete:".truecolor(0, 255, 65).bold(),
            format!("{} hosts", hosts_with_open_ports).truecolor(255, 255, 255).bold(),
            "•".truecolor(64, 64, 64),
            format!("{} open ports", total_open_ports).truecolor(255, 255, 255).bold(),
        ));
    }
    output
}

fn describe(port: &PortResult) -> String {
    let mut parts = Vec::new();
    let product = [port.product.as_str(), port.version.as_str()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if !product.is_empty() {
        parts.push(product);
    }
    if !port.os.is_empty() {
        parts.push(format!("[{}]", port.os));
    }
    let source = match port.source {
        IdentificationSource::Parser | IdentificationSource::Rule => match &port.probe {
            Some(probe) => format!("{}% via {}/{}", port.confidence, port.source, probe),
            None => format!("{}% via {}", port.confidence, port.source),
        },
        IdentificationSource::PortHeuristic => format!("{}% by port", port.confidence),
        IdentificationSource::None => "unidentified".to_string(),
    };
    parts.push(format!("({})", source));
    parts.join(" ")
}

fn format_statistics(stats: &[ProbeStatistics]) -> String {
    let mut output = format!(
        "\n{}\n",
        "Probe statistics".truecolor(191, 64, 191).bold()
    );
    output.push_str(&format!(
        "  {:<22} {:>8} {:>8} {:>8}\n",
        "probe", "sent", "hits", "rate"
    ));
    for entry in stats.iter().filter(|s| s.sent > 0) {
        output.push_str(&format!(
            "  {:<22} {:>8} {:>8} {:>7.1}%\n",
            entry.name,
            entry.sent,
            entry.successful,
            entry.hit_rate * 100.0
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> Vec<ScanResult> {
        let mut ssh = PortResult::open(22);
        ssh.service = "ssh".into();
        ssh.product = "OpenSSH".into();
        ssh.version = "8.2p1".into();
        ssh.confidence = 98;
        ssh.source = IdentificationSource::Parser;
        ssh.probe = Some("NULL".into());
        ssh.banner = "SSH-2.0-OpenSSH_8.2p1".into();

        vec![
            ScanResult {
                task_id: "t".into(),
                target: "127.0.0.1".into(),
                status: ScanStatus::Success,
                ports: vec![ssh],
                response_time_ms: 12,
                error_message: None,
                started_at: Utc::now(),
                finished_at: Utc::now(),
            },
            ScanResult::failed("t", "nowhere.invalid", "failed to resolve nowhere.invalid"),
        ]
    }

    #[test]
    fn test_human_output_lists_services_and_failures() {
        colored::control::set_override(false);
        let text = format_human(&sample());
        assert!(text.contains("OpenSSH 8.2p1"));
        assert!(text.contains("98% via parser/NULL"));
        assert!(text.contains("failed to resolve nowhere.invalid"));
        assert!(text.contains("1 open ports"));
    }

    #[test]
    fn test_json_output_is_an_array() {
        let json: serde_json::Value = serde_json::from_str(&format_json(&sample()).unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["ports"][0]["service"], "ssh");
        assert_eq!(json[1]["status"], "failed");
    }

    #[test]
    fn test_output_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        OutputWriter::new(OutputFormat::Json, Some(path.clone()))
            .write(&sample())
            .unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("\"task_id\": \"t\""));
    }
}
