//! Binary entry point for the subtitle converter.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use subconv_core::ttml::parse_document;
use subconv_core::{parse_auto, Converter, Format};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Command line options for the binary.
#[derive(Parser)]
struct Cli {
    /// Enable verbose debug and trace logs.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a subtitle file to another format.
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Output format. Taken from the output extension when omitted.
        #[arg(long)]
        to: Option<Format>,
    },
    /// Print the parsed captions as JSON.
    Inspect { input: PathBuf },
    /// Print the detected format, and the XML dialect for TTML input.
    Detect { input: PathBuf },
}

/// Application entry point which parses CLI args and performs actions.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.debug {
        EnvFilter::default()
            .add_directive("subconv=trace".parse()?)
            .add_directive("subconv_core=trace".parse()?)
            .add_directive("info".parse()?)
    } else {
        EnvFilter::default()
            .add_directive("subconv=info".parse()?)
            .add_directive("subconv_core=info".parse()?)
            .add_directive("warn".parse()?)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let report = run(cli.command)?;
    if !report.is_empty() {
        println!("{report}");
    }
    Ok(())
}

/// Execute one subcommand. Returns what should be printed on stdout.
fn run(command: Command) -> Result<String> {
    match command {
        Command::Convert { input, output, to } => {
            let to = match to {
                Some(format) => format,
                None => format_of(&output)?,
            };
            let content = read(&input)?;
            let (document, from) = parse_auto(&content)
                .with_context(|| format!("failed to parse {}", input.display()))?;
            debug!("read {} captions as {from}", document.len());
            let bytes = to.converter().serialize(&document);
            fs::write(&output, bytes)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(
                "converted {} ({from}) to {} ({to}), {} captions",
                input.display(),
                output.display(),
                document.len()
            );
            Ok(String::new())
        }
        Command::Inspect { input } => {
            let content = read(&input)?;
            let (document, _) = parse_auto(&content)
                .with_context(|| format!("failed to parse {}", input.display()))?;
            Ok(serde_json::to_string_pretty(&document)?)
        }
        Command::Detect { input } => {
            let content = read(&input)?;
            match Format::detect(&content) {
                Some(Format::Ttml) => {
                    let (_, dialect) = parse_document(&content)
                        .with_context(|| format!("failed to parse {}", input.display()))?;
                    Ok(format!("{} ({dialect})", Format::Ttml))
                }
                Some(format) => Ok(format.to_string()),
                None => Err(anyhow!("{}: unrecognized subtitle format", input.display())),
            }
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn format_of(path: &Path) -> Result<Format> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(Format::from_extension)
        .ok_or_else(|| {
            anyhow!(
                "can't tell the output format of {}, pass --to",
                path.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SRT: &str = "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n";

    #[test]
    fn converts_by_output_extension() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.srt");
        let output = dir.path().join("out.dfxp");
        fs::write(&input, SRT).unwrap();
        run(Command::Convert {
            input,
            output: output.clone(),
            to: None,
        })
        .unwrap();
        let written = fs::read_to_string(output).unwrap();
        assert!(written.contains(r#"<p begin="1s" end="2.5s">Hello</p>"#));
        assert!(written.contains(r#"<p begin="3s" end="4s">World</p>"#));
    }

    #[test]
    fn explicit_format_wins_over_extension() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.srt");
        let output = dir.path().join("out.txt");
        fs::write(&input, SRT).unwrap();
        run(Command::Convert {
            input,
            output: output.clone(),
            to: Some(Format::Srt),
        })
        .unwrap();
        assert!(fs::read_to_string(output)
            .unwrap()
            .starts_with("1\r\n00:00:01,000 --> 00:00:02,500\r\nHello"));
    }

    #[test]
    fn unknown_output_extension_fails() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.srt");
        fs::write(&input, SRT).unwrap();
        let err = run(Command::Convert {
            input,
            output: dir.path().join("out.vtt"),
            to: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("pass --to"));
    }

    #[test]
    fn inspect_prints_json() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.xml");
        fs::write(
            &input,
            r#"<transcript><text start="0.5" dur="1">hi</text></transcript>"#,
        )
        .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&run(Command::Inspect { input }).unwrap()).unwrap();
        assert_eq!(json["captions"][0]["end"], 1.5);
        assert_eq!(json["captions"][0]["lines"][0], "hi");
    }

    #[test]
    fn detect_names_the_dialect() {
        let dir = tempdir().unwrap();
        let xml = dir.path().join("a.xml");
        fs::write(&xml, r#"<DCSubtitle Version="1.0"></DCSubtitle>"#).unwrap();
        assert_eq!(
            run(Command::Detect { input: xml }).unwrap(),
            "ttml (dcsubtitle)"
        );
        let srt = dir.path().join("a.srt");
        fs::write(&srt, SRT).unwrap();
        assert_eq!(run(Command::Detect { input: srt }).unwrap(), "srt");
    }

    #[test]
    fn missing_input_names_the_path() {
        let err = run(Command::Inspect {
            input: PathBuf::from("/nonexistent/file.srt"),
        })
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/file.srt"));
    }
}
