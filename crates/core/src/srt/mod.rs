//! This module is responsible for SRT parsing and writing.
//! It maps numbered SRT blocks to captions and back while preserving order.

use tracing::trace;

use crate::{Caption, ConvertError, Converter, Document};

/// Converter for the line oriented SubRip format.
#[derive(Debug, Clone, Copy, Default)]
pub struct SrtConverter;

impl Converter for SrtConverter {
    fn name(&self) -> &'static str {
        "srt"
    }

    fn can_recognize(&self, content: &[u8]) -> bool {
        let text = String::from_utf8_lossy(content);
        let text = text.trim_start_matches('\u{feff}');
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        lines.windows(3).any(|w| {
            w[0].chars().all(|c| c.is_ascii_digit()) && is_timing_line(w[1]) && !w[2].is_empty()
        })
    }

    fn parse(&self, content: &[u8]) -> Result<Document, ConvertError> {
        parse(std::str::from_utf8(content)?)
    }

    fn serialize(&self, document: &Document) -> Vec<u8> {
        format(document).into_bytes()
    }
}

/// Parse SRT text into a document.
/// Blocks are separated by blank lines; a block without a timing line or
/// without text is skipped.
pub fn parse(input: &str) -> Result<Document, ConvertError> {
    trace!("srt::parse(len={})", input.len());
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let lines: Vec<&str> = input.trim().lines().map(str::trim).collect();
    let mut document = Document::new();
    for block in lines.split(|l| l.is_empty()) {
        let Some(pos) = block.iter().position(|l| l.contains("-->")) else {
            continue;
        };
        let text = &block[pos + 1..];
        if text.is_empty() {
            continue;
        }
        let (start, end) = parse_times(block[pos]).map_err(|e| e.near(&text.join("\n")))?;
        document.push(Caption::new(start, end, text.iter().map(|l| strip_tags(l))));
    }
    Ok(document)
}

/// Format a document as SRT.
/// Blocks are numbered from 1 and separated by blank lines, using CRLF.
pub fn format(document: &Document) -> String {
    let mut out = String::new();
    for (k, caption) in document.iter().enumerate() {
        out.push_str(&format!(
            "{}\r\n{} --> {}\r\n{}\r\n\r\n",
            k + 1,
            format_time(caption.start),
            format_time(caption.end),
            caption.lines.join("\r\n")
        ));
    }
    out.trim().to_string()
}

/// Parse a time range like `00:00:01,000 --> 00:00:02,000` to seconds.
/// Anything after the end time (position hints) is ignored.
fn parse_times(line: &str) -> Result<(f64, f64), ConvertError> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| ConvertError::timestamp(line, "missing -->"))?;
    let end = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| ConvertError::timestamp(line, "missing end time"))?;
    Ok((parse_time(start.trim())?, parse_time(end)?))
}

/// Parse `H:MM:SS,mmm` into seconds.
/// The fraction may use `,`, `.` or `:` and holds 1-3 digits, right padded.
fn parse_time(t: &str) -> Result<f64, ConvertError> {
    let (clock, fraction) = match t.find([',', '.']) {
        Some(i) => (&t[..i], Some(&t[i + 1..])),
        None => (t, None),
    };
    let mut parts: Vec<&str> = clock.split(':').collect();
    let fraction = match fraction {
        Some(f) => Some(f),
        None if parts.len() == 4 => parts.pop(),
        None => None,
    };
    if parts.len() != 3 {
        return Err(ConvertError::timestamp(t, "expected H:MM:SS,mmm"));
    }
    let h = digits(parts[0], 1, 2).ok_or_else(|| ConvertError::timestamp(t, "bad hours"))?;
    let m = digits(parts[1], 2, 2).ok_or_else(|| ConvertError::timestamp(t, "bad minutes"))?;
    let s = digits(parts[2], 1, 2).ok_or_else(|| ConvertError::timestamp(t, "bad seconds"))?;
    let ms = match fraction {
        Some(f) => {
            let value =
                digits(f, 1, 3).ok_or_else(|| ConvertError::timestamp(t, "bad milliseconds"))?;
            value * 10u64.pow(3 - f.len() as u32)
        }
        None => 0,
    };
    Ok(((h * 3600 + m * 60 + s) * 1000 + ms) as f64 / 1000.0)
}

/// Parse an all-digit field of `min..=max` characters.
fn digits(s: &str, min: usize, max: usize) -> Option<u64> {
    if s.len() < min || s.len() > max || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Largest time an SRT timing line can hold, `99:59:59,999`.
const MAX_SECONDS: f64 = 359_999.999;

/// Format seconds back to `HH:MM:SS,mmm`.
/// The fraction is truncated to milliseconds from the shortest decimal form,
/// so `8.456` stays `,456` instead of drifting to `,455`. Out of range values
/// saturate at `00:00:00,000` and `99:59:59,999`.
fn format_time(seconds: f64) -> String {
    let repr = format!("{}", seconds.max(0.0).min(MAX_SECONDS));
    let (whole, decimal) = repr.split_once('.').unwrap_or((&repr, ""));
    let whole: u64 = whole.parse().unwrap_or(0);
    let ms: String = decimal.chars().take(3).collect();
    let h = whole / 3600;
    let m = (whole % 3600) / 60;
    let s = whole % 60;
    format!("{h:02}:{m:02}:{s:02},{ms:0<3}")
}

/// Check a `00:00:01,000 --> 00:00:02,000` line as used for sniffing.
fn is_timing_line(line: &str) -> bool {
    fn sniff_time(t: &str) -> bool {
        let Some((clock, ms)) = t.split_once(',') else {
            return false;
        };
        let parts: Vec<&str> = clock.split(':').collect();
        parts.len() == 3
            && digits(parts[0], 1, 2).is_some()
            && digits(parts[1], 2, 2).is_some()
            && digits(parts[2], 2, 2).is_some()
            && digits(ms, 1, 3).is_some()
    }
    match line.split_once("-->") {
        Some((start, end)) => {
            let end = end.trim_start();
            sniff_time(start.trim()) && sniff_time(end.split_whitespace().next().unwrap_or(""))
        }
        None => false,
    }
}

/// Remove inline markup such as `<i>` or `<font color="red">`.
fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
