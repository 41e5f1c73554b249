//! One extraction handler per dialect.
//!
//! Handlers only differ in which elements carry captions and which attributes
//! hold their timing. Timestamps go through [`time::resolve`], text through
//! [`extract_lines`], and open end times are inferred once at the end.

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use super::dialect::DialectKind;
use super::text::{extract_lines, LineBreaks};
use super::time::{self, DialectContext, DropMode, FourthField, FrameRateMultiplier, TimeBase};
use super::tree::Element;
use crate::{Caption, ConvertError, Document};

/// Length given to a last caption that declares neither end nor duration.
const DEFAULT_DURATION: f64 = 1.0;

/// Map a detected document to captions.
pub(crate) fn extract(kind: DialectKind, root: &Element) -> Result<Document, ConvertError> {
    trace!("extract(kind={kind})");
    let pending = match kind {
        DialectKind::Ttml | DialectKind::EbuTtD => {
            let context = ttml_context(root, kind.fourth_field())?;
            extract_ttml(root, &context)?
        }
        DialectKind::DcSubtitle => {
            extract_cinema(root, &DialectContext::new(kind.fourth_field()))?
        }
        DialectKind::SubtitleReel => {
            let mut context = DialectContext::new(kind.fourth_field());
            context.frame_rate = reel_frame_rate(root)?;
            extract_cinema(root, &context)?
        }
        DialectKind::ParagraphList => extract_paragraphs(root)?,
        DialectKind::Transcript => extract_transcript(root)?,
    };
    Ok(infer_end_times(pending))
}

/// End of a caption as found in the source.
#[derive(Debug, Clone, Copy, PartialEq)]
enum EndTime {
    At(f64),
    /// Neither end nor duration was given.
    Open,
}

#[derive(Debug)]
struct Pending {
    start: f64,
    end: EndTime,
    lines: Vec<String>,
}

/// Close open captions at the next caption's start, or one second after
/// their own start for the last caption.
fn infer_end_times(pending: Vec<Pending>) -> Document {
    let next_starts: Vec<Option<f64>> = pending
        .iter()
        .skip(1)
        .map(|p| Some(p.start))
        .chain(std::iter::once(None))
        .collect();
    pending
        .into_iter()
        .zip(next_starts)
        .map(|(p, next)| {
            let mut end = match (p.end, next) {
                (EndTime::At(end), _) => end,
                (EndTime::Open, Some(next)) => next,
                (EndTime::Open, None) => p.start + DEFAULT_DURATION,
            };
            if end < p.start {
                warn!(
                    "caption at {}s ends at {}s before it starts, clamping",
                    p.start, end
                );
                end = p.start;
            }
            Caption {
                start: p.start,
                end,
                lines: p.lines,
            }
        })
        .collect::<Vec<_>>()
        .into()
}

/// Tracks caption identifiers so a repeated one fails the parse.
#[derive(Default)]
struct Identifiers(HashSet<String>);

impl Identifiers {
    fn claim(&mut self, id: Option<&str>, near: &str) -> Result<(), ConvertError> {
        match id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) if !self.0.insert(id.to_string()) => Err(ConvertError::DuplicateIdentifier {
                id: id.to_string(),
                near: Some(near.to_string()),
            }),
            _ => Ok(()),
        }
    }
}

fn required<'a>(element: &'a Element, attr: &str, near: &str) -> Result<&'a str, ConvertError> {
    element.attr_non_empty(attr).ok_or_else(|| {
        ConvertError::malformed(format!("<{}> without {attr}", element.name)).near(near)
    })
}

fn resolve_near(raw: &str, context: &DialectContext, near: &str) -> Result<f64, ConvertError> {
    time::resolve(raw, context).map_err(|e| e.near(near))
}

/// Read the timing parameters declared on a TTML root.
fn ttml_context(root: &Element, fourth_field: FourthField) -> Result<DialectContext, ConvertError> {
    fn number(root: &Element, attr: &str) -> Result<Option<f64>, ConvertError> {
        root.attr_non_empty(attr)
            .map(|raw| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| *v > 0.0)
                    .ok_or_else(|| ConvertError::malformed(format!("invalid {attr} \"{raw}\"")))
            })
            .transpose()
    }

    let mut context = DialectContext::new(fourth_field);
    context.frame_rate = number(root, "frameRate")?;
    context.sub_frame_rate = number(root, "subFrameRate")?;
    context.tick_rate = number(root, "tickRate")?;
    if let Some(raw) = root.attr_non_empty("frameRateMultiplier") {
        context.frame_rate_multiplier = Some(FrameRateMultiplier::parse(raw).ok_or_else(|| {
            ConvertError::malformed(format!("invalid frameRateMultiplier \"{raw}\""))
        })?);
    }
    if let Some(raw) = root.attr_non_empty("timeBase") {
        context.time_base = TimeBase::from_attr(raw)
            .ok_or_else(|| ConvertError::malformed(format!("invalid timeBase \"{raw}\"")))?;
    }
    if let Some(raw) = root.attr_non_empty("dropMode") {
        context.drop_mode = DropMode::from_attr(raw)
            .ok_or_else(|| ConvertError::malformed(format!("invalid dropMode \"{raw}\"")))?;
    }
    context.validate()?;
    debug!("ttml timing context {:?}", context);
    Ok(context)
}

/// Every `<p>` under `<body>`, flattened across `<div>`s in document order.
fn extract_ttml(root: &Element, context: &DialectContext) -> Result<Vec<Pending>, ConvertError> {
    let Some(body) = root.child("body") else {
        debug!("document has no body");
        return Ok(Vec::new());
    };
    let mut ids = Identifiers::default();
    let mut pending = Vec::new();
    for p in body.descendants_named("p") {
        let lines = extract_lines(p, LineBreaks::Markup);
        let near = lines.join("\n");
        ids.claim(p.attr("id"), &near)?;
        let start = resolve_near(required(p, "begin", &near)?, context, &near)?;
        let end = match (p.attr_non_empty("end"), p.attr_non_empty("dur")) {
            (Some(end), _) => EndTime::At(resolve_near(end, context, &near)?),
            (None, Some(dur)) => EndTime::At(start + resolve_near(dur, context, &near)?),
            (None, None) => EndTime::Open,
        };
        pending.push(Pending { start, end, lines });
    }
    Ok(pending)
}

/// `<Subtitle TimeIn TimeOut>` entries of DCSubtitle and SubtitleReel.
/// Each `<Text>` child contributes its own lines.
fn extract_cinema(root: &Element, context: &DialectContext) -> Result<Vec<Pending>, ConvertError> {
    let mut ids = Identifiers::default();
    let mut pending = Vec::new();
    for subtitle in root.descendants_named("Subtitle") {
        let texts = subtitle.descendants_named("Text");
        if texts.is_empty() {
            return Err(ConvertError::malformed(format!(
                "<Subtitle> {} has no <Text>",
                subtitle.attr("SpotNumber").unwrap_or("?")
            )));
        }
        let lines: Vec<String> = texts
            .into_iter()
            .flat_map(|text| extract_lines(text, LineBreaks::Markup))
            .collect();
        let near = lines.join("\n");
        ids.claim(subtitle.attr("SpotNumber"), &near)?;
        let start = resolve_near(required(subtitle, "TimeIn", &near)?, context, &near)?;
        let end = resolve_near(required(subtitle, "TimeOut", &near)?, context, &near)?;
        pending.push(Pending {
            start,
            end: EndTime::At(end),
            lines,
        });
    }
    Ok(pending)
}

/// Frame rate of a SubtitleReel: `<TimeCodeRate>`, else `<EditRate>`, else a
/// rate attribute on the root.
fn reel_frame_rate(root: &Element) -> Result<Option<f64>, ConvertError> {
    let parse_rate = |raw: &str| -> Result<f64, ConvertError> {
        let mut parts = raw.split_whitespace();
        let numerator: Option<f64> = parts.next().and_then(|n| n.parse().ok());
        let denominator: Option<f64> = match parts.next() {
            Some(d) => d.parse().ok(),
            None => Some(1.0),
        };
        match (numerator, denominator) {
            (Some(n), Some(d)) if n > 0.0 && d > 0.0 => Ok(n / d),
            _ => Err(ConvertError::malformed(format!("invalid frame rate \"{raw}\""))),
        }
    };
    let declared = root
        .child("TimeCodeRate")
        .or_else(|| root.child("EditRate"))
        .map(Element::text_content)
        .or_else(|| {
            root.attr_non_empty("TimeCodeRate")
                .or_else(|| root.attr_non_empty("FrameRate"))
                .map(str::to_string)
        });
    let rate = declared.as_deref().map(str::trim).map(parse_rate).transpose()?;
    debug!("subtitle reel frame rate {:?}", rate);
    Ok(rate)
}

/// `<Paragraph>` entries with integer millisecond fields.
fn extract_paragraphs(root: &Element) -> Result<Vec<Pending>, ConvertError> {
    fn child_text(p: &Element, name: &str) -> Option<String> {
        p.child(name)
            .map(|e| e.text_content().trim().to_string())
            .filter(|t| !t.is_empty())
    }
    fn millis(p: &Element, name: &str, near: &str) -> Result<f64, ConvertError> {
        let raw = child_text(p, name).ok_or_else(|| {
            ConvertError::malformed(format!("<Paragraph> without <{name}>")).near(near)
        })?;
        raw.parse::<u64>()
            .map(|ms| ms as f64 / 1000.0)
            .map_err(|_| ConvertError::timestamp(&raw, "expected integer milliseconds").near(near))
    }

    let mut ids = Identifiers::default();
    let mut pending = Vec::new();
    for p in root.children_named("Paragraph") {
        let text = p
            .child("Text")
            .ok_or_else(|| ConvertError::malformed("<Paragraph> without <Text>"))?;
        let lines = extract_lines(text, LineBreaks::Markup);
        let near = lines.join("\n");
        ids.claim(child_text(p, "Number").as_deref(), &near)?;
        let start = millis(p, "StartMilliseconds", &near)?;
        let end = millis(p, "EndMilliseconds", &near)?;
        pending.push(Pending {
            start,
            end: EndTime::At(end),
            lines,
        });
    }
    Ok(pending)
}

/// `<text start dur>` entries, both in plain fractional seconds.
fn extract_transcript(root: &Element) -> Result<Vec<Pending>, ConvertError> {
    fn seconds(raw: &str, near: &str) -> Result<f64, ConvertError> {
        raw.parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s >= 0.0)
            .ok_or_else(|| ConvertError::timestamp(raw, "expected fractional seconds").near(near))
    }

    let mut pending = Vec::new();
    for text in root.children_named("text") {
        let lines = extract_lines(text, LineBreaks::MarkupAndNewlines);
        let near = lines.join("\n");
        let start = seconds(required(text, "start", &near)?, &near)?;
        let end = match text.attr_non_empty("dur") {
            Some(dur) => EndTime::At(start + seconds(dur, &near)?),
            None => EndTime::Open,
        };
        pending.push(Pending { start, end, lines });
    }
    Ok(pending)
}
