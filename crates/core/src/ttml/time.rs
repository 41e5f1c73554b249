//! Timestamp resolution for the XML caption dialects.
//!
//! A timestamp is first classified by shape into a [`TimeSpec`], then turned
//! into seconds against the document's [`DialectContext`]. The same
//! `H:M:S:X` shape means frames in one dialect and milliseconds in another,
//! so the context decides how the fourth field is read.

use std::fmt;

use tracing::trace;

use crate::ConvertError;

/// Largest hour field accepted in a timecode.
const MAX_HOURS: u64 = 999_999;

/// Meaning of the fourth field in `H:M:S:X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FourthField {
    Frames,
    Milliseconds,
    /// The dialect does not allow four-field timecodes.
    Rejected,
}

/// `ttp:timeBase`. Frame-based encodings are refused under `clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeBase {
    #[default]
    Media,
    Smpte,
    Clock,
}

impl TimeBase {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "media" => Some(Self::Media),
            "smpte" => Some(Self::Smpte),
            "clock" => Some(Self::Clock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropMode {
    #[default]
    NonDrop,
    DropNtsc,
    DropPal,
}

impl DropMode {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "nonDrop" => Some(Self::NonDrop),
            "dropNTSC" => Some(Self::DropNtsc),
            "dropPAL" => Some(Self::DropPal),
            _ => None,
        }
    }

    /// Frame numbers skipped up to and including minute `total_minutes`.
    fn dropped_frames(self, total_minutes: u64) -> u64 {
        match self {
            Self::NonDrop => 0,
            Self::DropNtsc => 2 * (total_minutes - total_minutes / 10),
            Self::DropPal => 4 * (total_minutes / 2 - total_minutes / 10),
        }
    }
}

/// `ttp:frameRateMultiplier`, e.g. `1000 1001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRateMultiplier {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRateMultiplier {
    pub const UNITY: Self = Self {
        numerator: 1,
        denominator: 1,
    };

    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split_whitespace();
        let numerator = parts.next()?.parse().ok()?;
        let denominator = match parts.next() {
            Some(d) => d.parse().ok()?,
            None => 1,
        };
        if parts.next().is_some() || numerator == 0 || denominator == 0 {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }

    pub fn is_unity(self) -> bool {
        self.numerator == self.denominator
    }

    fn ratio(self) -> f64 {
        f64::from(self.numerator) / f64::from(self.denominator)
    }
}

impl fmt::Display for FrameRateMultiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.numerator, self.denominator)
    }
}

/// Per-document timing parameters, fixed once the root has been read.
#[derive(Debug, Clone, PartialEq)]
pub struct DialectContext {
    pub fourth_field: FourthField,
    pub frame_rate: Option<f64>,
    pub frame_rate_multiplier: Option<FrameRateMultiplier>,
    pub sub_frame_rate: Option<f64>,
    pub tick_rate: Option<f64>,
    pub time_base: TimeBase,
    pub drop_mode: DropMode,
}

impl DialectContext {
    pub fn new(fourth_field: FourthField) -> Self {
        Self {
            fourth_field,
            frame_rate: None,
            frame_rate_multiplier: None,
            sub_frame_rate: None,
            tick_rate: None,
            time_base: TimeBase::default(),
            drop_mode: DropMode::default(),
        }
    }

    #[must_use]
    pub fn with_frame_rate(mut self, rate: f64) -> Self {
        self.frame_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: FrameRateMultiplier) -> Self {
        self.frame_rate_multiplier = Some(multiplier);
        self
    }

    #[must_use]
    pub fn with_tick_rate(mut self, rate: f64) -> Self {
        self.tick_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn with_drop_mode(mut self, mode: DropMode) -> Self {
        self.drop_mode = mode;
        self
    }

    /// Effective frame rate, `None` when no rate was declared.
    ///
    /// An explicit rate combined with an explicit non-unity multiplier is
    /// rejected rather than multiplied out.
    pub fn effective_frame_rate(&self) -> Result<Option<f64>, ConvertError> {
        match (self.frame_rate, self.frame_rate_multiplier) {
            (Some(rate), Some(m)) if !m.is_unity() => {
                Err(ConvertError::AmbiguousFrameConfiguration {
                    frame_rate: rate.to_string(),
                    multiplier: m.to_string(),
                })
            }
            (Some(rate), m) => Ok(Some(rate * m.map_or(1.0, FrameRateMultiplier::ratio))),
            (None, _) => Ok(None),
        }
    }

    /// Fail early on configurations that can never resolve a frame timestamp.
    pub fn validate(&self) -> Result<(), ConvertError> {
        self.effective_frame_rate().map(|_| ())
    }
}

/// Shape of a single timestamp before the frame context is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeEncoding {
    /// `H:M:S` or `H:M:S.fff`, already in seconds.
    ClockSeconds(f64),
    /// `<n>f`
    FrameCount(f64),
    /// `<n>h`, `<n>m`, `<n>s` or `<n>ms`, normalized to seconds.
    SecondsSuffixed(f64),
    /// `<n>t`
    Ticks(f64),
    /// `H:M:S:FF` or `H:M:S:FF.sub`
    SmpteFrameTimecode {
        hours: u64,
        minutes: u64,
        seconds: u64,
        frames: u64,
        sub_frames: u64,
    },
    /// `H:M:S:mmm`
    MillisecondTimecode {
        hours: u64,
        minutes: u64,
        seconds: u64,
        millis: u64,
    },
}

/// A classified timestamp together with its source text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpec<'a> {
    pub raw: &'a str,
    pub encoding: TimeEncoding,
}

impl<'a> TimeSpec<'a> {
    pub fn parse(raw: &'a str, fourth_field: FourthField) -> Result<Self, ConvertError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(ConvertError::timestamp(raw, "empty timestamp"));
        }
        let encoding = if text.contains(':') {
            parse_timecode(text, fourth_field)
        } else {
            parse_offset(text)
        }
        .map_err(|reason| ConvertError::timestamp(raw, reason))?;
        Ok(Self { raw, encoding })
    }

    pub fn to_seconds(&self, context: &DialectContext) -> Result<f64, ConvertError> {
        let frame_rate = || -> Result<f64, ConvertError> {
            context
                .effective_frame_rate()?
                .ok_or_else(|| ConvertError::timestamp(self.raw, "frame rate required"))
        };
        if context.time_base == TimeBase::Clock
            && matches!(
                self.encoding,
                TimeEncoding::FrameCount(_) | TimeEncoding::SmpteFrameTimecode { .. }
            )
        {
            return Err(ConvertError::timestamp(
                self.raw,
                "frames are not allowed with the clock time base",
            ));
        }
        Ok(match self.encoding {
            TimeEncoding::ClockSeconds(s) | TimeEncoding::SecondsSuffixed(s) => s,
            TimeEncoding::FrameCount(frames) => frames / frame_rate()?,
            TimeEncoding::Ticks(ticks) => {
                let rate = context
                    .tick_rate
                    .ok_or_else(|| ConvertError::timestamp(self.raw, "tick rate required"))?;
                ticks / rate
            }
            TimeEncoding::SmpteFrameTimecode {
                hours,
                minutes,
                seconds,
                frames,
                sub_frames,
            } => {
                let rate = frame_rate()?;
                let sub = sub_frames as f64 / context.sub_frame_rate.unwrap_or(1.0);
                let whole = hours * 3600 + minutes * 60 + seconds;
                match context.drop_mode {
                    DropMode::NonDrop => whole as f64 + (frames as f64 + sub) / rate,
                    mode => {
                        let counted = whole
                            .checked_mul(rate.round() as u64)
                            .and_then(|n| n.checked_add(frames))
                            .ok_or_else(|| {
                                ConvertError::timestamp(self.raw, "frame count out of range")
                            })?;
                        let dropped = mode.dropped_frames(hours * 60 + minutes);
                        (counted.saturating_sub(dropped) as f64 + sub) / rate
                    }
                }
            }
            TimeEncoding::MillisecondTimecode {
                hours,
                minutes,
                seconds,
                millis,
            } => ((hours * 3600 + minutes * 60 + seconds) * 1000 + millis) as f64 / 1000.0,
        })
    }
}

/// Resolve a timestamp attribute to seconds.
pub fn resolve(text: &str, context: &DialectContext) -> Result<f64, ConvertError> {
    trace!("resolve(text={text:?})");
    TimeSpec::parse(text, context.fourth_field)?.to_seconds(context)
}

/// Format seconds as a TTML offset time, e.g. `8.456s`.
/// Millisecond precision, no trailing zeros.
pub fn format(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let whole = millis / 1000;
    let frac = millis % 1000;
    if frac == 0 {
        format!("{whole}s")
    } else {
        let frac = format!("{frac:03}");
        format!("{whole}.{}s", frac.trim_end_matches('0'))
    }
}

/// `H:M:S`, `H:M:S.fff` or `H:M:S:X`.
fn parse_timecode(text: &str, fourth_field: FourthField) -> Result<TimeEncoding, String> {
    let parts: Vec<&str> = text.split(':').collect();
    let (hours, minutes) = match parts.as_slice() {
        [h, m, _, ..] => (
            integer(h).ok_or("bad hours")?,
            integer(m).filter(|m| *m < 60).ok_or("bad minutes")?,
        ),
        _ => return Err("expected H:M:S".into()),
    };
    if hours > MAX_HOURS {
        return Err("hours out of range".into());
    }
    match parts.as_slice() {
        [_, _, s] => {
            let seconds = decimal(s).filter(|s| *s < 60.0).ok_or("bad seconds")?;
            Ok(TimeEncoding::ClockSeconds(
                (hours * 3600 + minutes * 60) as f64 + seconds,
            ))
        }
        [_, _, s, tail] => {
            let seconds = integer(s).filter(|s| *s < 60).ok_or("bad seconds")?;
            match fourth_field {
                FourthField::Frames => {
                    let (frames, sub_frames) = match tail.split_once('.') {
                        Some((f, sub)) => (integer(f), integer(sub)),
                        None => (integer(tail), Some(0)),
                    };
                    Ok(TimeEncoding::SmpteFrameTimecode {
                        hours,
                        minutes,
                        seconds,
                        frames: frames.ok_or("bad frames")?,
                        sub_frames: sub_frames.ok_or("bad sub-frames")?,
                    })
                }
                FourthField::Milliseconds => Ok(TimeEncoding::MillisecondTimecode {
                    hours,
                    minutes,
                    seconds,
                    millis: integer(tail)
                        .filter(|ms| *ms < 1000)
                        .ok_or("bad milliseconds")?,
                }),
                FourthField::Rejected => {
                    Err("four-field timecodes are not allowed in this dialect".into())
                }
            }
        }
        _ => Err("too many fields".into()),
    }
}

/// `<number><metric>` offset times.
fn parse_offset(text: &str) -> Result<TimeEncoding, String> {
    let (number, metric) = match text.strip_suffix("ms") {
        Some(n) => (n, "ms"),
        None => {
            let split = text.len() - text.chars().last().map_or(0, char::len_utf8);
            (&text[..split], &text[split..])
        }
    };
    let value = decimal(number).ok_or("expected a number before the metric")?;
    Ok(match metric {
        "h" => TimeEncoding::SecondsSuffixed(value * 3600.0),
        "m" => TimeEncoding::SecondsSuffixed(value * 60.0),
        "s" => TimeEncoding::SecondsSuffixed(value),
        "ms" => TimeEncoding::SecondsSuffixed(value / 1000.0),
        "f" => TimeEncoding::FrameCount(value),
        "t" => TimeEncoding::Ticks(value),
        _ => return Err("unknown time metric".into()),
    })
}

fn integer(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Digits with an optional fraction; no sign, no exponent, no bare dot.
fn decimal(s: &str) -> Option<f64> {
    let (whole, frac) = s.split_once('.').unwrap_or((s, "0"));
    integer(whole)?;
    integer(frac)?;
    s.parse().ok()
}
