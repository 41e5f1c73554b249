//! The converter contract and the format dispatcher built on top of it.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::{ConvertError, Document, SrtConverter, TtmlConverter};

/// A bidirectional mapping between one on-disk format and [`Document`].
pub trait Converter {
    /// Short lowercase name of the format.
    fn name(&self) -> &'static str;

    /// Cheap structural sniff. Never fails, returns `false` on anything odd.
    fn can_recognize(&self, content: &[u8]) -> bool;

    fn parse(&self, content: &[u8]) -> Result<Document, ConvertError>;

    fn serialize(&self, document: &Document) -> Vec<u8>;
}

/// Formats known to the dispatcher, in sniffing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ttml,
    Srt,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Ttml, Format::Srt];

    pub fn converter(self) -> Box<dyn Converter> {
        match self {
            Format::Ttml => Box::new(TtmlConverter::default()),
            Format::Srt => Box::new(SrtConverter),
        }
    }

    /// Map a file extension (without the dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => Some(Format::Srt),
            "ttml" | "dfxp" | "xml" => Some(Format::Ttml),
            _ => None,
        }
    }

    /// Pick the first format whose converter recognizes `content`.
    pub fn detect(content: &[u8]) -> Option<Format> {
        let found = Format::ALL
            .into_iter()
            .find(|format| format.converter().can_recognize(content));
        debug!("detected format {:?}", found);
        found
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Ttml => "ttml",
            Format::Srt => "srt",
        })
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::from_extension(s).ok_or_else(|| format!("unknown format: {s}"))
    }
}

/// Detect the format of `content` and parse it.
pub fn parse_auto(content: &[u8]) -> Result<(Document, Format), ConvertError> {
    trace!("parse_auto(len={})", content.len());
    let format = Format::detect(content).ok_or(ConvertError::UnrecognizedFormat)?;
    let converter = format.converter();
    debug!("parsing with the {} converter", converter.name());
    let document = converter.parse(content)?;
    Ok((document, format))
}

/// Parse `content` in whatever format it is in and serialize it as `to`.
pub fn convert(content: &[u8], to: Format) -> Result<Vec<u8>, ConvertError> {
    let (document, from) = parse_auto(content)?;
    debug!("converting {} captions from {from} to {to}", document.len());
    Ok(to.converter().serialize(&document))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRT: &str = "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n";
    const TTML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<tt xmlns="http://www.w3.org/ns/ttml"><body><div>
<p begin="1s" end="2.5s">Hello</p>
</div></body></tt>"#;

    #[test]
    fn detects_each_format() {
        assert_eq!(Format::detect(SRT.as_bytes()), Some(Format::Srt));
        assert_eq!(Format::detect(TTML.as_bytes()), Some(Format::Ttml));
        assert_eq!(Format::detect(b"just some words"), None);
    }

    #[test]
    fn maps_extensions() {
        assert_eq!(Format::from_extension("SRT"), Some(Format::Srt));
        assert_eq!(Format::from_extension("dfxp"), Some(Format::Ttml));
        assert_eq!(Format::from_extension("vtt"), None);
        assert_eq!("ttml".parse::<Format>(), Ok(Format::Ttml));
    }

    #[test]
    fn converts_srt_to_ttml_and_back() {
        let ttml = convert(SRT.as_bytes(), Format::Ttml).unwrap();
        let text = String::from_utf8(ttml.clone()).unwrap();
        assert!(text.contains(r#"begin="1s""#));
        assert!(text.contains(r#"end="2.5s""#));

        let srt = convert(&ttml, Format::Srt).unwrap();
        assert_eq!(
            String::from_utf8(srt).unwrap(),
            "1\r\n00:00:01,000 --> 00:00:02,500\r\nHello"
        );
    }

    #[test]
    fn unknown_content_is_rejected() {
        assert!(matches!(
            parse_auto(b"nothing to see"),
            Err(ConvertError::UnrecognizedFormat)
        ));
    }
}
