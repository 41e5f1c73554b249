//! Dialect detection by root element.

use std::fmt;

use tracing::debug;

use super::time::FourthField;
use super::tree::Element;
use crate::ConvertError;

/// Root element names of every supported dialect.
pub(crate) const ROOT_NAMES: [&str; 5] = ["tt", "DCSubtitle", "SubtitleReel", "Subtitle", "transcript"];

const EBU_NAMESPACE_PREFIX: &str = "urn:ebu:tt";

/// The XML caption schemas this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    /// W3C TTML / DFXP, media or SMPTE time base.
    Ttml,
    /// TTML constrained by the EBU-TT-D profile.
    EbuTtD,
    /// Interop cinema subtitles, `<DCSubtitle>`.
    DcSubtitle,
    /// SMPTE ST 428-7 cinema subtitles, `<SubtitleReel>`.
    SubtitleReel,
    /// `<Subtitle>` of `<Paragraph>` entries with millisecond fields.
    ParagraphList,
    /// `<transcript>` of `<text start dur>` entries.
    Transcript,
}

impl DialectKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ttml => "ttml",
            Self::EbuTtD => "ebu-tt-d",
            Self::DcSubtitle => "dcsubtitle",
            Self::SubtitleReel => "subtitle-reel",
            Self::ParagraphList => "paragraph-list",
            Self::Transcript => "transcript",
        }
    }

    /// How `H:M:S:X` timecodes are read in this dialect.
    pub fn fourth_field(self) -> FourthField {
        match self {
            Self::Ttml | Self::SubtitleReel => FourthField::Frames,
            Self::DcSubtitle => FourthField::Milliseconds,
            Self::EbuTtD | Self::ParagraphList | Self::Transcript => FourthField::Rejected,
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick the dialect of a parsed document.
pub(crate) fn detect(root: &Element) -> Result<DialectKind, ConvertError> {
    let kind = match root.name.as_str() {
        "tt" if is_ebu_tt_d(root) => Some(DialectKind::EbuTtD),
        "tt" => Some(DialectKind::Ttml),
        "DCSubtitle" => Some(DialectKind::DcSubtitle),
        "SubtitleReel" => Some(DialectKind::SubtitleReel),
        "Subtitle" if root.elements().all(|e| e.name == "Paragraph") => {
            Some(DialectKind::ParagraphList)
        }
        "transcript" if root.elements().all(|e| e.name == "text") => Some(DialectKind::Transcript),
        _ => None,
    };
    debug!("root <{}> detected as {:?}", root.name, kind);
    kind.ok_or_else(|| ConvertError::UnrecognizedSchema {
        root: root.name.clone(),
    })
}

/// EBU-TT-D documents declare an EBU namespace and run on media time
/// without frames. Other TTML profiles borrow EBU styling namespaces while
/// using SMPTE frame timecodes, so the namespace alone is not enough.
fn is_ebu_tt_d(root: &Element) -> bool {
    root.namespaces
        .iter()
        .any(|ns| ns.starts_with(EBU_NAMESPACE_PREFIX))
        && root.attr_non_empty("timeBase").map_or(true, |base| base == "media")
        && root.attr_non_empty("frameRate").is_none()
}

#[cfg(test)]
mod tests {
    use super::super::tree;
    use super::*;

    fn detect_str(xml: &str) -> Result<DialectKind, ConvertError> {
        detect(&tree::parse(xml.as_bytes()).unwrap())
    }

    #[test]
    fn detects_each_root() {
        assert_eq!(detect_str(r#"<tt xmlns="http://www.w3.org/ns/ttml"/>"#).unwrap(), DialectKind::Ttml);
        assert_eq!(
            detect_str(r#"<tt:tt xmlns:tt="http://www.w3.org/ns/ttml" xmlns:ebuttm="urn:ebu:tt:metadata"/>"#).unwrap(),
            DialectKind::EbuTtD
        );
        assert_eq!(detect_str("<DCSubtitle Version=\"1.0\"/>").unwrap(), DialectKind::DcSubtitle);
        assert_eq!(
            detect_str(r#"<SubtitleReel xmlns="http://www.smpte-ra.org/schemas/428-7/2014/DCST"/>"#).unwrap(),
            DialectKind::SubtitleReel
        );
        assert_eq!(
            detect_str("<Subtitle><Paragraph/></Subtitle>").unwrap(),
            DialectKind::ParagraphList
        );
        assert_eq!(detect_str("<transcript><text/></transcript>").unwrap(), DialectKind::Transcript);
    }

    #[test]
    fn ebu_namespace_with_smpte_timing_is_plain_ttml() {
        let xml = r#"<tt xmlns:ebutts="urn:ebu:tt:style" xmlns:ttp="p" ttp:frameRate="30" ttp:timeBase="smpte"/>"#;
        assert_eq!(detect_str(xml).unwrap(), DialectKind::Ttml);
        let xml = r#"<tt xmlns:ebutts="urn:ebu:tt:style" xmlns:ttp="p" ttp:timeBase="media"/>"#;
        assert_eq!(detect_str(xml).unwrap(), DialectKind::EbuTtD);
    }

    #[test]
    fn secondary_probe_rejects_foreign_children() {
        assert!(matches!(
            detect_str("<Subtitle><Text/></Subtitle>"),
            Err(ConvertError::UnrecognizedSchema { .. })
        ));
        assert!(matches!(
            detect_str("<html><body/></html>"),
            Err(ConvertError::UnrecognizedSchema { root }) if root == "html"
        ));
    }

    #[test]
    fn root_names_cover_every_dialect() {
        for name in ROOT_NAMES {
            assert!(detect_str(&format!("<{name}/>")).is_ok(), "{name}");
        }
    }
}
