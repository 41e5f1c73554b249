//! Canonical TTML output.

use quick_xml::escape::escape;
use tracing::trace;

use super::time;
use crate::Document;

const INDENT: &str = "  ";

/// Render `document` as a TTML file in `language`.
pub(crate) fn write(document: &Document, language: &str) -> String {
    trace!("writer::write(captions={}, language={language})", document.len());
    let mut output = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?>
<tt xmlns="http://www.w3.org/ns/ttml" xmlns:ttp="http://www.w3.org/ns/ttml#parameter" xmlns:tts="http://www.w3.org/ns/ttml#styling" ttp:timeBase="media" xml:lang=""#,
    );
    output.push_str(&escape(language));
    output.push_str(
        r#"">
  <head>
    <styling>
      <style xml:id="s1" tts:color="white" tts:fontFamily="proportionalSansSerif" tts:textAlign="center"/>
    </styling>
    <layout>
      <region xml:id="bottom" tts:origin="10% 80%" tts:extent="80% 20%" tts:displayAlign="after"/>
    </layout>
  </head>
  <body style="s1" region="bottom">
    <div>
"#,
    );

    for caption in document {
        let text = caption
            .lines
            .iter()
            .map(|line| escape(line.as_str()))
            .collect::<Vec<_>>()
            .join("<br/>");
        output.push_str(&format!(
            "{INDENT}{INDENT}{INDENT}<p begin=\"{}\" end=\"{}\">{text}</p>\n",
            time::format(caption.start),
            time::format(caption.end),
        ));
    }

    output.push_str(
        r#"    </div>
  </body>
</tt>
"#,
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_paragraph_per_caption() {
        let doc = Document::new()
            .add(0.3, 8.456, ["test"])
            .add(10.0, 12.5, ["one", "two"]);
        let out = write(&doc, "en");
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<tt "));
        assert!(out.contains(r#"xml:lang="en""#));
        assert!(out.contains("      <p begin=\"0.3s\" end=\"8.456s\">test</p>\n"));
        assert!(out.contains("      <p begin=\"10s\" end=\"12.5s\">one<br/>two</p>\n"));
        assert!(out.ends_with("</tt>\n"));
    }

    #[test]
    fn escapes_markup_in_text() {
        let doc = Document::new().add(0.0, 1.0, ["Tom & <Jerry>"]);
        assert!(write(&doc, "en").contains(">Tom &amp; &lt;Jerry&gt;</p>"));
    }

    #[test]
    fn empty_caption_is_an_empty_paragraph() {
        let doc = Document::new().add(1.0, 2.0, Vec::<String>::new());
        assert!(write(&doc, "de").contains(r#"<p begin="1s" end="2s"></p>"#));
    }

    #[test]
    fn empty_document_still_has_a_body() {
        let out = write(&Document::new(), "en");
        assert!(out.contains("<div>\n    </div>"));
    }
}
