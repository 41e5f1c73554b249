//! Caption conversion between on-disk subtitle formats.
//! Every converter reads into and writes from the shared [`Document`] model.

pub mod caption;
pub mod converter;
pub mod error;
pub mod srt;
pub mod ttml;

pub use caption::{Caption, Document};
pub use converter::{convert, parse_auto, Converter, Format};
pub use error::ConvertError;
pub use srt::SrtConverter;
pub use ttml::TtmlConverter;
