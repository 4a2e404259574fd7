//! Extracts RDF embedded in HTML, using either RDFa or Microdata.
//!
//! Parse a [`Document`] once, then hand it to a [`RdfaDecoder`] and/or a
//! [`MicrodataDecoder`]. Each decoder walks the whole document on the first
//! call to [`Decoder::advance`] and replays the resulting [`Statement`]s in a
//! deterministic order.

pub mod bnode;
pub mod datatypes;
mod decoder;
pub mod document;
pub mod microdata;
mod offsets;
pub mod rdfa;
pub mod statement;
pub mod warning;

pub use decoder::{Decoder, MICRODATA_CONTENT_TYPE, RDFA_CONTENT_TYPE};
pub use document::{Document, ParseOptions};
pub use microdata::{MicrodataDecoder, MicrodataOptions};
pub use rdfa::vocab::initial_context_prefixes;
pub use rdfa::{HtmlProfile, RdfaDecoder, RdfaOptions};
pub use statement::{Container, Position, Statement, TextOffsets, TextRange};
pub use warning::{Warning, WarningKind};

/// Errors that stop extraction of a whole document.
///
/// Problems with individual statements are reported as [`Warning`]s instead.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub enum Error {
    #[display("invalid document location: `{location}`")]
    InvalidLocation {
        source: oxiri::IriParseError,
        location: String,
    },

    #[display("invalid base IRI: `{base}`")]
    InvalidBase {
        source: oxiri::IriParseError,
        base: String,
    },
}
