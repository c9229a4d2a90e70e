//! Envelope unwrapping.
//!
//! XML feeds wrap the payload directly in `<Cat62Surveillance>`; JSON feeds
//! wrap it in `<Cat62SurveillanceJSON><PlainText>`. The payload is the raw
//! inner markup of that element, sliced out of the envelope as-is.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::feeds::FeedFormat;
use crate::utils::error::EnvelopeError;

pub const XML_ROOT: &str = "Cat62Surveillance";
pub const JSON_ROOT: &str = "Cat62SurveillanceJSON";
pub const JSON_TEXT: &str = "PlainText";

/// Returns the payload carried by `envelope`, borrowed from it.
pub fn decode(format: FeedFormat, envelope: &[u8]) -> Result<&[u8], EnvelopeError> {
    match format {
        FeedFormat::RawXml => decode_xml(envelope),
        FeedFormat::RawJson | FeedFormat::GzippedJson => decode_json(envelope),
    }
}

fn decode_xml(envelope: &[u8]) -> Result<&[u8], EnvelopeError> {
    let mut reader = Reader::from_reader(envelope);
    match open_root(&mut reader, XML_ROOT)? {
        Root::Empty => Ok(&[]),
        Root::Open => inner(&mut reader, envelope, XML_ROOT),
    }
}

fn decode_json(envelope: &[u8]) -> Result<&[u8], EnvelopeError> {
    let mut reader = Reader::from_reader(envelope);
    if let Root::Empty = open_root(&mut reader, JSON_ROOT)? {
        return Err(EnvelopeError::MissingElement(JSON_TEXT));
    }

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == JSON_TEXT.as_bytes() => {
                return inner(&mut reader, envelope, JSON_TEXT);
            }
            Event::Empty(e) if e.name().as_ref() == JSON_TEXT.as_bytes() => return Ok(&[]),
            Event::Start(e) => {
                // sibling metadata
                reader.read_to_end(e.name())?;
            }
            Event::End(_) | Event::Eof => return Err(EnvelopeError::MissingElement(JSON_TEXT)),
            _ => {}
        }
    }
}

enum Root {
    Open,
    Empty,
}

/// Skips the prolog and checks the root element's name.
fn open_root(reader: &mut Reader<&[u8]>, expected: &'static str) -> Result<Root, EnvelopeError> {
    loop {
        let (root, name) = match reader.read_event()? {
            Event::Start(e) => (Root::Open, e.name().as_ref().to_vec()),
            Event::Empty(e) => (Root::Empty, e.name().as_ref().to_vec()),
            Event::Eof => return Err(EnvelopeError::Empty),
            _ => continue,
        };
        if name != expected.as_bytes() {
            return Err(EnvelopeError::UnexpectedRoot {
                expected,
                found: String::from_utf8_lossy(&name).into_owned(),
            });
        }
        return Ok(root);
    }
}

/// Raw bytes between the start tag just read and its matching end tag.
fn inner<'a>(
    reader: &mut Reader<&'a [u8]>,
    envelope: &'a [u8],
    name: &'static str,
) -> Result<&'a [u8], EnvelopeError> {
    let span = reader.read_to_end(quick_xml::name::QName(name.as_bytes()))?;
    Ok(&envelope[span.start as usize..span.end as usize])
}
