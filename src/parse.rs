//! OFX parsing entry points

use crate::error::Result;
use crate::header::{read_header, Serialization};
use crate::response::{assemble, OfxResponse};
use crate::schema::Registry;
use crate::tree::Origin;
use crate::types::{OfxDocument, ParseOptions};
use crate::{sgml, xml};
use rayon::prelude::*;
use std::path::Path;
use tracing::debug;

/// Parse an OFX file using memory mapping
pub fn parse_ofx_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<OfxResponse> {
    let file = std::fs::File::open(path)?;
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    parse_ofx(&mmap, options)
}

/// Parse OFX from a byte slice
pub fn parse_ofx(data: &[u8], options: &ParseOptions) -> Result<OfxResponse> {
    let document = parse_document(data, options)?;
    assemble(document, Registry::global(), options.strict)
}

/// Read the header and build the element tree without typed conversion.
pub fn parse_document(data: &[u8], options: &ParseOptions) -> Result<OfxDocument> {
    let (header, body_offset) = read_header(data)?;
    let body = header.decode_body(&data[body_offset..], options.encoding.as_deref())?;
    let origin = Origin::at(data, body_offset);
    let registry = Registry::global();

    debug!(
        serialization = ?header.serialization,
        version = header.version,
        encoding = %header.text_encoding,
        "read OFX header"
    );

    let tree = match header.serialization {
        Serialization::Sgml => sgml::build_tree(&body, registry, origin)?,
        Serialization::Xml => xml::build_tree(&body, registry, origin)?,
    };
    Ok(OfxDocument { header, tree })
}

/// Parse many independent files, one result per path in input order.
pub fn parse_ofx_files<P>(paths: &[P], options: &ParseOptions) -> Vec<Result<OfxResponse>>
where
    P: AsRef<Path> + Sync,
{
    if options.parallel && paths.len() > 1 {
        paths
            .par_iter()
            .map(|path| parse_ofx_file(path, options))
            .collect()
    } else {
        paths
            .iter()
            .map(|path| parse_ofx_file(path, options))
            .collect()
    }
}

/// Parse OFX and return the response serialized as JSON bytes.
pub fn parse_ofx_to_json(data: &[u8], options: &ParseOptions) -> Result<Vec<u8>> {
    let response = parse_ofx(data, options)?;
    Ok(serde_json::to_vec(&response)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HeaderError, ParseError};

    const SGML: &[u8] = b"OFXHEADER:100\r\nDATA:OFXSGML\r\nVERSION:102\r\nSECURITY:NONE\r\n\
        ENCODING:USASCII\r\nCHARSET:1252\r\nCOMPRESSION:NONE\r\nOLDFILEUID:NONE\r\nNEWFILEUID:NONE\r\n\r\n\
        <OFX><SIGNONMSGSRSV1><SONRS><STATUS><CODE>0<SEVERITY>INFO</STATUS>\
        <DTSERVER>20141201161144<LANGUAGE>ENG<FI><ORG>Caf\xe9 Bank<FID>99</FI></SONRS></SIGNONMSGSRSV1></OFX>";

    #[test]
    fn test_parse_sgml_document() {
        let resp = parse_ofx(SGML, &ParseOptions::new()).unwrap();
        assert_eq!(resp.header.version, 102);
        assert_eq!(resp.organization(), Some("Café Bank"));
        assert_eq!(resp.fid(), Some("99"));
    }

    #[test]
    fn test_encoding_override() {
        let options = ParseOptions::new().with_encoding("utf-8");
        let resp = parse_ofx(SGML, &options).unwrap();
        assert_eq!(resp.organization(), Some("Caf\u{fffd} Bank"));

        let options = ParseOptions::new().with_encoding("klingon");
        let err = parse_ofx(SGML, &options).unwrap_err();
        assert!(matches!(err, ParseError::Header(HeaderError::UnsupportedEncoding(_))));
    }

    #[test]
    fn test_markup_error_reports_document_line() {
        let data = b"OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\n\n<OFX>\n</BOGUS>";
        match parse_document(data, &ParseOptions::new()).unwrap_err() {
            ParseError::MalformedMarkup { line, offset, .. } => {
                assert_eq!(line, 6);
                assert_eq!(&data[offset..offset + 8], b"</BOGUS>");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_json_export() {
        let json = parse_ofx_to_json(SGML, &ParseOptions::new()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["signon"]["fi"]["fid"], "99");
        assert_eq!(value["header"]["version"], 102);
    }
}
