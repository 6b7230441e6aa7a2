//! OFX header reader
//!
//! OFXv1 documents open with colon-delimited `DIRECTIVE:VALUE` lines ended by
//! a blank line; OFXv2 documents open with an XML declaration followed by an
//! `<?OFX ...?>` processing instruction. The header decides which tree
//! builder runs and how the body bytes are decoded.

use crate::error::HeaderError;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use memchr::memmem;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const XML_DECL: &[u8] = b"<?xml";
const OFX_PI: &[u8] = b"<?OFX";
const PI_END: &[u8] = b"?>";

const V1_VERSIONS: &[u16] = &[102, 103, 151, 160];
const V2_VERSIONS: &[u16] = &[200, 201, 202, 203, 210, 211, 220];
const FILE_UID_MAX: usize = 36;

/// Body serialization announced by the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Serialization {
    Sgml,
    Xml,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfxHeader {
    pub serialization: Serialization,
    pub version: u16,
    pub security: String,
    /// Name of the text encoding used to decode the body.
    pub text_encoding: String,
    pub old_file_uid: String,
    pub new_file_uid: String,
    /// Every directive (v1) or processing-instruction attribute (v2), as written.
    pub directives: Vec<(String, String)>,
}

impl OfxHeader {
    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn major_version(&self) -> u16 {
        self.version / 100
    }

    pub fn encoding(&self) -> &'static Encoding {
        Encoding::for_label(self.text_encoding.as_bytes()).unwrap_or(UTF_8)
    }

    /// Decode `body` with the header's encoding, or with `override_label`
    /// when the transport supplied one out of band.
    pub fn decode_body<'a>(
        &self,
        body: &'a [u8],
        override_label: Option<&str>,
    ) -> Result<Cow<'a, str>, HeaderError> {
        let encoding = match override_label {
            Some(label) => resolve_encoding(label)?,
            None => self.encoding(),
        };
        Ok(encoding.decode_without_bom_handling(body).0)
    }
}

/// Look up an encoding label, accepting the OFX spelling `USASCII` and bare
/// Windows code page numbers.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, HeaderError> {
    let label = label.trim();
    if label.eq_ignore_ascii_case("USASCII") {
        return Ok(WINDOWS_1252);
    }
    Encoding::for_label(label.as_bytes())
        .or_else(|| {
            if !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit()) {
                Encoding::for_label(format!("windows-{label}").as_bytes())
            } else {
                None
            }
        })
        .ok_or_else(|| HeaderError::UnsupportedEncoding(label.to_string()))
}

/// Parse the header at the start of `data`.
///
/// Returns the header and the byte offset at which the body begins.
pub fn read_header(data: &[u8]) -> Result<(OfxHeader, usize), HeaderError> {
    let mut start = 0;
    if data.starts_with(UTF8_BOM) {
        start = UTF8_BOM.len();
    }
    start += data[start..]
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();

    let rest = &data[start..];
    if rest.is_empty() {
        return Err(HeaderError::Malformed("document is empty".into()));
    }
    if starts_with_ignore_case(rest, XML_DECL) || rest.starts_with(OFX_PI) {
        read_v2(data, start)
    } else {
        read_v1(data, start)
    }
}

fn read_v1(data: &[u8], start: usize) -> Result<(OfxHeader, usize), HeaderError> {
    let region_end = v1_region_end(data, start);
    let region = std::str::from_utf8(&data[start..region_end])
        .map_err(|_| HeaderError::Malformed("OFX header contains non-ASCII bytes".into()))?;

    let mut directives = Vec::new();
    for token in region.split_ascii_whitespace() {
        let (key, value) = token.split_once(':').ok_or_else(|| {
            HeaderError::Malformed(format!("expected DIRECTIVE:VALUE, found {token:?}"))
        })?;
        directives.push((key.to_string(), value.to_string()));
    }
    let lookup = |name: &str| {
        directives
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let ofxheader = lookup("OFXHEADER")
        .ok_or_else(|| HeaderError::MissingDirective("OFXHEADER".into()))?;
    expect_one_of("OFXHEADER", ofxheader, &["100"])?;
    let kind = lookup("DATA").ok_or_else(|| HeaderError::MissingDirective("DATA".into()))?;
    expect_one_of("DATA", kind, &["OFXSGML"])?;
    let version = lookup("VERSION")
        .ok_or_else(|| HeaderError::MissingDirective("VERSION".into()))?;
    let version = parse_version(version, V1_VERSIONS)?;

    let security = lookup("SECURITY").unwrap_or("NONE");
    expect_one_of("SECURITY", security, &["NONE", "TYPE1"])?;
    let encoding = lookup("ENCODING").unwrap_or("USASCII");
    expect_one_of("ENCODING", encoding, &["USASCII", "UNICODE", "UTF-8"])?;
    let charset = lookup("CHARSET").unwrap_or("NONE");
    let compression = lookup("COMPRESSION").unwrap_or("NONE");
    expect_one_of("COMPRESSION", compression, &["NONE"])?;
    let old_file_uid = file_uid("OLDFILEUID", lookup("OLDFILEUID"))?;
    let new_file_uid = file_uid("NEWFILEUID", lookup("NEWFILEUID"))?;

    let text_encoding = v1_encoding(encoding, charset)?.name().to_string();

    let header = OfxHeader {
        serialization: Serialization::Sgml,
        version,
        security: security.to_string(),
        text_encoding,
        old_file_uid,
        new_file_uid,
        directives,
    };
    Ok((header, region_end))
}

/// The directive block ends at the first blank line or the first `<`,
/// whichever comes first.
fn v1_region_end(data: &[u8], start: usize) -> usize {
    let first_tag = memchr::memchr(b'<', &data[start..])
        .map(|pos| start + pos)
        .unwrap_or(data.len());

    let mut line_start = start;
    while line_start < first_tag {
        let line_end = memchr::memchr(b'\n', &data[line_start..first_tag])
            .map(|pos| line_start + pos)
            .unwrap_or(first_tag);
        let line = &data[line_start..line_end];
        if line.iter().all(|b| b.is_ascii_whitespace()) && line_start > start {
            return line_end;
        }
        line_start = line_end + 1;
    }
    first_tag
}

fn v1_encoding(encoding: &str, charset: &str) -> Result<&'static Encoding, HeaderError> {
    if matches!(encoding, "UTF-8" | "UNICODE") {
        return Ok(UTF_8);
    }
    match charset {
        "NONE" => Ok(UTF_8),
        "1252" | "ISO-8859-1" | "8859-1" => Ok(WINDOWS_1252),
        other => resolve_encoding(other),
    }
}

fn read_v2(data: &[u8], start: usize) -> Result<(OfxHeader, usize), HeaderError> {
    let mut pos = start;
    let mut xml_encoding: Option<String> = None;

    if starts_with_ignore_case(&data[pos..], XML_DECL) {
        let (attrs, end) = processing_instruction(data, pos, XML_DECL.len())?;
        xml_encoding = attrs
            .iter()
            .find(|(key, _)| key == "encoding")
            .map(|(_, value)| value.clone());
        pos = end;
        pos += data[pos..]
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
    }

    if !data[pos..].starts_with(OFX_PI) {
        return Err(HeaderError::MissingDirective("<?OFX ...?> processing instruction".into()));
    }
    let (directives, end) = processing_instruction(data, pos, OFX_PI.len())?;
    let lookup = |name: &str| {
        directives
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let ofxheader = lookup("OFXHEADER")
        .ok_or_else(|| HeaderError::MissingDirective("OFXHEADER".into()))?;
    expect_one_of("OFXHEADER", ofxheader, &["200"])?;
    let version = lookup("VERSION")
        .ok_or_else(|| HeaderError::MissingDirective("VERSION".into()))?;
    let version = parse_version(version, V2_VERSIONS)?;
    let security = lookup("SECURITY").unwrap_or("NONE");
    expect_one_of("SECURITY", security, &["NONE", "TYPE1"])?;
    let old_file_uid = file_uid("OLDFILEUID", lookup("OLDFILEUID"))?;
    let new_file_uid = file_uid("NEWFILEUID", lookup("NEWFILEUID"))?;

    let encoding = match xml_encoding.as_deref() {
        Some(label) => resolve_encoding(label)?,
        None => UTF_8,
    };

    let header = OfxHeader {
        serialization: Serialization::Xml,
        version,
        security: security.to_string(),
        text_encoding: encoding.name().to_string(),
        old_file_uid,
        new_file_uid,
        directives,
    };
    Ok((header, end))
}

/// Parse `<?target name="value" ...?>` starting at `pos`; returns the
/// attributes and the offset just past `?>`.
fn processing_instruction(
    data: &[u8],
    pos: usize,
    target_len: usize,
) -> Result<(Vec<(String, String)>, usize), HeaderError> {
    let close = memmem::find(&data[pos..], PI_END)
        .map(|rel| pos + rel)
        .ok_or_else(|| HeaderError::Malformed("unterminated processing instruction".into()))?;
    let content = std::str::from_utf8(&data[pos + target_len..close])
        .map_err(|_| HeaderError::Malformed("processing instruction is not valid UTF-8".into()))?;
    Ok((parse_attributes(content)?, close + PI_END.len()))
}

fn parse_attributes(content: &str) -> Result<Vec<(String, String)>, HeaderError> {
    let mut attrs = Vec::new();
    let mut rest = content.trim_start();
    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| HeaderError::Malformed(format!("expected name=\"value\" in {rest:?}")))?;
        let name = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let quote = after
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| HeaderError::Malformed(format!("unquoted value for {name}")))?;
        let value_end = after[1..]
            .find(quote)
            .ok_or_else(|| HeaderError::Malformed(format!("unterminated value for {name}")))?;
        attrs.push((name.to_string(), after[1..1 + value_end].to_string()));
        rest = after[value_end + 2..].trim_start();
    }
    Ok(attrs)
}

fn expect_one_of(directive: &str, value: &str, allowed: &[&str]) -> Result<(), HeaderError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(HeaderError::InvalidValue {
            directive: directive.to_string(),
            value: value.to_string(),
        })
    }
}

fn parse_version(value: &str, allowed: &[u16]) -> Result<u16, HeaderError> {
    value
        .parse::<u16>()
        .ok()
        .filter(|version| allowed.contains(version))
        .ok_or_else(|| HeaderError::UnsupportedVersion(value.to_string()))
}

fn file_uid(directive: &str, value: Option<&str>) -> Result<String, HeaderError> {
    let value = value.unwrap_or("NONE");
    if value.chars().count() > FILE_UID_MAX {
        return Err(HeaderError::InvalidValue {
            directive: directive.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

fn starts_with_ignore_case(data: &[u8], prefix: &[u8]) -> bool {
    data.len() >= prefix.len() && data[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Build a header for `version`, routed to v1 or v2 by its major number.
pub fn make_header(
    version: u16,
    security: Option<&str>,
    old_file_uid: Option<&str>,
    new_file_uid: Option<&str>,
) -> Result<OfxHeader, HeaderError> {
    let security = security.unwrap_or("NONE");
    expect_one_of("SECURITY", security, &["NONE", "TYPE1"])?;
    let old = file_uid("OLDFILEUID", old_file_uid)?;
    let new = file_uid("NEWFILEUID", new_file_uid)?;

    let (serialization, directives) = match version / 100 {
        1 => {
            parse_version(&version.to_string(), V1_VERSIONS)?;
            let directives = [
                ("OFXHEADER", "100".to_string()),
                ("DATA", "OFXSGML".to_string()),
                ("VERSION", version.to_string()),
                ("SECURITY", security.to_string()),
                ("ENCODING", "USASCII".to_string()),
                ("CHARSET", "NONE".to_string()),
                ("COMPRESSION", "NONE".to_string()),
                ("OLDFILEUID", old.clone()),
                ("NEWFILEUID", new.clone()),
            ];
            (Serialization::Sgml, directives.to_vec())
        }
        2 => {
            parse_version(&version.to_string(), V2_VERSIONS)?;
            let directives = [
                ("OFXHEADER", "200".to_string()),
                ("VERSION", version.to_string()),
                ("SECURITY", security.to_string()),
                ("OLDFILEUID", old.clone()),
                ("NEWFILEUID", new.clone()),
            ];
            (Serialization::Xml, directives.to_vec())
        }
        _ => return Err(HeaderError::UnsupportedVersion(version.to_string())),
    };

    Ok(OfxHeader {
        serialization,
        version,
        security: security.to_string(),
        text_encoding: UTF_8.name().to_string(),
        old_file_uid: old,
        new_file_uid: new,
        directives: directives
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    })
}

impl fmt::Display for OfxHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.serialization {
            Serialization::Sgml => {
                for (key, value) in &self.directives {
                    write!(f, "{key}:{value}\r\n")?;
                }
                write!(f, "\r\n")
            }
            Serialization::Xml => {
                write!(
                    f,
                    "<?xml version=\"1.0\" encoding=\"{}\" standalone=\"no\"?>\r\n<?OFX",
                    self.text_encoding
                )?;
                for (key, value) in &self.directives {
                    write!(f, " {key}=\"{value}\"")?;
                }
                write!(f, "?>\r\n")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: &[u8] = b"OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\nSECURITY:NONE\nENCODING:USASCII\nCHARSET:1252\nCOMPRESSION:NONE\nOLDFILEUID:NONE\nNEWFILEUID:NONE\n\n<OFX>";

    #[test]
    fn test_sgml_header() {
        let (header, offset) = read_header(SCENARIO_A).unwrap();
        assert_eq!(header.serialization, Serialization::Sgml);
        assert_eq!(header.version, 102);
        assert_eq!(header.text_encoding, "windows-1252");
        assert_eq!(header.directive("CHARSET"), Some("1252"));
        assert_eq!(header.directives.len(), 9);
        assert!(SCENARIO_A[offset..].trim_ascii_start().starts_with(b"<OFX>"));
    }

    #[test]
    fn test_sgml_header_crammed_onto_one_line() {
        let data = b"\r\n\r\nOFXHEADER:100 DATA:OFXSGML VERSION:151 SECURITY:NONE ENCODING:USASCII CHARSET:NONE COMPRESSION:NONE OLDFILEUID:NONE NEWFILEUID:NONE<OFX>";
        let (header, offset) = read_header(data).unwrap();
        assert_eq!(header.version, 151);
        assert_eq!(header.new_file_uid, "NONE");
        assert_eq!(&data[offset..offset + 5], b"<OFX>");
    }

    #[test]
    fn test_sgml_header_defaults_optional_directives() {
        let (header, _) = read_header(b"OFXHEADER:100\r\nDATA:OFXSGML\r\nVERSION:103\r\n\r\n<OFX>").unwrap();
        assert_eq!(header.security, "NONE");
        assert_eq!(header.text_encoding, "UTF-8");
        assert_eq!(header.old_file_uid, "NONE");
    }

    #[test]
    fn test_bom_is_skipped() {
        let mut data = UTF8_BOM.to_vec();
        data.extend_from_slice(SCENARIO_A);
        let (header, _) = read_header(&data).unwrap();
        assert_eq!(header.version, 102);
    }

    #[test]
    fn test_missing_and_invalid_directives() {
        assert_eq!(
            read_header(b"OFXHEADER:100\nDATA:OFXSGML\n\n<OFX>").unwrap_err(),
            HeaderError::MissingDirective("VERSION".into())
        );
        assert_eq!(
            read_header(b"OFXHEADER:100\nDATA:OFXSGML\nVERSION:999\n\n<OFX>").unwrap_err(),
            HeaderError::UnsupportedVersion("999".into())
        );
        assert!(matches!(
            read_header(b"OFXHEADER:100\nDATA:OFXXML\nVERSION:102\n\n<OFX>").unwrap_err(),
            HeaderError::InvalidValue { .. }
        ));
        // Directive names are case sensitive
        assert_eq!(
            read_header(b"ofxheader:100\nDATA:OFXSGML\nVERSION:102\n\n<OFX>").unwrap_err(),
            HeaderError::MissingDirective("OFXHEADER".into())
        );
        assert!(matches!(
            read_header(b"OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\nCHARSET:KLINGON\n\n<OFX>")
                .unwrap_err(),
            HeaderError::UnsupportedEncoding(_)
        ));
        assert!(matches!(
            read_header(b"<OFX><SIGNONMSGSRSV1>").unwrap_err(),
            HeaderError::MissingDirective(_)
        ));
    }

    #[test]
    fn test_xml_header() {
        let data = b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n<?OFX OFXHEADER=\"200\" VERSION=\"211\" SECURITY=\"NONE\" OLDFILEUID=\"NONE\" NEWFILEUID=\"NONE\"?>\n<OFX></OFX>";
        let (header, offset) = read_header(data).unwrap();
        assert_eq!(header.serialization, Serialization::Xml);
        assert_eq!(header.version, 211);
        assert_eq!(header.directive("OFXHEADER"), Some("200"));
        assert_eq!(data[offset..].trim_ascii_start(), b"<OFX></OFX>");
    }

    #[test]
    fn test_xml_header_with_ofx_usascii_encoding() {
        let data = b"<?xml version=\"1.0\" encoding=\"USASCII\"?>\n<?OFX OFXHEADER=\"200\" VERSION=\"220\"?>\n<OFX></OFX>";
        let (header, _) = read_header(data).unwrap();
        assert_eq!(header.encoding(), WINDOWS_1252);
        assert_eq!(resolve_encoding("usascii").unwrap(), WINDOWS_1252);
        assert_eq!(resolve_encoding("1252").unwrap(), WINDOWS_1252);
    }

    #[test]
    fn test_xml_header_without_ofx_instruction() {
        let err = read_header(b"<?xml version=\"1.0\"?><OFX></OFX>").unwrap_err();
        assert!(matches!(err, HeaderError::MissingDirective(_)));
    }

    #[test]
    fn test_rendered_header_parses_back() {
        for version in [102u16, 103, 151, 160, 200, 203, 220] {
            let header = make_header(version, None, None, Some("a1b2")).unwrap();
            let text = header.to_string();
            let (parsed, _) = read_header(text.as_bytes()).unwrap();
            assert_eq!(parsed.version, version);
            assert_eq!(parsed.serialization, header.serialization);
            assert_eq!(parsed.new_file_uid, "a1b2");
        }
        assert!(make_header(300, None, None, None).is_err());
        assert!(make_header(104, None, None, None).is_err());
    }

    #[test]
    fn test_decode_body_with_override() {
        let (header, _) = read_header(SCENARIO_A).unwrap();
        assert_eq!(header.decode_body(b"caf\xe9", None).unwrap(), "café");
        assert_eq!(header.decode_body(b"caf\xc3\xa9", Some("utf-8")).unwrap(), "café");
        assert!(header.decode_body(b"x", Some("nope")).is_err());
    }
}
