//! Response assembly
//!
//! Converts the whole element tree in one pass, then gathers the session
//! metadata, every statement across all message sets and every security
//! record into an [`OfxResponse`].

use crate::codes::Severity;
use crate::convert::{Aggregate, Converter};
use crate::datetime::OfxDateTime;
use crate::error::{ConversionError, ParseError, Result};
use crate::header::OfxHeader;
use crate::models::{FromAggregate, SecId, SecurityInfo, SignOn, Statement};
use crate::schema::Registry;
use crate::types::{OfxDocument, Warning};
use serde::Serialize;
use tracing::debug;

const SESSION_PATH: &[&str] = &["SIGNONMSGSRSV1", "SONRS", "STATUS"];
const STATEMENT_SETS: &[&str] = &["BANKMSGSRSV1", "CREDITCARDMSGSRSV1", "INVSTMTMSGSRSV1"];

/// Parsed OFX response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfxResponse {
    pub header: OfxHeader,
    pub signon: SignOn,
    /// Statements of every message set, in document order.
    pub statements: Vec<Statement>,
    pub securities: Vec<SecurityInfo>,
    pub warnings: Vec<Warning>,
    /// Items dropped because they failed conversion.
    pub errors: Vec<ConversionError>,
}

impl OfxResponse {
    /// Worst severity across the session status and every statement status.
    pub fn outcome(&self) -> Severity {
        self.statements
            .iter()
            .map(|stmt| &stmt.status.severity)
            .chain(std::iter::once(&self.signon.status.severity))
            .max_by_key(|severity| severity.rank())
            .cloned()
            .unwrap_or(Severity::Info)
    }

    /// Session and all statements report success and nothing was dropped.
    pub fn is_success(&self) -> bool {
        self.signon.status.is_success()
            && self.statements.iter().all(|stmt| stmt.status.is_success())
            && self.errors.is_empty()
    }

    pub fn fid(&self) -> Option<&str> {
        self.signon.fi.as_ref().and_then(|fi| fi.fid.as_deref())
    }

    pub fn organization(&self) -> Option<&str> {
        self.signon.fi.as_ref().and_then(|fi| fi.org.as_deref())
    }

    pub fn server_time(&self) -> &OfxDateTime {
        &self.signon.server_time
    }

    pub fn security(&self, sec_id: &SecId) -> Option<&SecurityInfo> {
        self.securities.iter().find(|sec| &sec.sec_id == sec_id)
    }

    pub fn statement(&self, account_id: &str) -> Option<&Statement> {
        self.statements
            .iter()
            .find(|stmt| stmt.account_id() == Some(account_id))
    }
}

fn collect<T: FromAggregate>(
    converter: &mut Converter<'_>,
    items: &[&Aggregate],
) -> std::result::Result<Vec<T>, ConversionError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match T::from_aggregate(item) {
            Ok(value) => out.push(value),
            Err(err) => converter.isolate(err)?,
        }
    }
    Ok(out)
}

/// Convert a document into an [`OfxResponse`].
pub fn assemble(document: OfxDocument, registry: &Registry, strict: bool) -> Result<OfxResponse> {
    let OfxDocument { header, tree } = document;
    let root = tree
        .root()
        .ok_or_else(|| ParseError::IncompleteResponse("document has no elements".into()))?;
    let root_tag = tree.node(root).tag();
    if root_tag != "OFX" {
        return Err(ParseError::IncompleteResponse(format!(
            "root element is {root_tag}, expected OFX"
        )));
    }
    if tree.find_path(root, SESSION_PATH).is_none() {
        return Err(ParseError::IncompleteResponse(format!(
            "missing session status block OFX/{}",
            SESSION_PATH.join("/")
        )));
    }

    let mut converter = Converter::new(registry, strict);
    let ofx = converter.convert(&tree, root)?;

    let sonrs = ofx.req_aggregate("SIGNONMSGSRSV1")?.req_aggregate("SONRS")?;
    let signon = SignOn::from_aggregate(sonrs)?;

    let wrappers: Vec<&Aggregate> = ofx
        .aggregates()
        .filter(|(tag, _)| STATEMENT_SETS.contains(tag))
        .flat_map(|(_, msgset)| msgset.aggregates().map(|(_, wrapper)| wrapper))
        .collect();
    let statements = collect::<Statement>(&mut converter, &wrappers)?;

    let records: Vec<&Aggregate> = ofx
        .aggregate("SECLISTMSGSRSV1")
        .into_iter()
        .flat_map(|msgset| msgset.all("SECLIST"))
        .flat_map(|seclist| seclist.aggregates().map(|(_, record)| record))
        .collect();
    let securities = collect::<SecurityInfo>(&mut converter, &records)?;

    let (warnings, errors) = converter.into_diagnostics();
    debug!(
        statements = statements.len(),
        securities = securities.len(),
        warnings = warnings.len(),
        errors = errors.len(),
        "assembled OFX response"
    );

    Ok(OfxResponse {
        header,
        signon,
        statements,
        securities,
        warnings,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::read_header;
    use crate::sgml;
    use crate::tree::Origin;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\n\n";

    const SIGNON: &str = "<SIGNONMSGSRSV1><SONRS><STATUS><CODE>0<SEVERITY>INFO</STATUS>\
        <DTSERVER>20141201161144<LANGUAGE>ENG<FI><ORG>Example Bank<FID>1234</FI></SONRS></SIGNONMSGSRSV1>";

    fn response(body: &str, strict: bool) -> Result<OfxResponse> {
        let (header, _) = read_header(HEADER.as_bytes()).unwrap();
        let tree = sgml::build_tree(body, Registry::global(), Origin::default())?;
        assemble(OfxDocument { header, tree }, Registry::global(), strict)
    }

    fn bank_wrapper(trnuid: &str, code: &str, severity: &str, amount: &str) -> String {
        format!(
            "<STMTTRNRS><TRNUID>{trnuid}<STATUS><CODE>{code}<SEVERITY>{severity}</STATUS>\
             <STMTRS><CURDEF>USD<BANKACCTFROM><BANKID>1<ACCTID>{trnuid}<ACCTTYPE>SAVINGS</BANKACCTFROM>\
             <BANKTRANLIST><DTSTART>20240101<DTEND>20240131\
             <STMTTRN><TRNTYPE>DEP<DTPOSTED>20240102<TRNAMT>{amount}<FITID>{trnuid}-1</STMTTRN>\
             </BANKTRANLIST><LEDGERBAL><BALAMT>10<DTASOF>20240131</LEDGERBAL></STMTRS></STMTTRNRS>"
        )
    }

    #[test]
    fn test_session_metadata() {
        let resp = response(&format!("<OFX>{SIGNON}</OFX>"), false).unwrap();
        assert_eq!(resp.fid(), Some("1234"));
        assert_eq!(resp.organization(), Some("Example Bank"));
        assert_eq!(resp.server_time().to_string(), "20141201161144.000");
        assert_eq!(resp.outcome(), Severity::Info);
        assert!(resp.is_success());
        assert!(resp.statements.is_empty());
    }

    #[test]
    fn test_missing_session_block_is_incomplete() {
        let err = response("<OFX><BANKMSGSRSV1></BANKMSGSRSV1></OFX>", false).unwrap_err();
        assert!(matches!(err, ParseError::IncompleteResponse(_)));
        let err = response("<STATUS><CODE>0<SEVERITY>INFO</STATUS>", false).unwrap_err();
        assert!(matches!(err, ParseError::IncompleteResponse(_)));
    }

    #[test]
    fn test_failed_statement_status_is_kept() {
        let body = format!(
            "<OFX>{SIGNON}<BANKMSGSRSV1>{}{}</BANKMSGSRSV1></OFX>",
            bank_wrapper("A", "0", "INFO", "5.00"),
            bank_wrapper("B", "2003", "ERROR", "6.00"),
        );
        let resp = response(&body, false).unwrap();
        assert_eq!(resp.statements.len(), 2);
        assert_eq!(resp.statements[1].status.code, 2003);
        assert_eq!(resp.outcome(), Severity::Error);
        assert!(!resp.is_success());
        assert_eq!(resp.statement("B").unwrap().trnuid, "B");
    }

    #[test]
    fn test_bad_statement_is_isolated() {
        let body = format!(
            "<OFX>{SIGNON}<BANKMSGSRSV1>{}{}</BANKMSGSRSV1></OFX>",
            bank_wrapper("A", "0", "INFO", "5.00"),
            bank_wrapper("B", "0", "INFO", "six"),
        );
        let resp = response(&body, false).unwrap();
        assert_eq!(resp.statements.len(), 2);
        assert_eq!(resp.statements[1].transactions().len(), 0);
        assert_eq!(resp.errors.len(), 1);

        let err = response(&body, true).unwrap_err();
        assert!(matches!(err, ParseError::Conversion(ConversionError::FieldType { .. })));
    }

    #[test]
    fn test_bad_session_is_fatal() {
        let body = "<OFX><SIGNONMSGSRSV1><SONRS><STATUS><CODE>0<SEVERITY>INFO</STATUS>\
                    <DTSERVER>yesterday</SONRS></SIGNONMSGSRSV1></OFX>";
        let err = response(body, false).unwrap_err();
        assert!(matches!(err, ParseError::Conversion(ConversionError::FieldType { .. })));
    }

    #[test]
    fn test_securities_lookup() {
        let body = format!(
            "<OFX>{SIGNON}<SECLISTMSGSRSV1><SECLIST>\
             <STOCKINFO><SECINFO><SECID><UNIQUEID>037833100<UNIQUEIDTYPE>CUSIP</SECID><SECNAME>Apple</SECINFO></STOCKINFO>\
             <OTHERINFO><SECINFO><SECID><UNIQUEID>X1<UNIQUEIDTYPE>OTHER</SECID><SECNAME>Thing</SECINFO></OTHERINFO>\
             </SECLIST></SECLISTMSGSRSV1></OFX>"
        );
        let resp = response(&body, false).unwrap();
        let names: Vec<_> = resp.securities.iter().map(|sec| sec.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "Thing"]);
        let apple = resp.security(&SecId::new("037833100", "CUSIP")).unwrap();
        assert_eq!(apple.uniqueid(), "037833100");
        assert!(resp.security(&SecId::new("nope", "CUSIP")).is_none());
    }
}
