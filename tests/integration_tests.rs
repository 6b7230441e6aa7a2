//! Integration tests - parses the OFX files in tests/data/

use ofxrs::codes::{AccountType, IncomeType, MutualFundType, TransactionType};
use ofxrs::{
    parse_document, parse_ofx, parse_ofx_file, parse_ofx_files, Account, InvestmentTransaction,
    ParseError, ParseOptions, Position, SecId, SecurityDetails, Serialization, Severity,
    StatementKind, Transaction, Warning,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;

fn data_dir() -> PathBuf {
    let dirs = ["tests/data", "data", "../tests/data"];
    for dir in &dirs {
        let path = Path::new(dir);
        if path.exists() {
            return path.to_path_buf();
        }
    }
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data")
}

fn get_test_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(data_dir()) {
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(ext) = path.extension() {
                if ext == "ofx" || ext == "qfx" {
                    files.push(path);
                }
            }
        }
    }
    files.sort();
    files
}

fn fixture(name: &str) -> PathBuf {
    data_dir().join(name)
}

fn dec(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

fn bank_transactions(txns: &[Transaction]) -> Vec<&ofxrs::BankTransaction> {
    txns.iter()
        .map(|txn| match txn {
            Transaction::Bank(trn) => trn,
            other => panic!("expected bank transaction, got {other:?}"),
        })
        .collect()
}

#[test]
fn test_parse_all_files() {
    let files = get_test_files();
    assert!(!files.is_empty(), "no fixtures in {}", data_dir().display());

    for file in &files {
        println!("Processing: {}", file.display());

        let resp = parse_ofx_file(file, &ParseOptions::new())
            .unwrap_or_else(|e| panic!("Failed to parse {}: {e}", file.display()));

        println!("  Version: {}", resp.header.version);
        println!("  FI: {:?} / {:?}", resp.organization(), resp.fid());
        for stmt in &resp.statements {
            println!(
                "    [{}] {:?} account={:?} transactions={}",
                stmt.trnuid,
                stmt.kind,
                stmt.account_id(),
                stmt.transactions().len()
            );
        }

        assert!(resp.signon.status.is_success());
        assert!(resp.errors.is_empty(), "{}: {:?}", file.display(), resp.errors);
        assert!(!resp.statements.is_empty());
    }
}

#[test]
fn test_bank_statement_v1() {
    let resp = parse_ofx_file(fixture("bank_v1.ofx"), &ParseOptions::new()).unwrap();
    assert_eq!(resp.header.serialization, Serialization::Sgml);
    assert_eq!(resp.header.version, 102);
    assert_eq!(resp.organization(), Some("Example Bank"));
    assert_eq!(resp.server_time().utc_offset_minutes, Some(-300));
    assert!(resp.warnings.is_empty(), "{:?}", resp.warnings);

    let stmt = resp.statement("999988").unwrap();
    assert_eq!(stmt.kind, StatementKind::Bank);
    assert_eq!(stmt.currency(), Some("USD"));
    match stmt.account().unwrap() {
        Account::Bank(acct) => {
            assert_eq!(acct.bank_id, "121099999");
            assert_eq!(acct.account_type, AccountType::Checking);
        }
        other => panic!("unexpected account {other:?}"),
    }

    let txns = bank_transactions(stmt.transactions());
    let fitids: Vec<_> = txns.iter().map(|trn| trn.fitid.as_str()).collect();
    assert_eq!(fitids, vec!["00002", "00003", "00004"]);
    assert_eq!(txns[0].transaction_type, TransactionType::Check);
    assert_eq!(txns[0].check_number.as_deref(), Some("1000"));
    assert_eq!(txns[1].amount, dec("-300.00"));
    assert_eq!(txns[1].memo.as_deref(), Some("Main St & 5th"));
    assert_eq!(txns[2].payee_name(), Some("Payroll"));

    assert_eq!(stmt.ledger_balance().unwrap().amount, dec("1000.50"));
}

#[test]
fn test_v1_and_v2_agree() {
    let v1 = parse_ofx_file(fixture("bank_v1.ofx"), &ParseOptions::new()).unwrap();
    let v2 = parse_ofx_file(fixture("bank_v2.ofx"), &ParseOptions::new()).unwrap();
    assert_eq!(v2.header.serialization, Serialization::Xml);
    assert_eq!(v2.header.version, 220);
    assert_eq!(v1.signon, v2.signon);
    assert_eq!(v1.statements, v2.statements);
}

#[test]
fn test_credit_card_crammed_header() {
    let resp = parse_ofx_file(fixture("creditcard_v1.ofx"), &ParseOptions::new()).unwrap();
    assert_eq!(resp.header.version, 103);
    assert_eq!(resp.fid(), Some("7777"));

    let stmt = &resp.statements[0];
    assert_eq!(stmt.kind, StatementKind::CreditCard);
    assert_eq!(stmt.account_id(), Some("4111111111111111"));

    let txns = bank_transactions(stmt.transactions());
    assert_eq!(txns.len(), 3);
    assert_eq!(txns[0].amount, dec("-42.10"));
    assert_eq!(txns[0].name.as_deref(), Some("Café Ünïcode"));
    assert_eq!(
        txns[1].transaction_type,
        TransactionType::Unknown("REFUND".into())
    );
    assert_eq!(txns[2].amount, dec("500"));

    let unknown_codes: Vec<_> = resp
        .warnings
        .iter()
        .filter_map(|w| match w {
            Warning::UnknownCode { field, value, .. } => Some((field.as_str(), value.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(unknown_codes, vec![("TRNTYPE", "REFUND")]);
}

#[test]
fn test_investment_statement() {
    let resp = parse_ofx_file(fixture("investment_v1.ofx"), &ParseOptions::new()).unwrap();
    assert_eq!(resp.signon.status.message.as_deref(), Some("Successful Sign On"));
    // The open order list is declared but not modelled; it must not warn.
    assert!(resp.warnings.is_empty(), "{:?}", resp.warnings);
    assert!(resp.errors.is_empty(), "{:?}", resp.errors);

    let stmt = resp.statement("X0001").unwrap();
    assert_eq!(stmt.kind, StatementKind::Investment);

    let txns = stmt.transactions();
    let fitids: Vec<_> = txns.iter().map(Transaction::fitid).collect();
    assert_eq!(fitids, vec!["t-1", "t-2", "t-3", "t-4"]);

    match &txns[0] {
        Transaction::Investment(InvestmentTransaction::BuyStock { buy, .. }) => {
            assert_eq!(buy.units, dec("10"));
            assert_eq!(buy.commission, Some(dec("4.95")));
            assert_eq!(buy.info.memo.as_deref(), Some("Buy AAPL"));
        }
        other => panic!("unexpected transaction {other:?}"),
    }
    match &txns[1] {
        Transaction::Investment(InvestmentTransaction::Income { income_type, total, .. }) => {
            assert_eq!(*income_type, IncomeType::Dividend);
            assert_eq!(*total, dec("42.17"));
        }
        other => panic!("unexpected transaction {other:?}"),
    }
    match &txns[3] {
        Transaction::Investment(InvestmentTransaction::Bank { transaction, .. }) => {
            assert_eq!(transaction.amount, dec("250.00"));
        }
        other => panic!("unexpected transaction {other:?}"),
    }

    let positions = stmt.positions();
    assert_eq!(positions.len(), 2);
    assert!(matches!(positions[0], Position::Stock { .. }));
    match &positions[1] {
        Position::MutualFund {
            position,
            reinvest_dividends,
            ..
        } => {
            assert_eq!(position.market_value, dec("3075.00"));
            assert_eq!(*reinvest_dividends, Some(true));
        }
        other => panic!("unexpected position {other:?}"),
    }

    let invbal = stmt.body.as_ref().unwrap().investment_balance.as_ref().unwrap();
    assert_eq!(invbal.available_cash, dec("1234.56"));

    // Every position resolves against the security list.
    for position in positions {
        assert!(resp.security(position.sec_id()).is_some());
    }
    let fund = resp.security(&SecId::new("922908363", "CUSIP")).unwrap();
    assert_eq!(fund.ticker.as_deref(), Some("VOO"));
    match &fund.details {
        SecurityDetails::MutualFund { fund_type, .. } => {
            assert_eq!(*fund_type, Some(MutualFundType::OpenEnd));
        }
        other => panic!("unexpected security {other:?}"),
    }
}

#[test]
fn test_unknown_elements_are_tolerated() {
    let resp = parse_ofx_file(fixture("unknown_element.ofx"), &ParseOptions::new()).unwrap();
    let known = parse_ofx_file(fixture("bank_v1.ofx"), &ParseOptions::new()).unwrap();
    assert_eq!(resp.signon, known.signon);
    assert_eq!(resp.statements, known.statements);

    let unknown: Vec<_> = resp
        .warnings
        .iter()
        .filter_map(|w| match w {
            Warning::UnknownElement {
                aggregate, element, ..
            } => Some((aggregate.as_str(), element.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(unknown, vec![("SONRS", "INTU.BID"), ("SONRS", "INTU.USERID")]);

    // Strict mode escalates conversion errors, not warnings.
    assert!(parse_ofx_file(fixture("unknown_element.ofx"), &ParseOptions::strict()).is_ok());
}

#[test]
fn test_parsing_is_idempotent() {
    let data = std::fs::read(fixture("investment_v1.ofx")).unwrap();
    let first = parse_ofx(&data, &ParseOptions::new()).unwrap();
    let second = parse_ofx(&data, &ParseOptions::new()).unwrap();
    assert_eq!(first, second);

    let doc_a = parse_document(&data, &ParseOptions::new()).unwrap();
    let doc_b = parse_document(&data, &ParseOptions::new()).unwrap();
    assert_eq!(doc_a, doc_b);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_failed_request_status() {
    let data = b"OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\n\n\
        <OFX><SIGNONMSGSRSV1><SONRS><STATUS><CODE>0<SEVERITY>INFO</STATUS>\
        <DTSERVER>20240101<LANGUAGE>ENG</SONRS></SIGNONMSGSRSV1>\
        <BANKMSGSRSV1><STMTTRNRS><TRNUID>9<STATUS><CODE>2000<SEVERITY>ERROR\
        <MESSAGE>General error</STATUS></STMTTRNRS></BANKMSGSRSV1></OFX>";
    let resp = parse_ofx(data, &ParseOptions::new()).unwrap();
    assert!(resp.signon.status.is_success());
    assert_eq!(resp.statements.len(), 1);
    let stmt = &resp.statements[0];
    assert_eq!(stmt.status.code, 2000);
    assert_eq!(stmt.status.message.as_deref(), Some("General error"));
    assert!(stmt.body.is_none());
    assert!(stmt.transactions().is_empty());
    assert_eq!(resp.outcome(), Severity::Error);
    assert!(!resp.is_success());
}

#[test]
fn test_batch_keeps_input_order() {
    let paths = vec![
        fixture("investment_v1.ofx"),
        fixture("does_not_exist.ofx"),
        fixture("creditcard_v1.ofx"),
        fixture("bank_v1.ofx"),
    ];
    for options in [ParseOptions::new(), ParseOptions::new().with_parallel(false)] {
        let results = parse_ofx_files(&paths, &options);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().fid(), Some("5000"));
        assert!(matches!(results[1], Err(ParseError::Io(_))));
        assert_eq!(results[2].as_ref().unwrap().fid(), Some("7777"));
        assert_eq!(results[3].as_ref().unwrap().fid(), Some("1001"));
    }
}
