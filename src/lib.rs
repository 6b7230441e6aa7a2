//! OFX Parser
//!
//! Parser for Open Financial Exchange documents, both the OFXv1 SGML
//! serialization (with omitted closing tags) and OFXv2 XML, producing typed
//! statements, transactions, positions and security records.

mod error;
pub mod codes;
pub mod convert;
pub mod datetime;
pub mod header;
pub mod models;
mod parse;
pub mod response;
pub mod schema;
pub mod sgml;
pub mod tree;
mod types;
pub mod xml;

pub use codes::{OfxCode, Severity};
pub use convert::{Aggregate, Converter, FieldValue};
pub use datetime::OfxDateTime;
pub use error::{ConversionError, HeaderError, ParseError, Result};
pub use header::{make_header, read_header, OfxHeader, Serialization};
pub use models::{
    Account, Balance, BalanceAmount, BankTransaction, InvestmentTransaction, Position,
    SecId, SecurityDetails, SecurityInfo, SignOn, Statement, StatementKind, Status,
    Transaction,
};
pub use parse::{parse_document, parse_ofx, parse_ofx_file, parse_ofx_files, parse_ofx_to_json};
pub use response::OfxResponse;
pub use schema::Registry;
pub use tree::{ElementTree, Node, NodeId};
pub use types::{OfxDocument, ParseOptions, Warning};
