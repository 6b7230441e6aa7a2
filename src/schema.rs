//! Aggregate schema registry
//!
//! Declarative table of every OFX aggregate the parser understands: which
//! children each one expects, their types and cardinality. Built once per
//! process and only ever read afterwards.

use crate::codes::*;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Target type of one child specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text with an optional nominal maximum length.
    Text(Option<usize>),
    Integer,
    Decimal,
    /// `Y` / `N`
    Bool,
    DateTime,
    /// Enumerated code validated against the given value set.
    Code(&'static [&'static str]),
    /// Nested aggregate named by the child's own tag.
    Aggregate,
    /// Declared but deliberately not converted.
    Unsupported,
}

impl FieldKind {
    pub fn is_element(&self) -> bool {
        !matches!(self, FieldKind::Aggregate | FieldKind::Unsupported)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Text(_) => "text",
            FieldKind::Integer => "integer",
            FieldKind::Decimal => "decimal",
            FieldKind::Bool => "boolean (Y/N)",
            FieldKind::DateTime => "date/time",
            FieldKind::Code(_) => "code",
            FieldKind::Aggregate => "aggregate",
            FieldKind::Unsupported => "unsupported element",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Required,
    Optional,
    Repeated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub tag: &'static str,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
}

impl FieldSpec {
    pub fn is_required(&self) -> bool {
        self.cardinality == Cardinality::Required
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }
}

#[derive(Debug)]
pub struct AggregateDef {
    pub tag: &'static str,
    pub fields: &'static [FieldSpec],
    /// Groups of children of which at most one may appear.
    pub exclusive: &'static [&'static [&'static str]],
}

impl AggregateDef {
    pub fn field(&self, tag: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.tag == tag)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|spec| spec.is_required())
    }
}

/// How the SGML builder should treat an opening tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Leaf,
    Container,
    Unknown,
}

pub struct Registry {
    aggregates: HashMap<&'static str, &'static AggregateDef>,
    leaves: HashSet<&'static str>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// Process-wide registry over the built-in OFX tables.
    pub fn global() -> &'static Registry {
        REGISTRY.get_or_init(|| Registry::from_definitions(DEFINITIONS))
    }

    pub fn from_definitions(definitions: &[&'static AggregateDef]) -> Self {
        let mut aggregates = HashMap::with_capacity(definitions.len());
        for def in definitions {
            aggregates.insert(def.tag, *def);
        }
        let leaves = definitions
            .iter()
            .flat_map(|def| def.fields.iter())
            .filter(|spec| spec.kind.is_element() && !aggregates.contains_key(spec.tag))
            .map(|spec| spec.tag)
            .collect();
        Registry { aggregates, leaves }
    }

    pub fn lookup(&self, tag: &str) -> Option<&'static AggregateDef> {
        self.aggregates.get(tag).copied()
    }

    pub fn classify(&self, tag: &str) -> TagClass {
        if self.aggregates.contains_key(tag) {
            TagClass::Container
        } else if self.leaves.contains(tag) {
            TagClass::Leaf
        } else {
            TagClass::Unknown
        }
    }

    pub fn is_leaf(&self, tag: &str) -> bool {
        self.classify(tag) == TagClass::Leaf
    }

    pub fn is_container(&self, tag: &str) -> bool {
        self.classify(tag) == TagClass::Container
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &'static AggregateDef> + '_ {
        self.aggregates.values().copied()
    }
}

const fn req(tag: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { tag, kind, cardinality: Cardinality::Required }
}

const fn opt(tag: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { tag, kind, cardinality: Cardinality::Optional }
}

const fn many(tag: &'static str) -> FieldSpec {
    FieldSpec { tag, kind: FieldKind::Aggregate, cardinality: Cardinality::Repeated }
}

const fn skip(tag: &'static str) -> FieldSpec {
    FieldSpec { tag, kind: FieldKind::Unsupported, cardinality: Cardinality::Optional }
}

const fn text(max: usize) -> FieldKind {
    FieldKind::Text(Some(max))
}

const fn code(codes: &'static [&'static str]) -> FieldKind {
    FieldKind::Code(codes)
}

const INT: FieldKind = FieldKind::Integer;
const DEC: FieldKind = FieldKind::Decimal;
const BOOL: FieldKind = FieldKind::Bool;
const DT: FieldKind = FieldKind::DateTime;
const AGG: FieldKind = FieldKind::Aggregate;

macro_rules! aggregate {
    ($name:ident, [$($field:expr),* $(,)?]) => {
        aggregate!($name, [$($field),*], []);
    };
    ($name:ident, [$($field:expr),* $(,)?], [$($group:expr),* $(,)?]) => {
        static $name: AggregateDef = AggregateDef {
            tag: stringify!($name),
            fields: &[$($field),*],
            exclusive: &[$($group),*],
        };
    };
}

// Session

aggregate!(OFX, [
    req("SIGNONMSGSRSV1", AGG),
    skip("SIGNUPMSGSRSV1"),
    opt("BANKMSGSRSV1", AGG),
    opt("CREDITCARDMSGSRSV1", AGG),
    opt("INVSTMTMSGSRSV1", AGG),
    skip("INTERXFERMSGSRSV1"),
    skip("WIREXFERMSGSRSV1"),
    skip("BILLPAYMSGSRSV1"),
    skip("EMAILMSGSRSV1"),
    opt("SECLISTMSGSRSV1", AGG),
    skip("PRESDIRMSGSRSV1"),
    skip("PRESDLVMSGSRSV1"),
    skip("PROFMSGSRSV1"),
    skip("TAX1099MSGSRSV1"),
]);

aggregate!(SIGNONMSGSRSV1, [req("SONRS", AGG)]);

aggregate!(SONRS, [
    req("STATUS", AGG),
    req("DTSERVER", DT),
    opt("USERKEY", text(64)),
    opt("TSKEYEXPIRE", DT),
    opt("LANGUAGE", text(3)),
    opt("DTPROFUP", DT),
    opt("DTACCTUP", DT),
    opt("FI", AGG),
    opt("SESSCOOKIE", text(1000)),
    opt("ACCESSKEY", text(1000)),
    skip("MFACHALLENGERQ"),
]);

aggregate!(STATUS, [
    req("CODE", INT),
    req("SEVERITY", code(Severity::CODES)),
    opt("MESSAGE", text(255)),
]);

aggregate!(FI, [opt("ORG", text(32)), opt("FID", text(32))]);

// Bank and credit card statements

aggregate!(BANKMSGSRSV1, [many("STMTTRNRS"), skip("STMTENDTRNRS")]);

aggregate!(STMTTRNRS, [
    req("TRNUID", text(36)),
    req("STATUS", AGG),
    opt("CLTCOOKIE", text(32)),
    opt("STMTRS", AGG),
]);

aggregate!(STMTRS, [
    req("CURDEF", text(3)),
    req("BANKACCTFROM", AGG),
    opt("BANKTRANLIST", AGG),
    req("LEDGERBAL", AGG),
    opt("AVAILBAL", AGG),
    opt("CASHADVBALAMT", DEC),
    opt("INTRATE", DEC),
    opt("BALLIST", AGG),
    opt("MKTGINFO", text(360)),
]);

aggregate!(CREDITCARDMSGSRSV1, [many("CCSTMTTRNRS"), skip("CCSTMTENDTRNRS")]);

aggregate!(CCSTMTTRNRS, [
    req("TRNUID", text(36)),
    req("STATUS", AGG),
    opt("CLTCOOKIE", text(32)),
    opt("CCSTMTRS", AGG),
]);

aggregate!(CCSTMTRS, [
    req("CURDEF", text(3)),
    req("CCACCTFROM", AGG),
    opt("BANKTRANLIST", AGG),
    req("LEDGERBAL", AGG),
    opt("AVAILBAL", AGG),
    opt("CASHADVBALAMT", DEC),
    opt("INTRATEPURCH", DEC),
    opt("INTRATECASH", DEC),
    opt("INTRATEXFER", DEC),
    skip("REWARDINFO"),
    opt("BALLIST", AGG),
    opt("MKTGINFO", text(360)),
]);

aggregate!(BANKACCTFROM, [
    req("BANKID", text(9)),
    opt("BRANCHID", text(22)),
    req("ACCTID", text(22)),
    req("ACCTTYPE", code(AccountType::CODES)),
    opt("ACCTKEY", text(22)),
]);

aggregate!(BANKACCTTO, [
    req("BANKID", text(9)),
    opt("BRANCHID", text(22)),
    req("ACCTID", text(22)),
    req("ACCTTYPE", code(AccountType::CODES)),
    opt("ACCTKEY", text(22)),
]);

aggregate!(CCACCTFROM, [req("ACCTID", text(22)), opt("ACCTKEY", text(22))]);

aggregate!(CCACCTTO, [req("ACCTID", text(22)), opt("ACCTKEY", text(22))]);

aggregate!(BANKTRANLIST, [req("DTSTART", DT), req("DTEND", DT), many("STMTTRN")]);

aggregate!(STMTTRN, [
    req("TRNTYPE", code(TransactionType::CODES)),
    req("DTPOSTED", DT),
    opt("DTUSER", DT),
    opt("DTAVAIL", DT),
    req("TRNAMT", DEC),
    req("FITID", text(255)),
    opt("CORRECTFITID", text(255)),
    opt("CORRECTACTION", code(CorrectAction::CODES)),
    opt("SRVRTID", text(10)),
    opt("CHECKNUM", text(12)),
    opt("REFNUM", text(32)),
    opt("SIC", INT),
    opt("PAYEEID", text(12)),
    opt("NAME", text(32)),
    opt("EXTDNAME", text(100)),
    opt("PAYEE", AGG),
    opt("BANKACCTTO", AGG),
    opt("CCACCTTO", AGG),
    opt("MEMO", text(255)),
    skip("IMAGEDATA"),
    opt("CURRENCY", AGG),
    opt("ORIGCURRENCY", AGG),
    opt("INV401KSOURCE", code(Inv401kSource::CODES)),
], [
    &["NAME", "PAYEE"],
    &["BANKACCTTO", "CCACCTTO"],
    &["CURRENCY", "ORIGCURRENCY"],
]);

aggregate!(PAYEE, [
    req("NAME", text(32)),
    req("ADDR1", text(32)),
    opt("ADDR2", text(32)),
    opt("ADDR3", text(32)),
    req("CITY", text(32)),
    req("STATE", text(5)),
    req("POSTALCODE", text(11)),
    opt("COUNTRY", text(3)),
    req("PHONE", text(32)),
]);

aggregate!(LEDGERBAL, [req("BALAMT", DEC), req("DTASOF", DT)]);

aggregate!(AVAILBAL, [req("BALAMT", DEC), req("DTASOF", DT)]);

aggregate!(BALLIST, [many("BAL")]);

aggregate!(BAL, [
    req("NAME", text(32)),
    req("DESC", text(80)),
    req("BALTYPE", code(BalanceType::CODES)),
    req("VALUE", DEC),
    opt("DTASOF", DT),
    opt("CURRENCY", AGG),
]);

aggregate!(CURRENCY, [req("CURRATE", DEC), req("CURSYM", text(3))]);

aggregate!(ORIGCURRENCY, [req("CURRATE", DEC), req("CURSYM", text(3))]);

// Investment statements

aggregate!(INVSTMTMSGSRSV1, [many("INVSTMTTRNRS")]);

aggregate!(INVSTMTTRNRS, [
    req("TRNUID", text(36)),
    req("STATUS", AGG),
    opt("CLTCOOKIE", text(32)),
    opt("INVSTMTRS", AGG),
]);

aggregate!(INVSTMTRS, [
    req("DTASOF", DT),
    req("CURDEF", text(3)),
    req("INVACCTFROM", AGG),
    opt("INVTRANLIST", AGG),
    opt("INVPOSLIST", AGG),
    opt("INVBAL", AGG),
    skip("INVOOLIST"),
    opt("MKTGINFO", text(360)),
    skip("INV401K"),
    skip("INV401KBAL"),
]);

aggregate!(INVACCTFROM, [req("BROKERID", text(22)), req("ACCTID", text(22))]);

aggregate!(INVTRANLIST, [
    req("DTSTART", DT),
    req("DTEND", DT),
    many("BUYDEBT"),
    many("BUYMF"),
    many("BUYOPT"),
    many("BUYOTHER"),
    many("BUYSTOCK"),
    many("CLOSUREOPT"),
    many("INCOME"),
    many("INVEXPENSE"),
    many("JRNLFUND"),
    many("JRNLSEC"),
    many("MARGININTEREST"),
    many("REINVEST"),
    many("RETOFCAP"),
    many("SELLDEBT"),
    many("SELLMF"),
    many("SELLOPT"),
    many("SELLOTHER"),
    many("SELLSTOCK"),
    many("SPLIT"),
    many("TRANSFER"),
    many("INVBANKTRAN"),
]);

aggregate!(INVTRAN, [
    req("FITID", text(255)),
    opt("SRVRTID", text(10)),
    req("DTTRADE", DT),
    opt("DTSETTLE", DT),
    opt("REVERSALFITID", text(255)),
    opt("MEMO", text(255)),
]);

aggregate!(SECID, [req("UNIQUEID", text(32)), req("UNIQUEIDTYPE", text(10))]);

aggregate!(INVBUY, [
    req("INVTRAN", AGG),
    req("SECID", AGG),
    req("UNITS", DEC),
    req("UNITPRICE", DEC),
    opt("MARKUP", DEC),
    opt("COMMISSION", DEC),
    opt("TAXES", DEC),
    opt("FEES", DEC),
    opt("LOAD", DEC),
    req("TOTAL", DEC),
    opt("CURRENCY", AGG),
    opt("ORIGCURRENCY", AGG),
    req("SUBACCTSEC", code(SubAccountType::CODES)),
    req("SUBACCTFUND", code(SubAccountType::CODES)),
    opt("LOANID", text(32)),
    opt("LOANPRINCIPAL", DEC),
    opt("LOANINTEREST", DEC),
    opt("INV401KSOURCE", code(Inv401kSource::CODES)),
    opt("DTPAYROLL", DT),
    opt("PRIORYEARCONTRIB", BOOL),
], [&["CURRENCY", "ORIGCURRENCY"]]);

aggregate!(INVSELL, [
    req("INVTRAN", AGG),
    req("SECID", AGG),
    req("UNITS", DEC),
    req("UNITPRICE", DEC),
    opt("MARKDOWN", DEC),
    opt("COMMISSION", DEC),
    opt("TAXES", DEC),
    opt("FEES", DEC),
    opt("LOAD", DEC),
    opt("WITHHOLDING", DEC),
    opt("TAXEXEMPT", BOOL),
    req("TOTAL", DEC),
    opt("GAIN", DEC),
    opt("CURRENCY", AGG),
    opt("ORIGCURRENCY", AGG),
    req("SUBACCTSEC", code(SubAccountType::CODES)),
    req("SUBACCTFUND", code(SubAccountType::CODES)),
    opt("LOANID", text(32)),
    opt("STATEWITHHOLDING", DEC),
    opt("PENALTY", DEC),
    opt("INV401KSOURCE", code(Inv401kSource::CODES)),
], [&["CURRENCY", "ORIGCURRENCY"]]);

aggregate!(BUYDEBT, [req("INVBUY", AGG), opt("ACCRDINT", DEC)]);

aggregate!(BUYMF, [
    req("INVBUY", AGG),
    req("BUYTYPE", code(BuyType::CODES)),
    opt("RELFITID", text(255)),
]);

aggregate!(BUYOPT, [
    req("INVBUY", AGG),
    req("OPTBUYTYPE", code(OptionBuyType::CODES)),
    req("SHPERCTRCT", INT),
]);

aggregate!(BUYOTHER, [req("INVBUY", AGG)]);

aggregate!(BUYSTOCK, [req("INVBUY", AGG), req("BUYTYPE", code(BuyType::CODES))]);

aggregate!(CLOSUREOPT, [
    req("INVTRAN", AGG),
    req("SECID", AGG),
    req("OPTACTION", code(OptionAction::CODES)),
    req("UNITS", DEC),
    req("SHPERCTRCT", INT),
    req("SUBACCTSEC", code(SubAccountType::CODES)),
    opt("RELFITID", text(255)),
    opt("GAIN", DEC),
]);

aggregate!(INCOME, [
    req("INVTRAN", AGG),
    req("SECID", AGG),
    req("INCOMETYPE", code(IncomeType::CODES)),
    req("TOTAL", DEC),
    req("SUBACCTSEC", code(SubAccountType::CODES)),
    req("SUBACCTFUND", code(SubAccountType::CODES)),
    opt("TAXEXEMPT", BOOL),
    opt("WITHHOLDING", DEC),
    opt("CURRENCY", AGG),
    opt("ORIGCURRENCY", AGG),
    opt("INV401KSOURCE", code(Inv401kSource::CODES)),
], [&["CURRENCY", "ORIGCURRENCY"]]);

aggregate!(INVEXPENSE, [
    req("INVTRAN", AGG),
    req("SECID", AGG),
    req("TOTAL", DEC),
    req("SUBACCTSEC", code(SubAccountType::CODES)),
    req("SUBACCTFUND", code(SubAccountType::CODES)),
    opt("CURRENCY", AGG),
    opt("ORIGCURRENCY", AGG),
    opt("INV401KSOURCE", code(Inv401kSource::CODES)),
], [&["CURRENCY", "ORIGCURRENCY"]]);

aggregate!(JRNLFUND, [
    req("INVTRAN", AGG),
    req("SUBACCTTO", code(SubAccountType::CODES)),
    req("SUBACCTFROM", code(SubAccountType::CODES)),
    req("TOTAL", DEC),
]);

aggregate!(JRNLSEC, [
    req("INVTRAN", AGG),
    req("SECID", AGG),
    req("SUBACCTTO", code(SubAccountType::CODES)),
    req("SUBACCTFROM", code(SubAccountType::CODES)),
    req("UNITS", DEC),
]);

aggregate!(MARGININTEREST, [
    req("INVTRAN", AGG),
    req("TOTAL", DEC),
    req("SUBACCTFUND", code(SubAccountType::CODES)),
    opt("CURRENCY", AGG),
    opt("ORIGCURRENCY", AGG),
], [&["CURRENCY", "ORIGCURRENCY"]]);

aggregate!(REINVEST, [
    req("INVTRAN", AGG),
    req("SECID", AGG),
    req("INCOMETYPE", code(IncomeType::CODES)),
    req("TOTAL", DEC),
    req("SUBACCTSEC", code(SubAccountType::CODES)),
    req("UNITS", DEC),
    req("UNITPRICE", DEC),
    opt("COMMISSION", DEC),
    opt("TAXES", DEC),
    opt("FEES", DEC),
    opt("LOAD", DEC),
    opt("TAXEXEMPT", BOOL),
    opt("CURRENCY", AGG),
    opt("ORIGCURRENCY", AGG),
    opt("INV401KSOURCE", code(Inv401kSource::CODES)),
], [&["CURRENCY", "ORIGCURRENCY"]]);

aggregate!(RETOFCAP, [
    req("INVTRAN", AGG),
    req("SECID", AGG),
    req("TOTAL", DEC),
    req("SUBACCTSEC", code(SubAccountType::CODES)),
    req("SUBACCTFUND", code(SubAccountType::CODES)),
    opt("CURRENCY", AGG),
    opt("ORIGCURRENCY", AGG),
    opt("INV401KSOURCE", code(Inv401kSource::CODES)),
], [&["CURRENCY", "ORIGCURRENCY"]]);

aggregate!(SELLDEBT, [
    req("INVSELL", AGG),
    req("SELLREASON", code(SellReason::CODES)),
    opt("ACCRDINT", DEC),
]);

aggregate!(SELLMF, [
    req("INVSELL", AGG),
    req("SELLTYPE", code(SellType::CODES)),
    opt("AVGCOSTBASIS", DEC),
    opt("RELFITID", text(255)),
]);

aggregate!(SELLOPT, [
    req("INVSELL", AGG),
    req("OPTSELLTYPE", code(OptionSellType::CODES)),
    req("SHPERCTRCT", INT),
    opt("RELFITID", text(255)),
    opt("RELTYPE", code(RelatedType::CODES)),
    opt("SECURED", code(Secured::CODES)),
]);

aggregate!(SELLOTHER, [req("INVSELL", AGG)]);

aggregate!(SELLSTOCK, [req("INVSELL", AGG), req("SELLTYPE", code(SellType::CODES))]);

aggregate!(SPLIT, [
    req("INVTRAN", AGG),
    req("SECID", AGG),
    req("SUBACCTSEC", code(SubAccountType::CODES)),
    req("OLDUNITS", DEC),
    req("NEWUNITS", DEC),
    req("NUMERATOR", DEC),
    req("DENOMINATOR", DEC),
    opt("CURRENCY", AGG),
    opt("ORIGCURRENCY", AGG),
    opt("FRACCASH", DEC),
    opt("SUBACCTFUND", code(SubAccountType::CODES)),
    opt("INV401KSOURCE", code(Inv401kSource::CODES)),
], [&["CURRENCY", "ORIGCURRENCY"]]);

aggregate!(TRANSFER, [
    req("INVTRAN", AGG),
    req("SECID", AGG),
    req("SUBACCTSEC", code(SubAccountType::CODES)),
    req("UNITS", DEC),
    req("TFERACTION", code(TransferAction::CODES)),
    req("POSTYPE", code(PositionType::CODES)),
    opt("INVACCTFROM", AGG),
    opt("AVGCOSTBASIS", DEC),
    opt("DTPURCHASE", DT),
    opt("INV401KSOURCE", code(Inv401kSource::CODES)),
]);

aggregate!(INVBANKTRAN, [
    req("STMTTRN", AGG),
    req("SUBACCTFUND", code(SubAccountType::CODES)),
]);

aggregate!(INVPOSLIST, [
    many("POSDEBT"),
    many("POSMF"),
    many("POSOPT"),
    many("POSOTHER"),
    many("POSSTOCK"),
]);

aggregate!(INVPOS, [
    req("SECID", AGG),
    req("HELDINACCT", code(SubAccountType::CODES)),
    req("POSTYPE", code(PositionType::CODES)),
    req("UNITS", DEC),
    req("UNITPRICE", DEC),
    req("MKTVAL", DEC),
    opt("AVGCOSTBASIS", DEC),
    req("DTPRICEASOF", DT),
    opt("CURRENCY", AGG),
    opt("MEMO", text(255)),
    opt("INV401KSOURCE", code(Inv401kSource::CODES)),
]);

aggregate!(POSDEBT, [req("INVPOS", AGG)]);

aggregate!(POSMF, [
    req("INVPOS", AGG),
    opt("UNITSSTREET", DEC),
    opt("UNITSUSER", DEC),
    opt("REINVDIV", BOOL),
    opt("REINVCG", BOOL),
]);

aggregate!(POSOPT, [req("INVPOS", AGG), opt("SECURED", code(Secured::CODES))]);

aggregate!(POSOTHER, [req("INVPOS", AGG)]);

aggregate!(POSSTOCK, [
    req("INVPOS", AGG),
    opt("UNITSSTREET", DEC),
    opt("UNITSUSER", DEC),
    opt("REINVDIV", BOOL),
]);

aggregate!(INVBAL, [
    req("AVAILCASH", DEC),
    req("MARGINBALANCE", DEC),
    req("SHORTBALANCE", DEC),
    opt("BUYPOWER", DEC),
    opt("BALLIST", AGG),
]);

// Security list

aggregate!(SECLISTMSGSRSV1, [many("SECLISTTRNRS"), many("SECLIST")]);

aggregate!(SECLISTTRNRS, [
    req("TRNUID", text(36)),
    req("STATUS", AGG),
    opt("CLTCOOKIE", text(32)),
    skip("SECLISTRS"),
]);

aggregate!(SECLIST, [
    many("DEBTINFO"),
    many("MFINFO"),
    many("OPTINFO"),
    many("OTHERINFO"),
    many("STOCKINFO"),
]);

aggregate!(SECINFO, [
    req("SECID", AGG),
    req("SECNAME", text(120)),
    opt("TICKER", text(32)),
    opt("FIID", text(32)),
    opt("RATING", text(10)),
    opt("UNITPRICE", DEC),
    opt("DTASOF", DT),
    opt("CURRENCY", AGG),
    opt("MEMO", text(255)),
]);

aggregate!(DEBTINFO, [
    req("SECINFO", AGG),
    req("PARVALUE", DEC),
    req("DEBTTYPE", code(DebtType::CODES)),
    opt("DEBTCLASS", code(DebtClass::CODES)),
    opt("COUPONRT", DEC),
    opt("DTCOUPON", DT),
    opt("COUPONFREQ", code(CouponFrequency::CODES)),
    opt("CALLPRICE", DEC),
    opt("YIELDTOCALL", DEC),
    opt("DTCALL", DT),
    opt("CALLTYPE", code(CallType::CODES)),
    opt("YIELDTOMAT", DEC),
    opt("DTMAT", DT),
    opt("ASSETCLASS", code(AssetClass::CODES)),
    opt("FIASSETCLASS", text(32)),
]);

aggregate!(MFINFO, [
    req("SECINFO", AGG),
    opt("MFTYPE", code(MutualFundType::CODES)),
    opt("YIELD", DEC),
    opt("DTYIELDASOF", DT),
    opt("MFASSETCLASS", AGG),
    opt("FIMFASSETCLASS", AGG),
]);

aggregate!(MFASSETCLASS, [many("PORTION")]);

aggregate!(PORTION, [req("ASSETCLASS", code(AssetClass::CODES)), req("PERCENT", DEC)]);

aggregate!(FIMFASSETCLASS, [many("FIPORTION")]);

aggregate!(FIPORTION, [req("FIASSETCLASS", text(32)), req("PERCENT", DEC)]);

aggregate!(OPTINFO, [
    req("SECINFO", AGG),
    req("OPTTYPE", code(OptionType::CODES)),
    req("STRIKEPRICE", DEC),
    req("DTEXPIRE", DT),
    req("SHPERCTRCT", INT),
    opt("SECID", AGG),
    opt("ASSETCLASS", code(AssetClass::CODES)),
    opt("FIASSETCLASS", text(32)),
]);

aggregate!(OTHERINFO, [
    req("SECINFO", AGG),
    opt("TYPEDESC", text(32)),
    opt("ASSETCLASS", code(AssetClass::CODES)),
    opt("FIASSETCLASS", text(32)),
]);

aggregate!(STOCKINFO, [
    req("SECINFO", AGG),
    opt("STOCKTYPE", code(StockType::CODES)),
    opt("YIELD", DEC),
    opt("DTYIELDASOF", DT),
    opt("ASSETCLASS", code(AssetClass::CODES)),
    opt("FIASSETCLASS", text(32)),
]);

/// Every built-in aggregate definition.
pub static DEFINITIONS: &[&AggregateDef] = &[
    &OFX,
    &SIGNONMSGSRSV1,
    &SONRS,
    &STATUS,
    &FI,
    &BANKMSGSRSV1,
    &STMTTRNRS,
    &STMTRS,
    &CREDITCARDMSGSRSV1,
    &CCSTMTTRNRS,
    &CCSTMTRS,
    &BANKACCTFROM,
    &BANKACCTTO,
    &CCACCTFROM,
    &CCACCTTO,
    &BANKTRANLIST,
    &STMTTRN,
    &PAYEE,
    &LEDGERBAL,
    &AVAILBAL,
    &BALLIST,
    &BAL,
    &CURRENCY,
    &ORIGCURRENCY,
    &INVSTMTMSGSRSV1,
    &INVSTMTTRNRS,
    &INVSTMTRS,
    &INVACCTFROM,
    &INVTRANLIST,
    &INVTRAN,
    &SECID,
    &INVBUY,
    &INVSELL,
    &BUYDEBT,
    &BUYMF,
    &BUYOPT,
    &BUYOTHER,
    &BUYSTOCK,
    &CLOSUREOPT,
    &INCOME,
    &INVEXPENSE,
    &JRNLFUND,
    &JRNLSEC,
    &MARGININTEREST,
    &REINVEST,
    &RETOFCAP,
    &SELLDEBT,
    &SELLMF,
    &SELLOPT,
    &SELLOTHER,
    &SELLSTOCK,
    &SPLIT,
    &TRANSFER,
    &INVBANKTRAN,
    &INVPOSLIST,
    &INVPOS,
    &POSDEBT,
    &POSMF,
    &POSOPT,
    &POSOTHER,
    &POSSTOCK,
    &INVBAL,
    &SECLISTMSGSRSV1,
    &SECLISTTRNRS,
    &SECLIST,
    &SECINFO,
    &DEBTINFO,
    &MFINFO,
    &MFASSETCLASS,
    &PORTION,
    &FIMFASSETCLASS,
    &FIPORTION,
    &OPTINFO,
    &OTHERINFO,
    &STOCKINFO,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_classify() {
        let registry = Registry::global();
        let stmttrn = registry.lookup("STMTTRN").unwrap();
        assert_eq!(stmttrn.tag, "STMTTRN");
        assert!(stmttrn.field("TRNAMT").unwrap().is_required());
        assert_eq!(registry.classify("STATUS"), TagClass::Container);
        assert_eq!(registry.classify("CODE"), TagClass::Leaf);
        assert_eq!(registry.classify("DTSERVER"), TagClass::Leaf);
        assert_eq!(registry.classify("X-INTU-BID"), TagClass::Unknown);
        assert_eq!(registry.classify("INVOOLIST"), TagClass::Unknown);
        assert!(registry.lookup("NOTATAG").is_none());
    }

    #[test]
    fn test_every_aggregate_child_is_defined() {
        let registry = Registry::global();
        for def in registry.definitions() {
            for spec in def.fields {
                if spec.kind == FieldKind::Aggregate {
                    assert!(
                        registry.lookup(spec.tag).is_some(),
                        "{} references undefined aggregate {}",
                        def.tag,
                        spec.tag
                    );
                }
            }
        }
    }

    #[test]
    fn test_no_tag_is_both_leaf_and_aggregate() {
        let registry = Registry::global();
        for def in registry.definitions() {
            for spec in def.fields.iter().filter(|s| s.kind.is_element()) {
                assert!(
                    registry.lookup(spec.tag).is_none(),
                    "{} declares {} as element but it is an aggregate",
                    def.tag,
                    spec.tag
                );
            }
        }
    }

    #[test]
    fn test_no_duplicate_definitions() {
        assert_eq!(Registry::global().len(), DEFINITIONS.len());
    }

    #[test]
    fn test_exclusive_groups_name_declared_fields() {
        for def in DEFINITIONS {
            for group in def.exclusive {
                for tag in *group {
                    assert!(def.field(tag).is_some(), "{}: {}", def.tag, tag);
                }
            }
        }
    }
}
