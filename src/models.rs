//! Typed OFX aggregates
//!
//! Every model is read off an [`Aggregate`] that the converter has already
//! validated against the registry, so required fields are known to be present
//! and correctly typed by the time `from_aggregate` runs.

use crate::codes::*;
use crate::convert::Aggregate;
use crate::datetime::OfxDateTime;
use crate::error::ConversionError;
use rust_decimal::Decimal;
use serde::Serialize;

type FieldResult<T> = std::result::Result<T, ConversionError>;

/// Construction of a typed model from a validated aggregate.
pub trait FromAggregate: Sized {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self>;
}

fn required<T: FromAggregate>(agg: &Aggregate, tag: &str) -> FieldResult<T> {
    T::from_aggregate(agg.req_aggregate(tag)?)
}

fn optional<T: FromAggregate>(agg: &Aggregate, tag: &str) -> FieldResult<Option<T>> {
    agg.aggregate(tag).map(T::from_aggregate).transpose()
}

fn list<T: FromAggregate>(agg: &Aggregate, tag: &str) -> FieldResult<Vec<T>> {
    agg.all(tag).map(T::from_aggregate).collect()
}

fn text(agg: &Aggregate, tag: &str) -> Option<String> {
    agg.text(tag).map(str::to_string)
}

fn req_text(agg: &Aggregate, tag: &str) -> FieldResult<String> {
    agg.req_text(tag).map(str::to_string)
}

fn req_datetime(agg: &Aggregate, tag: &str) -> FieldResult<OfxDateTime> {
    agg.req_datetime(tag).cloned()
}

fn datetime(agg: &Aggregate, tag: &str) -> Option<OfxDateTime> {
    agg.datetime(tag).cloned()
}

fn unexpected(agg: &Aggregate) -> ConversionError {
    ConversionError::UnknownAggregate(agg.tag.clone())
}

// Session

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub code: i64,
    pub severity: Severity,
    pub message: Option<String>,
}

impl Status {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

impl FromAggregate for Status {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(Status {
            code: agg.req_integer("CODE")?,
            severity: agg.req_code("SEVERITY")?,
            message: text(agg, "MESSAGE"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialInstitution {
    pub org: Option<String>,
    pub fid: Option<String>,
}

impl FromAggregate for FinancialInstitution {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(FinancialInstitution {
            org: text(agg, "ORG"),
            fid: text(agg, "FID"),
        })
    }
}

/// SONRS
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignOn {
    pub status: Status,
    pub server_time: OfxDateTime,
    pub user_key: Option<String>,
    pub user_key_expires: Option<OfxDateTime>,
    pub language: Option<String>,
    pub profile_updated: Option<OfxDateTime>,
    pub account_updated: Option<OfxDateTime>,
    pub fi: Option<FinancialInstitution>,
    pub session_cookie: Option<String>,
    pub access_key: Option<String>,
}

impl FromAggregate for SignOn {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(SignOn {
            status: required(agg, "STATUS")?,
            server_time: req_datetime(agg, "DTSERVER")?,
            user_key: text(agg, "USERKEY"),
            user_key_expires: datetime(agg, "TSKEYEXPIRE"),
            language: text(agg, "LANGUAGE"),
            profile_updated: datetime(agg, "DTPROFUP"),
            account_updated: datetime(agg, "DTACCTUP"),
            fi: optional(agg, "FI")?,
            session_cookie: text(agg, "SESSCOOKIE"),
            access_key: text(agg, "ACCESSKEY"),
        })
    }
}

// Shared pieces

/// CURRENCY or ORIGCURRENCY
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Currency {
    pub rate: Decimal,
    pub symbol: String,
}

impl FromAggregate for Currency {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(Currency {
            rate: agg.req_decimal("CURRATE")?,
            symbol: req_text(agg, "CURSYM")?,
        })
    }
}

/// LEDGERBAL or AVAILBAL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceAmount {
    pub amount: Decimal,
    pub as_of: OfxDateTime,
}

impl FromAggregate for BalanceAmount {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(BalanceAmount {
            amount: agg.req_decimal("BALAMT")?,
            as_of: req_datetime(agg, "DTASOF")?,
        })
    }
}

/// BAL, an entry of BALLIST
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    pub name: String,
    pub description: String,
    pub balance_type: BalanceType,
    pub value: Decimal,
    pub as_of: Option<OfxDateTime>,
    pub currency: Option<Currency>,
}

impl FromAggregate for Balance {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(Balance {
            name: req_text(agg, "NAME")?,
            description: req_text(agg, "DESC")?,
            balance_type: agg.req_code("BALTYPE")?,
            value: agg.req_decimal("VALUE")?,
            as_of: datetime(agg, "DTASOF"),
            currency: optional(agg, "CURRENCY")?,
        })
    }
}

fn balance_list(agg: &Aggregate) -> FieldResult<Vec<Balance>> {
    match agg.aggregate("BALLIST") {
        Some(ballist) => list(ballist, "BAL"),
        None => Ok(Vec::new()),
    }
}

// Accounts

/// BANKACCTFROM or BANKACCTTO
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankAccount {
    pub bank_id: String,
    pub branch_id: Option<String>,
    pub account_id: String,
    pub account_type: AccountType,
    pub account_key: Option<String>,
}

impl FromAggregate for BankAccount {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(BankAccount {
            bank_id: req_text(agg, "BANKID")?,
            branch_id: text(agg, "BRANCHID"),
            account_id: req_text(agg, "ACCTID")?,
            account_type: agg.req_code("ACCTTYPE")?,
            account_key: text(agg, "ACCTKEY"),
        })
    }
}

/// CCACCTFROM or CCACCTTO
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditCardAccount {
    pub account_id: String,
    pub account_key: Option<String>,
}

impl FromAggregate for CreditCardAccount {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(CreditCardAccount {
            account_id: req_text(agg, "ACCTID")?,
            account_key: text(agg, "ACCTKEY"),
        })
    }
}

/// INVACCTFROM
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentAccount {
    pub broker_id: String,
    pub account_id: String,
}

impl FromAggregate for InvestmentAccount {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(InvestmentAccount {
            broker_id: req_text(agg, "BROKERID")?,
            account_id: req_text(agg, "ACCTID")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Account {
    Bank(BankAccount),
    CreditCard(CreditCardAccount),
    Investment(InvestmentAccount),
}

impl Account {
    pub fn account_id(&self) -> &str {
        match self {
            Account::Bank(acct) => &acct.account_id,
            Account::CreditCard(acct) => &acct.account_id,
            Account::Investment(acct) => &acct.account_id,
        }
    }
}

// Bank transactions

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payee {
    pub name: String,
    pub address: Vec<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: Option<String>,
    pub phone: String,
}

impl FromAggregate for Payee {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        let address = ["ADDR1", "ADDR2", "ADDR3"]
            .iter()
            .filter_map(|tag| text(agg, tag))
            .collect();
        Ok(Payee {
            name: req_text(agg, "NAME")?,
            address,
            city: req_text(agg, "CITY")?,
            state: req_text(agg, "STATE")?,
            postal_code: req_text(agg, "POSTALCODE")?,
            country: text(agg, "COUNTRY"),
            phone: req_text(agg, "PHONE")?,
        })
    }
}

/// STMTTRN
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankTransaction {
    pub transaction_type: TransactionType,
    pub posted: OfxDateTime,
    pub user_date: Option<OfxDateTime>,
    pub available: Option<OfxDateTime>,
    pub amount: Decimal,
    pub fitid: String,
    pub correct_fitid: Option<String>,
    pub correct_action: Option<CorrectAction>,
    pub server_id: Option<String>,
    pub check_number: Option<String>,
    pub reference_number: Option<String>,
    pub sic: Option<i64>,
    pub payee_id: Option<String>,
    pub name: Option<String>,
    pub extended_name: Option<String>,
    pub payee: Option<Payee>,
    pub bank_account_to: Option<BankAccount>,
    pub credit_card_account_to: Option<CreditCardAccount>,
    pub memo: Option<String>,
    pub currency: Option<Currency>,
    pub original_currency: Option<Currency>,
    pub inv401k_source: Option<Inv401kSource>,
}

impl BankTransaction {
    /// NAME, or the payee aggregate's name when the institution sent PAYEE.
    pub fn payee_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or_else(|| self.payee.as_ref().map(|payee| payee.name.as_str()))
    }
}

impl FromAggregate for BankTransaction {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(BankTransaction {
            transaction_type: agg.req_code("TRNTYPE")?,
            posted: req_datetime(agg, "DTPOSTED")?,
            user_date: datetime(agg, "DTUSER"),
            available: datetime(agg, "DTAVAIL"),
            amount: agg.req_decimal("TRNAMT")?,
            fitid: req_text(agg, "FITID")?,
            correct_fitid: text(agg, "CORRECTFITID"),
            correct_action: agg.code("CORRECTACTION"),
            server_id: text(agg, "SRVRTID"),
            check_number: text(agg, "CHECKNUM"),
            reference_number: text(agg, "REFNUM"),
            sic: agg.integer("SIC"),
            payee_id: text(agg, "PAYEEID"),
            name: text(agg, "NAME"),
            extended_name: text(agg, "EXTDNAME"),
            payee: optional(agg, "PAYEE")?,
            bank_account_to: optional(agg, "BANKACCTTO")?,
            credit_card_account_to: optional(agg, "CCACCTTO")?,
            memo: text(agg, "MEMO"),
            currency: optional(agg, "CURRENCY")?,
            original_currency: optional(agg, "ORIGCURRENCY")?,
            inv401k_source: agg.code("INV401KSOURCE"),
        })
    }
}

// Investment transactions

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SecId {
    pub unique_id: String,
    pub unique_id_type: String,
}

impl SecId {
    pub fn new(unique_id: impl Into<String>, unique_id_type: impl Into<String>) -> Self {
        SecId {
            unique_id: unique_id.into(),
            unique_id_type: unique_id_type.into(),
        }
    }
}

impl FromAggregate for SecId {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(SecId {
            unique_id: req_text(agg, "UNIQUEID")?,
            unique_id_type: req_text(agg, "UNIQUEIDTYPE")?,
        })
    }
}

/// INVTRAN
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionInfo {
    pub fitid: String,
    pub server_id: Option<String>,
    pub trade_date: OfxDateTime,
    pub settle_date: Option<OfxDateTime>,
    pub reversal_fitid: Option<String>,
    pub memo: Option<String>,
}

impl FromAggregate for TransactionInfo {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(TransactionInfo {
            fitid: req_text(agg, "FITID")?,
            server_id: text(agg, "SRVRTID"),
            trade_date: req_datetime(agg, "DTTRADE")?,
            settle_date: datetime(agg, "DTSETTLE"),
            reversal_fitid: text(agg, "REVERSALFITID"),
            memo: text(agg, "MEMO"),
        })
    }
}

/// INVBUY
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentBuy {
    pub info: TransactionInfo,
    pub sec_id: SecId,
    pub units: Decimal,
    pub unit_price: Decimal,
    pub markup: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub taxes: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub load: Option<Decimal>,
    pub total: Decimal,
    pub currency: Option<Currency>,
    pub original_currency: Option<Currency>,
    pub sub_account_security: SubAccountType,
    pub sub_account_fund: SubAccountType,
    pub loan_id: Option<String>,
    pub loan_principal: Option<Decimal>,
    pub loan_interest: Option<Decimal>,
    pub inv401k_source: Option<Inv401kSource>,
    pub payroll_date: Option<OfxDateTime>,
    pub prior_year_contribution: Option<bool>,
}

impl FromAggregate for InvestmentBuy {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(InvestmentBuy {
            info: required(agg, "INVTRAN")?,
            sec_id: required(agg, "SECID")?,
            units: agg.req_decimal("UNITS")?,
            unit_price: agg.req_decimal("UNITPRICE")?,
            markup: agg.decimal("MARKUP"),
            commission: agg.decimal("COMMISSION"),
            taxes: agg.decimal("TAXES"),
            fees: agg.decimal("FEES"),
            load: agg.decimal("LOAD"),
            total: agg.req_decimal("TOTAL")?,
            currency: optional(agg, "CURRENCY")?,
            original_currency: optional(agg, "ORIGCURRENCY")?,
            sub_account_security: agg.req_code("SUBACCTSEC")?,
            sub_account_fund: agg.req_code("SUBACCTFUND")?,
            loan_id: text(agg, "LOANID"),
            loan_principal: agg.decimal("LOANPRINCIPAL"),
            loan_interest: agg.decimal("LOANINTEREST"),
            inv401k_source: agg.code("INV401KSOURCE"),
            payroll_date: datetime(agg, "DTPAYROLL"),
            prior_year_contribution: agg.bool("PRIORYEARCONTRIB"),
        })
    }
}

/// INVSELL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentSell {
    pub info: TransactionInfo,
    pub sec_id: SecId,
    pub units: Decimal,
    pub unit_price: Decimal,
    pub markdown: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub taxes: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub load: Option<Decimal>,
    pub withholding: Option<Decimal>,
    pub tax_exempt: Option<bool>,
    pub total: Decimal,
    pub gain: Option<Decimal>,
    pub currency: Option<Currency>,
    pub original_currency: Option<Currency>,
    pub sub_account_security: SubAccountType,
    pub sub_account_fund: SubAccountType,
    pub loan_id: Option<String>,
    pub state_withholding: Option<Decimal>,
    pub penalty: Option<Decimal>,
    pub inv401k_source: Option<Inv401kSource>,
}

impl FromAggregate for InvestmentSell {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(InvestmentSell {
            info: required(agg, "INVTRAN")?,
            sec_id: required(agg, "SECID")?,
            units: agg.req_decimal("UNITS")?,
            unit_price: agg.req_decimal("UNITPRICE")?,
            markdown: agg.decimal("MARKDOWN"),
            commission: agg.decimal("COMMISSION"),
            taxes: agg.decimal("TAXES"),
            fees: agg.decimal("FEES"),
            load: agg.decimal("LOAD"),
            withholding: agg.decimal("WITHHOLDING"),
            tax_exempt: agg.bool("TAXEXEMPT"),
            total: agg.req_decimal("TOTAL")?,
            gain: agg.decimal("GAIN"),
            currency: optional(agg, "CURRENCY")?,
            original_currency: optional(agg, "ORIGCURRENCY")?,
            sub_account_security: agg.req_code("SUBACCTSEC")?,
            sub_account_fund: agg.req_code("SUBACCTFUND")?,
            loan_id: text(agg, "LOANID"),
            state_withholding: agg.decimal("STATEWITHHOLDING"),
            penalty: agg.decimal("PENALTY"),
            inv401k_source: agg.code("INV401KSOURCE"),
        })
    }
}

/// One entry of INVTRANLIST, keyed by its OFX tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum InvestmentTransaction {
    #[serde(rename = "BUYDEBT")]
    BuyDebt {
        buy: InvestmentBuy,
        accrued_interest: Option<Decimal>,
    },
    #[serde(rename = "BUYMF")]
    BuyMutualFund {
        buy: InvestmentBuy,
        buy_type: BuyType,
        related_fitid: Option<String>,
    },
    #[serde(rename = "BUYOPT")]
    BuyOption {
        buy: InvestmentBuy,
        option_buy_type: OptionBuyType,
        shares_per_contract: i64,
    },
    #[serde(rename = "BUYOTHER")]
    BuyOther { buy: InvestmentBuy },
    #[serde(rename = "BUYSTOCK")]
    BuyStock { buy: InvestmentBuy, buy_type: BuyType },
    #[serde(rename = "CLOSUREOPT")]
    ClosureOption {
        info: TransactionInfo,
        sec_id: SecId,
        action: OptionAction,
        units: Decimal,
        shares_per_contract: i64,
        sub_account_security: SubAccountType,
        related_fitid: Option<String>,
        gain: Option<Decimal>,
    },
    #[serde(rename = "INCOME")]
    Income {
        info: TransactionInfo,
        sec_id: SecId,
        income_type: IncomeType,
        total: Decimal,
        sub_account_security: SubAccountType,
        sub_account_fund: SubAccountType,
        tax_exempt: Option<bool>,
        withholding: Option<Decimal>,
        currency: Option<Currency>,
        original_currency: Option<Currency>,
        inv401k_source: Option<Inv401kSource>,
    },
    #[serde(rename = "INVEXPENSE")]
    Expense {
        info: TransactionInfo,
        sec_id: SecId,
        total: Decimal,
        sub_account_security: SubAccountType,
        sub_account_fund: SubAccountType,
        currency: Option<Currency>,
        original_currency: Option<Currency>,
        inv401k_source: Option<Inv401kSource>,
    },
    #[serde(rename = "JRNLFUND")]
    JournalFund {
        info: TransactionInfo,
        sub_account_to: SubAccountType,
        sub_account_from: SubAccountType,
        total: Decimal,
    },
    #[serde(rename = "JRNLSEC")]
    JournalSecurity {
        info: TransactionInfo,
        sec_id: SecId,
        sub_account_to: SubAccountType,
        sub_account_from: SubAccountType,
        units: Decimal,
    },
    #[serde(rename = "MARGININTEREST")]
    MarginInterest {
        info: TransactionInfo,
        total: Decimal,
        sub_account_fund: SubAccountType,
        currency: Option<Currency>,
        original_currency: Option<Currency>,
    },
    #[serde(rename = "REINVEST")]
    Reinvest {
        info: TransactionInfo,
        sec_id: SecId,
        income_type: IncomeType,
        total: Decimal,
        sub_account_security: SubAccountType,
        units: Decimal,
        unit_price: Decimal,
        commission: Option<Decimal>,
        taxes: Option<Decimal>,
        fees: Option<Decimal>,
        load: Option<Decimal>,
        tax_exempt: Option<bool>,
        currency: Option<Currency>,
        original_currency: Option<Currency>,
        inv401k_source: Option<Inv401kSource>,
    },
    #[serde(rename = "RETOFCAP")]
    ReturnOfCapital {
        info: TransactionInfo,
        sec_id: SecId,
        total: Decimal,
        sub_account_security: SubAccountType,
        sub_account_fund: SubAccountType,
        currency: Option<Currency>,
        original_currency: Option<Currency>,
        inv401k_source: Option<Inv401kSource>,
    },
    #[serde(rename = "SELLDEBT")]
    SellDebt {
        sell: InvestmentSell,
        sell_reason: SellReason,
        accrued_interest: Option<Decimal>,
    },
    #[serde(rename = "SELLMF")]
    SellMutualFund {
        sell: InvestmentSell,
        sell_type: SellType,
        average_cost_basis: Option<Decimal>,
        related_fitid: Option<String>,
    },
    #[serde(rename = "SELLOPT")]
    SellOption {
        sell: InvestmentSell,
        option_sell_type: OptionSellType,
        shares_per_contract: i64,
        related_fitid: Option<String>,
        related_type: Option<RelatedType>,
        secured: Option<Secured>,
    },
    #[serde(rename = "SELLOTHER")]
    SellOther { sell: InvestmentSell },
    #[serde(rename = "SELLSTOCK")]
    SellStock { sell: InvestmentSell, sell_type: SellType },
    #[serde(rename = "SPLIT")]
    Split {
        info: TransactionInfo,
        sec_id: SecId,
        sub_account_security: SubAccountType,
        old_units: Decimal,
        new_units: Decimal,
        numerator: Decimal,
        denominator: Decimal,
        currency: Option<Currency>,
        original_currency: Option<Currency>,
        fractional_cash: Option<Decimal>,
        sub_account_fund: Option<SubAccountType>,
        inv401k_source: Option<Inv401kSource>,
    },
    #[serde(rename = "TRANSFER")]
    Transfer {
        info: TransactionInfo,
        sec_id: SecId,
        sub_account_security: SubAccountType,
        units: Decimal,
        action: TransferAction,
        position_type: PositionType,
        account_from: Option<InvestmentAccount>,
        average_cost_basis: Option<Decimal>,
        unit_price: Option<Decimal>,
        purchase_date: Option<OfxDateTime>,
        inv401k_source: Option<Inv401kSource>,
    },
    /// INVBANKTRAN: a cash movement inside the investment account.
    #[serde(rename = "INVBANKTRAN")]
    Bank {
        transaction: BankTransaction,
        sub_account_fund: SubAccountType,
    },
}

impl InvestmentTransaction {
    /// INVTRAN block; `None` only for INVBANKTRAN.
    pub fn info(&self) -> Option<&TransactionInfo> {
        use InvestmentTransaction::*;
        match self {
            BuyDebt { buy, .. }
            | BuyMutualFund { buy, .. }
            | BuyOption { buy, .. }
            | BuyOther { buy }
            | BuyStock { buy, .. } => Some(&buy.info),
            SellDebt { sell, .. }
            | SellMutualFund { sell, .. }
            | SellOption { sell, .. }
            | SellOther { sell }
            | SellStock { sell, .. } => Some(&sell.info),
            ClosureOption { info, .. }
            | Income { info, .. }
            | Expense { info, .. }
            | JournalFund { info, .. }
            | JournalSecurity { info, .. }
            | MarginInterest { info, .. }
            | Reinvest { info, .. }
            | ReturnOfCapital { info, .. }
            | Split { info, .. }
            | Transfer { info, .. } => Some(info),
            Bank { .. } => None,
        }
    }

    pub fn fitid(&self) -> &str {
        match self {
            InvestmentTransaction::Bank { transaction, .. } => &transaction.fitid,
            other => other.info().map(|info| info.fitid.as_str()).unwrap_or_default(),
        }
    }

    pub fn sec_id(&self) -> Option<&SecId> {
        use InvestmentTransaction::*;
        match self {
            BuyDebt { buy, .. }
            | BuyMutualFund { buy, .. }
            | BuyOption { buy, .. }
            | BuyOther { buy }
            | BuyStock { buy, .. } => Some(&buy.sec_id),
            SellDebt { sell, .. }
            | SellMutualFund { sell, .. }
            | SellOption { sell, .. }
            | SellOther { sell }
            | SellStock { sell, .. } => Some(&sell.sec_id),
            ClosureOption { sec_id, .. }
            | Income { sec_id, .. }
            | Expense { sec_id, .. }
            | JournalSecurity { sec_id, .. }
            | Reinvest { sec_id, .. }
            | ReturnOfCapital { sec_id, .. }
            | Split { sec_id, .. }
            | Transfer { sec_id, .. } => Some(sec_id),
            JournalFund { .. } | MarginInterest { .. } | Bank { .. } => None,
        }
    }
}

impl FromAggregate for InvestmentTransaction {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        use InvestmentTransaction::*;
        let transaction = match agg.tag.as_str() {
            "BUYDEBT" => BuyDebt {
                buy: required(agg, "INVBUY")?,
                accrued_interest: agg.decimal("ACCRDINT"),
            },
            "BUYMF" => BuyMutualFund {
                buy: required(agg, "INVBUY")?,
                buy_type: agg.req_code("BUYTYPE")?,
                related_fitid: text(agg, "RELFITID"),
            },
            "BUYOPT" => BuyOption {
                buy: required(agg, "INVBUY")?,
                option_buy_type: agg.req_code("OPTBUYTYPE")?,
                shares_per_contract: agg.req_integer("SHPERCTRCT")?,
            },
            "BUYOTHER" => BuyOther {
                buy: required(agg, "INVBUY")?,
            },
            "BUYSTOCK" => BuyStock {
                buy: required(agg, "INVBUY")?,
                buy_type: agg.req_code("BUYTYPE")?,
            },
            "CLOSUREOPT" => ClosureOption {
                info: required(agg, "INVTRAN")?,
                sec_id: required(agg, "SECID")?,
                action: agg.req_code("OPTACTION")?,
                units: agg.req_decimal("UNITS")?,
                shares_per_contract: agg.req_integer("SHPERCTRCT")?,
                sub_account_security: agg.req_code("SUBACCTSEC")?,
                related_fitid: text(agg, "RELFITID"),
                gain: agg.decimal("GAIN"),
            },
            "INCOME" => Income {
                info: required(agg, "INVTRAN")?,
                sec_id: required(agg, "SECID")?,
                income_type: agg.req_code("INCOMETYPE")?,
                total: agg.req_decimal("TOTAL")?,
                sub_account_security: agg.req_code("SUBACCTSEC")?,
                sub_account_fund: agg.req_code("SUBACCTFUND")?,
                tax_exempt: agg.bool("TAXEXEMPT"),
                withholding: agg.decimal("WITHHOLDING"),
                currency: optional(agg, "CURRENCY")?,
                original_currency: optional(agg, "ORIGCURRENCY")?,
                inv401k_source: agg.code("INV401KSOURCE"),
            },
            "INVEXPENSE" => Expense {
                info: required(agg, "INVTRAN")?,
                sec_id: required(agg, "SECID")?,
                total: agg.req_decimal("TOTAL")?,
                sub_account_security: agg.req_code("SUBACCTSEC")?,
                sub_account_fund: agg.req_code("SUBACCTFUND")?,
                currency: optional(agg, "CURRENCY")?,
                original_currency: optional(agg, "ORIGCURRENCY")?,
                inv401k_source: agg.code("INV401KSOURCE"),
            },
            "JRNLFUND" => JournalFund {
                info: required(agg, "INVTRAN")?,
                sub_account_to: agg.req_code("SUBACCTTO")?,
                sub_account_from: agg.req_code("SUBACCTFROM")?,
                total: agg.req_decimal("TOTAL")?,
            },
            "JRNLSEC" => JournalSecurity {
                info: required(agg, "INVTRAN")?,
                sec_id: required(agg, "SECID")?,
                sub_account_to: agg.req_code("SUBACCTTO")?,
                sub_account_from: agg.req_code("SUBACCTFROM")?,
                units: agg.req_decimal("UNITS")?,
            },
            "MARGININTEREST" => MarginInterest {
                info: required(agg, "INVTRAN")?,
                total: agg.req_decimal("TOTAL")?,
                sub_account_fund: agg.req_code("SUBACCTFUND")?,
                currency: optional(agg, "CURRENCY")?,
                original_currency: optional(agg, "ORIGCURRENCY")?,
            },
            "REINVEST" => Reinvest {
                info: required(agg, "INVTRAN")?,
                sec_id: required(agg, "SECID")?,
                income_type: agg.req_code("INCOMETYPE")?,
                total: agg.req_decimal("TOTAL")?,
                sub_account_security: agg.req_code("SUBACCTSEC")?,
                units: agg.req_decimal("UNITS")?,
                unit_price: agg.req_decimal("UNITPRICE")?,
                commission: agg.decimal("COMMISSION"),
                taxes: agg.decimal("TAXES"),
                fees: agg.decimal("FEES"),
                load: agg.decimal("LOAD"),
                tax_exempt: agg.bool("TAXEXEMPT"),
                currency: optional(agg, "CURRENCY")?,
                original_currency: optional(agg, "ORIGCURRENCY")?,
                inv401k_source: agg.code("INV401KSOURCE"),
            },
            "RETOFCAP" => ReturnOfCapital {
                info: required(agg, "INVTRAN")?,
                sec_id: required(agg, "SECID")?,
                total: agg.req_decimal("TOTAL")?,
                sub_account_security: agg.req_code("SUBACCTSEC")?,
                sub_account_fund: agg.req_code("SUBACCTFUND")?,
                currency: optional(agg, "CURRENCY")?,
                original_currency: optional(agg, "ORIGCURRENCY")?,
                inv401k_source: agg.code("INV401KSOURCE"),
            },
            "SELLDEBT" => SellDebt {
                sell: required(agg, "INVSELL")?,
                sell_reason: agg.req_code("SELLREASON")?,
                accrued_interest: agg.decimal("ACCRDINT"),
            },
            "SELLMF" => SellMutualFund {
                sell: required(agg, "INVSELL")?,
                sell_type: agg.req_code("SELLTYPE")?,
                average_cost_basis: agg.decimal("AVGCOSTBASIS"),
                related_fitid: text(agg, "RELFITID"),
            },
            "SELLOPT" => SellOption {
                sell: required(agg, "INVSELL")?,
                option_sell_type: agg.req_code("OPTSELLTYPE")?,
                shares_per_contract: agg.req_integer("SHPERCTRCT")?,
                related_fitid: text(agg, "RELFITID"),
                related_type: agg.code("RELTYPE"),
                secured: agg.code("SECURED"),
            },
            "SELLOTHER" => SellOther {
                sell: required(agg, "INVSELL")?,
            },
            "SELLSTOCK" => SellStock {
                sell: required(agg, "INVSELL")?,
                sell_type: agg.req_code("SELLTYPE")?,
            },
            "SPLIT" => Split {
                info: required(agg, "INVTRAN")?,
                sec_id: required(agg, "SECID")?,
                sub_account_security: agg.req_code("SUBACCTSEC")?,
                old_units: agg.req_decimal("OLDUNITS")?,
                new_units: agg.req_decimal("NEWUNITS")?,
                numerator: agg.req_decimal("NUMERATOR")?,
                denominator: agg.req_decimal("DENOMINATOR")?,
                currency: optional(agg, "CURRENCY")?,
                original_currency: optional(agg, "ORIGCURRENCY")?,
                fractional_cash: agg.decimal("FRACCASH"),
                sub_account_fund: agg.code("SUBACCTFUND"),
                inv401k_source: agg.code("INV401KSOURCE"),
            },
            "TRANSFER" => Transfer {
                info: required(agg, "INVTRAN")?,
                sec_id: required(agg, "SECID")?,
                sub_account_security: agg.req_code("SUBACCTSEC")?,
                units: agg.req_decimal("UNITS")?,
                action: agg.req_code("TFERACTION")?,
                position_type: agg.req_code("POSTYPE")?,
                account_from: optional(agg, "INVACCTFROM")?,
                average_cost_basis: agg.decimal("AVGCOSTBASIS"),
                unit_price: agg.decimal("UNITPRICE"),
                purchase_date: datetime(agg, "DTPURCHASE"),
                inv401k_source: agg.code("INV401KSOURCE"),
            },
            "INVBANKTRAN" => Bank {
                transaction: required(agg, "STMTTRN")?,
                sub_account_fund: agg.req_code("SUBACCTFUND")?,
            },
            _ => return Err(unexpected(agg)),
        };
        Ok(transaction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transaction {
    Bank(BankTransaction),
    Investment(InvestmentTransaction),
}

impl Transaction {
    pub fn fitid(&self) -> &str {
        match self {
            Transaction::Bank(trn) => &trn.fitid,
            Transaction::Investment(trn) => trn.fitid(),
        }
    }
}

impl FromAggregate for Transaction {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        match agg.tag.as_str() {
            "STMTTRN" => BankTransaction::from_aggregate(agg).map(Transaction::Bank),
            _ => InvestmentTransaction::from_aggregate(agg).map(Transaction::Investment),
        }
    }
}

/// BANKTRANLIST or INVTRANLIST
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionList {
    pub start: OfxDateTime,
    pub end: OfxDateTime,
    /// Document order.
    pub transactions: Vec<Transaction>,
}

impl FromAggregate for TransactionList {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        let transactions = agg
            .aggregates()
            .map(|(_, item)| Transaction::from_aggregate(item))
            .collect::<FieldResult<Vec<_>>>()?;
        Ok(TransactionList {
            start: req_datetime(agg, "DTSTART")?,
            end: req_datetime(agg, "DTEND")?,
            transactions,
        })
    }
}

// Positions

/// INVPOS
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionInfo {
    pub sec_id: SecId,
    pub held_in_account: SubAccountType,
    pub position_type: PositionType,
    pub units: Decimal,
    pub unit_price: Decimal,
    pub market_value: Decimal,
    pub average_cost_basis: Option<Decimal>,
    pub price_as_of: OfxDateTime,
    pub currency: Option<Currency>,
    pub memo: Option<String>,
    pub inv401k_source: Option<Inv401kSource>,
}

impl FromAggregate for PositionInfo {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(PositionInfo {
            sec_id: required(agg, "SECID")?,
            held_in_account: agg.req_code("HELDINACCT")?,
            position_type: agg.req_code("POSTYPE")?,
            units: agg.req_decimal("UNITS")?,
            unit_price: agg.req_decimal("UNITPRICE")?,
            market_value: agg.req_decimal("MKTVAL")?,
            average_cost_basis: agg.decimal("AVGCOSTBASIS"),
            price_as_of: req_datetime(agg, "DTPRICEASOF")?,
            currency: optional(agg, "CURRENCY")?,
            memo: text(agg, "MEMO"),
            inv401k_source: agg.code("INV401KSOURCE"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Position {
    #[serde(rename = "POSDEBT")]
    Debt { position: PositionInfo },
    #[serde(rename = "POSMF")]
    MutualFund {
        position: PositionInfo,
        units_street: Option<Decimal>,
        units_user: Option<Decimal>,
        reinvest_dividends: Option<bool>,
        reinvest_capital_gains: Option<bool>,
    },
    #[serde(rename = "POSOPT")]
    Option {
        position: PositionInfo,
        secured: Option<Secured>,
    },
    #[serde(rename = "POSOTHER")]
    Other { position: PositionInfo },
    #[serde(rename = "POSSTOCK")]
    Stock {
        position: PositionInfo,
        units_street: Option<Decimal>,
        units_user: Option<Decimal>,
        reinvest_dividends: Option<bool>,
    },
}

impl Position {
    pub fn info(&self) -> &PositionInfo {
        match self {
            Position::Debt { position }
            | Position::MutualFund { position, .. }
            | Position::Option { position, .. }
            | Position::Other { position }
            | Position::Stock { position, .. } => position,
        }
    }

    pub fn sec_id(&self) -> &SecId {
        &self.info().sec_id
    }
}

impl FromAggregate for Position {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        let position = required(agg, "INVPOS")?;
        Ok(match agg.tag.as_str() {
            "POSDEBT" => Position::Debt { position },
            "POSMF" => Position::MutualFund {
                position,
                units_street: agg.decimal("UNITSSTREET"),
                units_user: agg.decimal("UNITSUSER"),
                reinvest_dividends: agg.bool("REINVDIV"),
                reinvest_capital_gains: agg.bool("REINVCG"),
            },
            "POSOPT" => Position::Option {
                position,
                secured: agg.code("SECURED"),
            },
            "POSOTHER" => Position::Other { position },
            "POSSTOCK" => Position::Stock {
                position,
                units_street: agg.decimal("UNITSSTREET"),
                units_user: agg.decimal("UNITSUSER"),
                reinvest_dividends: agg.bool("REINVDIV"),
            },
            _ => return Err(unexpected(agg)),
        })
    }
}

/// INVBAL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentBalance {
    pub available_cash: Decimal,
    pub margin_balance: Decimal,
    pub short_balance: Decimal,
    pub buying_power: Option<Decimal>,
    pub balances: Vec<Balance>,
}

impl FromAggregate for InvestmentBalance {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(InvestmentBalance {
            available_cash: agg.req_decimal("AVAILCASH")?,
            margin_balance: agg.req_decimal("MARGINBALANCE")?,
            short_balance: agg.req_decimal("SHORTBALANCE")?,
            buying_power: agg.decimal("BUYPOWER"),
            balances: balance_list(agg)?,
        })
    }
}

// Statements

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Bank,
    CreditCard,
    Investment,
}

impl StatementKind {
    /// Kind for a statement transaction wrapper tag.
    pub fn from_wrapper(tag: &str) -> Option<Self> {
        match tag {
            "STMTTRNRS" => Some(StatementKind::Bank),
            "CCSTMTTRNRS" => Some(StatementKind::CreditCard),
            "INVSTMTTRNRS" => Some(StatementKind::Investment),
            _ => None,
        }
    }

    pub fn body_tag(self) -> &'static str {
        match self {
            StatementKind::Bank => "STMTRS",
            StatementKind::CreditCard => "CCSTMTRS",
            StatementKind::Investment => "INVSTMTRS",
        }
    }
}

/// STMTRS, CCSTMTRS or INVSTMTRS
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementBody {
    pub currency: String,
    pub account: Account,
    /// INVSTMTRS only.
    pub as_of: Option<OfxDateTime>,
    pub transaction_list: Option<TransactionList>,
    pub ledger_balance: Option<BalanceAmount>,
    pub available_balance: Option<BalanceAmount>,
    pub cash_advance_balance: Option<Decimal>,
    pub interest_rate: Option<Decimal>,
    pub purchase_rate: Option<Decimal>,
    pub cash_rate: Option<Decimal>,
    pub transfer_rate: Option<Decimal>,
    pub balances: Vec<Balance>,
    pub positions: Vec<Position>,
    pub investment_balance: Option<InvestmentBalance>,
    pub marketing_info: Option<String>,
}

impl StatementBody {
    fn from_aggregate(kind: StatementKind, agg: &Aggregate) -> FieldResult<Self> {
        let account = match kind {
            StatementKind::Bank => Account::Bank(required(agg, "BANKACCTFROM")?),
            StatementKind::CreditCard => Account::CreditCard(required(agg, "CCACCTFROM")?),
            StatementKind::Investment => Account::Investment(required(agg, "INVACCTFROM")?),
        };
        let list_tag = match kind {
            StatementKind::Investment => "INVTRANLIST",
            _ => "BANKTRANLIST",
        };
        let positions = match agg.aggregate("INVPOSLIST") {
            Some(poslist) => poslist
                .aggregates()
                .map(|(_, item)| Position::from_aggregate(item))
                .collect::<FieldResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(StatementBody {
            currency: req_text(agg, "CURDEF")?,
            account,
            as_of: datetime(agg, "DTASOF"),
            transaction_list: optional(agg, list_tag)?,
            ledger_balance: optional(agg, "LEDGERBAL")?,
            available_balance: optional(agg, "AVAILBAL")?,
            cash_advance_balance: agg.decimal("CASHADVBALAMT"),
            interest_rate: agg.decimal("INTRATE"),
            purchase_rate: agg.decimal("INTRATEPURCH"),
            cash_rate: agg.decimal("INTRATECASH"),
            transfer_rate: agg.decimal("INTRATEXFER"),
            balances: balance_list(agg)?,
            positions,
            investment_balance: optional(agg, "INVBAL")?,
            marketing_info: text(agg, "MKTGINFO"),
        })
    }
}

/// One statement transaction wrapper and, when the server sent one, its
/// statement. A failed request usually comes back with a status and no body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub trnuid: String,
    pub status: Status,
    pub client_cookie: Option<String>,
    pub body: Option<StatementBody>,
}

impl Statement {
    pub fn account(&self) -> Option<&Account> {
        self.body.as_ref().map(|body| &body.account)
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account().map(Account::account_id)
    }

    pub fn currency(&self) -> Option<&str> {
        self.body.as_ref().map(|body| body.currency.as_str())
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.body
            .as_ref()
            .and_then(|body| body.transaction_list.as_ref())
            .map(|list| list.transactions.as_slice())
            .unwrap_or_default()
    }

    pub fn positions(&self) -> &[Position] {
        self.body
            .as_ref()
            .map(|body| body.positions.as_slice())
            .unwrap_or_default()
    }

    pub fn balances(&self) -> &[Balance] {
        self.body
            .as_ref()
            .map(|body| body.balances.as_slice())
            .unwrap_or_default()
    }

    pub fn ledger_balance(&self) -> Option<&BalanceAmount> {
        self.body.as_ref().and_then(|body| body.ledger_balance.as_ref())
    }
}

impl FromAggregate for Statement {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        let kind = StatementKind::from_wrapper(&agg.tag).ok_or_else(|| unexpected(agg))?;
        let body = agg
            .aggregate(kind.body_tag())
            .map(|body| StatementBody::from_aggregate(kind, body))
            .transpose()?;
        Ok(Statement {
            kind,
            trnuid: req_text(agg, "TRNUID")?,
            status: required(agg, "STATUS")?,
            client_cookie: text(agg, "CLTCOOKIE"),
            body,
        })
    }
}

// Securities

/// PORTION
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portion {
    pub asset_class: AssetClass,
    pub percent: Decimal,
}

impl FromAggregate for Portion {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(Portion {
            asset_class: agg.req_code("ASSETCLASS")?,
            percent: agg.req_decimal("PERCENT")?,
        })
    }
}

/// FIPORTION
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiPortion {
    pub asset_class: String,
    pub percent: Decimal,
}

impl FromAggregate for FiPortion {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(FiPortion {
            asset_class: req_text(agg, "FIASSETCLASS")?,
            percent: agg.req_decimal("PERCENT")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SecurityDetails {
    #[serde(rename = "DEBTINFO")]
    Debt {
        par_value: Decimal,
        debt_type: DebtType,
        debt_class: Option<DebtClass>,
        coupon_rate: Option<Decimal>,
        coupon_date: Option<OfxDateTime>,
        coupon_frequency: Option<CouponFrequency>,
        call_price: Option<Decimal>,
        yield_to_call: Option<Decimal>,
        call_date: Option<OfxDateTime>,
        call_type: Option<CallType>,
        yield_to_maturity: Option<Decimal>,
        maturity_date: Option<OfxDateTime>,
        asset_class: Option<AssetClass>,
        fi_asset_class: Option<String>,
    },
    #[serde(rename = "MFINFO")]
    MutualFund {
        fund_type: Option<MutualFundType>,
        yield_rate: Option<Decimal>,
        yield_as_of: Option<OfxDateTime>,
        asset_classes: Vec<Portion>,
        fi_asset_classes: Vec<FiPortion>,
    },
    #[serde(rename = "OPTINFO")]
    Option {
        option_type: OptionType,
        strike_price: Decimal,
        expiration: OfxDateTime,
        shares_per_contract: i64,
        underlying: Option<SecId>,
        asset_class: Option<AssetClass>,
        fi_asset_class: Option<String>,
    },
    #[serde(rename = "OTHERINFO")]
    Other {
        type_description: Option<String>,
        asset_class: Option<AssetClass>,
        fi_asset_class: Option<String>,
    },
    #[serde(rename = "STOCKINFO")]
    Stock {
        stock_type: Option<StockType>,
        yield_rate: Option<Decimal>,
        yield_as_of: Option<OfxDateTime>,
        asset_class: Option<AssetClass>,
        fi_asset_class: Option<String>,
    },
}

impl FromAggregate for SecurityDetails {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        Ok(match agg.tag.as_str() {
            "DEBTINFO" => SecurityDetails::Debt {
                par_value: agg.req_decimal("PARVALUE")?,
                debt_type: agg.req_code("DEBTTYPE")?,
                debt_class: agg.code("DEBTCLASS"),
                coupon_rate: agg.decimal("COUPONRT"),
                coupon_date: datetime(agg, "DTCOUPON"),
                coupon_frequency: agg.code("COUPONFREQ"),
                call_price: agg.decimal("CALLPRICE"),
                yield_to_call: agg.decimal("YIELDTOCALL"),
                call_date: datetime(agg, "DTCALL"),
                call_type: agg.code("CALLTYPE"),
                yield_to_maturity: agg.decimal("YIELDTOMAT"),
                maturity_date: datetime(agg, "DTMAT"),
                asset_class: agg.code("ASSETCLASS"),
                fi_asset_class: text(agg, "FIASSETCLASS"),
            },
            "MFINFO" => SecurityDetails::MutualFund {
                fund_type: agg.code("MFTYPE"),
                yield_rate: agg.decimal("YIELD"),
                yield_as_of: datetime(agg, "DTYIELDASOF"),
                asset_classes: match agg.aggregate("MFASSETCLASS") {
                    Some(classes) => list(classes, "PORTION")?,
                    None => Vec::new(),
                },
                fi_asset_classes: match agg.aggregate("FIMFASSETCLASS") {
                    Some(classes) => list(classes, "FIPORTION")?,
                    None => Vec::new(),
                },
            },
            "OPTINFO" => SecurityDetails::Option {
                option_type: agg.req_code("OPTTYPE")?,
                strike_price: agg.req_decimal("STRIKEPRICE")?,
                expiration: req_datetime(agg, "DTEXPIRE")?,
                shares_per_contract: agg.req_integer("SHPERCTRCT")?,
                underlying: optional(agg, "SECID")?,
                asset_class: agg.code("ASSETCLASS"),
                fi_asset_class: text(agg, "FIASSETCLASS"),
            },
            "OTHERINFO" => SecurityDetails::Other {
                type_description: text(agg, "TYPEDESC"),
                asset_class: agg.code("ASSETCLASS"),
                fi_asset_class: text(agg, "FIASSETCLASS"),
            },
            "STOCKINFO" => SecurityDetails::Stock {
                stock_type: agg.code("STOCKTYPE"),
                yield_rate: agg.decimal("YIELD"),
                yield_as_of: datetime(agg, "DTYIELDASOF"),
                asset_class: agg.code("ASSETCLASS"),
                fi_asset_class: text(agg, "FIASSETCLASS"),
            },
            _ => return Err(unexpected(agg)),
        })
    }
}

/// One SECLIST entry: the shared SECINFO block plus the type-specific part.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityInfo {
    pub sec_id: SecId,
    pub name: String,
    pub ticker: Option<String>,
    pub fi_id: Option<String>,
    pub rating: Option<String>,
    pub unit_price: Option<Decimal>,
    pub as_of: Option<OfxDateTime>,
    pub currency: Option<Currency>,
    pub memo: Option<String>,
    pub details: SecurityDetails,
}

impl SecurityInfo {
    pub fn uniqueid(&self) -> &str {
        &self.sec_id.unique_id
    }

    pub fn uniqueidtype(&self) -> &str {
        &self.sec_id.unique_id_type
    }
}

impl FromAggregate for SecurityInfo {
    fn from_aggregate(agg: &Aggregate) -> FieldResult<Self> {
        let secinfo = agg.req_aggregate("SECINFO")?;
        Ok(SecurityInfo {
            sec_id: required(secinfo, "SECID")?,
            name: req_text(secinfo, "SECNAME")?,
            ticker: text(secinfo, "TICKER"),
            fi_id: text(secinfo, "FIID"),
            rating: text(secinfo, "RATING"),
            unit_price: secinfo.decimal("UNITPRICE"),
            as_of: datetime(secinfo, "DTASOF"),
            currency: optional(secinfo, "CURRENCY")?,
            memo: text(secinfo, "MEMO"),
            details: SecurityDetails::from_aggregate(agg)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Converter;
    use crate::schema::Registry;
    use crate::sgml;
    use crate::tree::Origin;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn aggregate(body: &str) -> Aggregate {
        let tree = sgml::build_tree(body, Registry::global(), Origin::default()).unwrap();
        let mut converter = Converter::new(Registry::global(), false);
        converter.convert(&tree, tree.root().unwrap()).unwrap()
    }

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    #[test]
    fn test_bank_statement() {
        let agg = aggregate(
            "<STMTTRNRS><TRNUID>1001<STATUS><CODE>0<SEVERITY>INFO</STATUS>\
             <STMTRS><CURDEF>USD<BANKACCTFROM><BANKID>121099999<ACCTID>999988<ACCTTYPE>CHECKING</BANKACCTFROM>\
             <BANKTRANLIST><DTSTART>20240101<DTEND>20240131\
             <STMTTRN><TRNTYPE>CHECK<DTPOSTED>20240103<TRNAMT>-200.00<FITID>A1<CHECKNUM>1000</STMTTRN>\
             <STMTTRN><TRNTYPE>ATM<DTPOSTED>20240104<TRNAMT>-300.00<FITID>A2<NAME>ATM</STMTTRN>\
             </BANKTRANLIST><LEDGERBAL><BALAMT>200.29<DTASOF>20240131</LEDGERBAL></STMTRS></STMTTRNRS>",
        );
        let stmt = Statement::from_aggregate(&agg).unwrap();
        assert_eq!(stmt.kind, StatementKind::Bank);
        assert_eq!(stmt.trnuid, "1001");
        assert!(stmt.status.is_success());
        assert_eq!(stmt.account_id(), Some("999988"));
        assert_eq!(stmt.currency(), Some("USD"));
        let fitids: Vec<_> = stmt.transactions().iter().map(Transaction::fitid).collect();
        assert_eq!(fitids, vec!["A1", "A2"]);
        match &stmt.transactions()[0] {
            Transaction::Bank(trn) => {
                assert_eq!(trn.transaction_type, TransactionType::Check);
                assert_eq!(trn.amount, dec("-200.00"));
                assert_eq!(trn.check_number.as_deref(), Some("1000"));
            }
            other => panic!("unexpected transaction {other:?}"),
        }
        assert_eq!(stmt.ledger_balance().unwrap().amount, dec("200.29"));
    }

    #[test]
    fn test_statement_without_body() {
        let agg = aggregate(
            "<CCSTMTTRNRS><TRNUID>7<STATUS><CODE>2000<SEVERITY>ERROR<MESSAGE>No access</STATUS></CCSTMTTRNRS>",
        );
        let stmt = Statement::from_aggregate(&agg).unwrap();
        assert_eq!(stmt.kind, StatementKind::CreditCard);
        assert!(!stmt.status.is_success());
        assert_eq!(stmt.status.severity, Severity::Error);
        assert_eq!(stmt.account_id(), None);
        assert!(stmt.transactions().is_empty());
    }

    #[test]
    fn test_investment_transactions_and_positions() {
        let agg = aggregate(
            "<INVSTMTRS><DTASOF>20240131<CURDEF>USD<INVACCTFROM><BROKERID>example.com<ACCTID>42</INVACCTFROM>\
             <INVTRANLIST><DTSTART>20240101<DTEND>20240131\
             <BUYSTOCK><INVBUY><INVTRAN><FITID>T1<DTTRADE>20240105</INVTRAN>\
             <SECID><UNIQUEID>037833100<UNIQUEIDTYPE>CUSIP</SECID><UNITS>10<UNITPRICE>185.5\
             <TOTAL>-1855<SUBACCTSEC>CASH<SUBACCTFUND>CASH</INVBUY><BUYTYPE>BUY</BUYSTOCK>\
             <INVBANKTRAN><STMTTRN><TRNTYPE>CREDIT<DTPOSTED>20240110<TRNAMT>500<FITID>T2</STMTTRN>\
             <SUBACCTFUND>CASH</INVBANKTRAN>\
             </INVTRANLIST>\
             <INVPOSLIST><POSSTOCK><INVPOS><SECID><UNIQUEID>037833100<UNIQUEIDTYPE>CUSIP</SECID>\
             <HELDINACCT>CASH<POSTYPE>LONG<UNITS>10<UNITPRICE>190<MKTVAL>1900<DTPRICEASOF>20240131</INVPOS>\
             <REINVDIV>N</POSSTOCK></INVPOSLIST>\
             <INVBAL><AVAILCASH>100<MARGINBALANCE>0<SHORTBALANCE>0</INVBAL></INVSTMTRS>",
        );
        let body = StatementBody::from_aggregate(StatementKind::Investment, &agg).unwrap();
        assert_eq!(body.account.account_id(), "42");
        let transactions = &body.transaction_list.as_ref().unwrap().transactions;
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].fitid(), "T1");
        match &transactions[0] {
            Transaction::Investment(trn) => {
                assert_eq!(trn.sec_id(), Some(&SecId::new("037833100", "CUSIP")));
                assert_eq!(trn.info().unwrap().trade_date.to_string(), "20240105000000.000");
            }
            other => panic!("unexpected transaction {other:?}"),
        }
        match &transactions[0] {
            Transaction::Investment(InvestmentTransaction::BuyStock { buy, buy_type }) => {
                assert_eq!(buy.units, dec("10"));
                assert_eq!(*buy_type, BuyType::Buy);
            }
            other => panic!("unexpected transaction {other:?}"),
        }
        assert_eq!(transactions[1].fitid(), "T2");
        assert_eq!(body.positions.len(), 1);
        assert_eq!(body.positions[0].info().market_value, dec("1900"));
        assert!(matches!(
            body.positions[0],
            Position::Stock { reinvest_dividends: Some(false), .. }
        ));
        assert_eq!(body.investment_balance.unwrap().available_cash, dec("100"));
    }

    #[test]
    fn test_security_info() {
        let agg = aggregate(
            "<MFINFO><SECINFO><SECID><UNIQUEID>922908363<UNIQUEIDTYPE>CUSIP</SECID>\
             <SECNAME>Index Fund<TICKER>VFIAX</SECINFO><MFTYPE>OPENEND\
             <MFASSETCLASS><PORTION><ASSETCLASS>LARGESTOCK<PERCENT>80</PORTION>\
             <PORTION><ASSETCLASS>SMALLSTOCK<PERCENT>20</PORTION></MFASSETCLASS></MFINFO>",
        );
        let sec = SecurityInfo::from_aggregate(&agg).unwrap();
        assert_eq!(sec.uniqueid(), "922908363");
        assert_eq!(sec.uniqueidtype(), "CUSIP");
        assert_eq!(sec.ticker.as_deref(), Some("VFIAX"));
        match sec.details {
            SecurityDetails::MutualFund { fund_type, asset_classes, .. } => {
                assert_eq!(fund_type, Some(MutualFundType::OpenEnd));
                assert_eq!(asset_classes.len(), 2);
                assert_eq!(asset_classes[1].asset_class, AssetClass::SmallStock);
            }
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn test_payee_name_fallback() {
        let agg = aggregate(
            "<STMTTRN><TRNTYPE>PAYMENT<DTPOSTED>20240105<TRNAMT>-10<FITID>P\
             <PAYEE><NAME>Utility Co<ADDR1>1 Main<ADDR2>Suite 2<CITY>X<STATE>NY<POSTALCODE>1<PHONE>5</PAYEE></STMTTRN>",
        );
        let trn = BankTransaction::from_aggregate(&agg).unwrap();
        assert_eq!(trn.payee_name(), Some("Utility Co"));
        assert_eq!(trn.payee.unwrap().address, vec!["1 Main", "Suite 2"]);
    }
}
