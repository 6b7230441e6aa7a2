//! Enumerated OFX code sets
//!
//! Every code type keeps unrecognized values in an `Unknown` variant instead
//! of failing, since institutions routinely emit codes outside the nominal
//! value sets.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A closed set of OFX codes with an open fallback.
pub trait OfxCode: Sized {
    /// Recognized code strings, in declaration order.
    const CODES: &'static [&'static str];

    fn from_code(code: &str) -> Self;

    fn as_str(&self) -> &str;

    fn is_known(&self) -> bool;
}

macro_rules! ofx_code {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            Unknown(String),
        }

        impl OfxCode for $name {
            const CODES: &'static [&'static str] = &[$($code),+];

            fn from_code(code: &str) -> Self {
                match code.trim() {
                    $($code => $name::$variant,)+
                    other => $name::Unknown(other.to_string()),
                }
            }

            fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $code,)+
                    $name::Unknown(code) => code,
                }
            }

            fn is_known(&self) -> bool {
                !matches!(self, $name::Unknown(_))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let code = String::deserialize(deserializer)?;
                Ok($name::from_code(&code))
            }
        }
    };
}

ofx_code!(
    /// STATUS/SEVERITY
    Severity {
        Info => "INFO",
        Warn => "WARN",
        Error => "ERROR",
    }
);

impl Severity {
    /// Ordering used to fold many statuses into one outcome. Unknown codes rank
    /// between WARN and ERROR.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Warn => 1,
            Severity::Unknown(_) => 2,
            Severity::Error => 3,
        }
    }
}

ofx_code!(
    /// STMTTRN/TRNTYPE
    TransactionType {
        Credit => "CREDIT",
        Debit => "DEBIT",
        Interest => "INT",
        Dividend => "DIV",
        Fee => "FEE",
        ServiceCharge => "SRVCHG",
        Deposit => "DEP",
        Atm => "ATM",
        PointOfSale => "POS",
        Transfer => "XFER",
        Check => "CHECK",
        Payment => "PAYMENT",
        Cash => "CASH",
        DirectDeposit => "DIRECTDEP",
        DirectDebit => "DIRECTDEBIT",
        RepeatPayment => "REPEATPMT",
        Hold => "HOLD",
        Other => "OTHER",
    }
);

ofx_code!(
    /// BANKACCTFROM/ACCTTYPE
    AccountType {
        Checking => "CHECKING",
        Savings => "SAVINGS",
        MoneyMarket => "MONEYMRKT",
        CreditLine => "CREDITLINE",
        Cd => "CD",
    }
);

ofx_code!(
    /// BAL/BALTYPE
    BalanceType {
        Dollar => "DOLLAR",
        Percent => "PERCENT",
        Number => "NUMBER",
    }
);

ofx_code!(
    /// SUBACCTSEC, SUBACCTFUND, SUBACCTTO, SUBACCTFROM, HELDINACCT
    SubAccountType {
        Cash => "CASH",
        Margin => "MARGIN",
        Short => "SHORT",
        Other => "OTHER",
    }
);

ofx_code!(
    PositionType {
        Long => "LONG",
        Short => "SHORT",
    }
);

ofx_code!(
    BuyType {
        Buy => "BUY",
        BuyToCover => "BUYTOCOVER",
    }
);

ofx_code!(
    SellType {
        Sell => "SELL",
        SellShort => "SELLSHORT",
    }
);

ofx_code!(
    IncomeType {
        LongTermCapitalGain => "CGLONG",
        ShortTermCapitalGain => "CGSHORT",
        Dividend => "DIV",
        Interest => "INTEREST",
        Misc => "MISC",
    }
);

ofx_code!(
    OptionType {
        Put => "PUT",
        Call => "CALL",
    }
);

ofx_code!(
    OptionBuyType {
        BuyToOpen => "BUYTOOPEN",
        BuyToClose => "BUYTOCLOSE",
    }
);

ofx_code!(
    OptionSellType {
        SellToClose => "SELLTOCLOSE",
        SellToOpen => "SELLTOOPEN",
    }
);

ofx_code!(
    OptionAction {
        Exercise => "EXERCISE",
        Assign => "ASSIGN",
        Expire => "EXPIRE",
    }
);

ofx_code!(
    TransferAction {
        In => "IN",
        Out => "OUT",
    }
);

ofx_code!(
    SellReason {
        Call => "CALL",
        Sell => "SELL",
        Maturity => "MATURITY",
    }
);

ofx_code!(
    RelatedType {
        Spread => "SPREAD",
        Straddle => "STRADDLE",
        None => "NONE",
        Other => "OTHER",
    }
);

ofx_code!(
    Secured {
        Naked => "NAKED",
        Covered => "COVERED",
    }
);

ofx_code!(
    Inv401kSource {
        PreTax => "PRETAX",
        AfterTax => "AFTERTAX",
        Match => "MATCH",
        ProfitSharing => "PROFITSHARING",
        Rollover => "ROLLOVER",
        OtherVest => "OTHERVEST",
        OtherNonVest => "OTHERNONVEST",
    }
);

ofx_code!(
    CorrectAction {
        Replace => "REPLACE",
        Delete => "DELETE",
    }
);

ofx_code!(
    DebtType {
        Coupon => "COUPON",
        Zero => "ZERO",
    }
);

ofx_code!(
    DebtClass {
        Treasury => "TREASURY",
        Municipal => "MUNICIPAL",
        Corporate => "CORPORATE",
        Other => "OTHER",
    }
);

ofx_code!(
    CouponFrequency {
        Monthly => "MONTHLY",
        Quarterly => "QUARTERLY",
        SemiAnnual => "SEMIANNUAL",
        Annual => "ANNUAL",
        Other => "OTHER",
    }
);

ofx_code!(
    CallType {
        Call => "CALL",
        Put => "PUT",
        Prefund => "PREFUND",
        Maturity => "MATURITY",
    }
);

ofx_code!(
    AssetClass {
        DomesticBond => "DOMESTICBOND",
        InternationalBond => "INTLBOND",
        LargeStock => "LARGESTOCK",
        SmallStock => "SMALLSTOCK",
        InternationalStock => "INTLSTOCK",
        MoneyMarket => "MONEYMRKT",
        Other => "OTHER",
    }
);

ofx_code!(
    MutualFundType {
        OpenEnd => "OPENEND",
        CloseEnd => "CLOSEEND",
        Other => "OTHER",
    }
);

ofx_code!(
    StockType {
        Common => "COMMON",
        Preferred => "PREFERRED",
        Convertible => "CONVERTIBLE",
        Other => "OTHER",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_code() {
        assert_eq!(TransactionType::from_code("DEBIT"), TransactionType::Debit);
        assert_eq!(TransactionType::from_code(" INT\r\n"), TransactionType::Interest);
        assert!(TransactionType::Debit.is_known());
    }

    #[test]
    fn test_unknown_code_is_retained() {
        let code = AccountType::from_code("BROKERAGE");
        assert_eq!(code, AccountType::Unknown("BROKERAGE".into()));
        assert!(!code.is_known());
        assert_eq!(code.as_str(), "BROKERAGE");
    }

    #[test]
    fn test_codes_table_matches_variants() {
        for code in IncomeType::CODES {
            assert!(IncomeType::from_code(code).is_known(), "{code}");
        }
        assert_eq!(Severity::CODES, &["INFO", "WARN", "ERROR"]);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Severity::Warn).unwrap();
        assert_eq!(json, "\"WARN\"");
        let back: Severity = serde_json::from_str("\"NOTICE\"").unwrap();
        assert_eq!(back, Severity::Unknown("NOTICE".into()));
    }

    #[test]
    fn test_severity_rank() {
        assert!(Severity::Error.rank() > Severity::Warn.rank());
        assert!(Severity::Unknown("X".into()).rank() > Severity::Info.rank());
    }
}
