//! Coded-choice vocabularies for Form 700 schedule fields.
//!
//! The registry encodes these fields as small 1-based integers. Every
//! field carries its own vocabulary with its own ordering; two fields
//! that look alike are not interchangeable (`fair_market_value` has four
//! entries on Schedule A-1 and five on Schedule A-2), so each one gets
//! its own enum.

/// A field whose raw value is a 1-based index into a fixed vocabulary.
pub trait CodedChoice: Sized + Copy {
    /// Field name used in diagnostics when an index is out of range.
    const FIELD: &'static str;

    /// Decodes a 1-based index. Returns `None` when the index does not
    /// name a vocabulary entry.
    fn from_index(index: u32) -> Option<Self>;

    /// The stored label for this entry.
    fn as_str(&self) -> &'static str;
}

macro_rules! coded_choice {
    ($(#[$meta:meta])* $name:ident, $field:literal {
        $($variant:ident => $label:literal),+ $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl CodedChoice for $name {
            const FIELD: &'static str = $field;

            fn from_index(index: u32) -> Option<Self> {
                const ORDERED: &[$name] = &[$($name::$variant),+];
                let position = index.checked_sub(1)? as usize;
                ORDERED.get(position).copied()
            }

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }
    };
}

coded_choice!(
    /// Schedule A-1 fair market value brackets.
    A1FairMarketValue, "schedule_a1.fair_market_value" {
        Usd2000To10000 => "2000-10000",
        Usd10001To100000 => "10001-100000",
        Usd100001To1000000 => "100001-1000000",
        Over1000000 => "1000000+",
    }
);

coded_choice!(
    A1NatureOfInvestment, "schedule_a1.nature_of_investment" {
        Stock => "stock",
        Partnership => "partnership",
        Other => "other",
    }
);

coded_choice!(
    A1PartnershipAmount, "schedule_a1.partnership_amount" {
        Under500 => "0-499",
        Over500 => "500+",
    }
);

coded_choice!(
    /// Schedule A-2 fair market value brackets. One entry more than the
    /// Schedule A-1 vocabulary and shifted down by one bracket.
    A2FairMarketValue, "schedule_a2.fair_market_value" {
        Under2000 => "0-1999",
        Usd2000To10000 => "2000-10000",
        Usd10001To100000 => "10001-100000",
        Usd100001To1000000 => "100001-1000000",
        Over1000000 => "1000000+",
    }
);

coded_choice!(
    A2GrossIncomeReceived, "schedule_a2.gross_income_received" {
        Under500 => "0-499",
        Usd500To1000 => "500-1000",
        Usd1001To10000 => "1001-10000",
        Usd10001To100000 => "10001-100000",
        Over100000 => "100000+",
    }
);

coded_choice!(
    A2NatureOfInvestment, "schedule_a2.nature_of_investment" {
        SoleProprietorship => "sole_proprietorship",
        Partnership => "partnership",
        Other => "other",
    }
);

coded_choice!(
    BFairMarketValue, "schedule_b.fair_market_value" {
        Usd2000To10000 => "2000-10000",
        Usd10001To100000 => "10001-100000",
        Usd100001To1000000 => "100001-1000000",
        Over1000000 => "1000000+",
    }
);

coded_choice!(
    BGrossIncomeReceived, "schedule_b.gross_income_received" {
        Under500 => "0-499",
        Usd500To1000 => "500-1000",
        Usd1001To10000 => "1001-10000",
        Usd10001To100000 => "10001-100000",
        Over100000 => "100000+",
    }
);

coded_choice!(
    BNatureOfInterest, "schedule_b.nature_of_interest" {
        Ownership => "ownership",
        Easement => "easement",
        Leasehold => "leasehold",
        Other => "other",
    }
);

coded_choice!(
    C1GrossIncomeReceived, "schedule_c1.gross_income_received" {
        NoIncome => "none",
        Usd500To1000 => "500-1000",
        Usd1001To10000 => "1001-10000",
        Usd10001To100000 => "10001-100000",
        Over100000 => "100000+",
    }
);

coded_choice!(
    /// This order is NOT the order printed on the paper form.
    C1ReasonForIncome, "schedule_c1.reason_for_income" {
        Salary => "salary",
        SpouseIncome => "spouse_income",
        LoanRepayment => "loan_repayment",
        Partnership => "partnership",
        Sale => "sale",
        Other => "other",
        Commission => "commission",
        RentalIncome => "rental_income",
    }
);

coded_choice!(
    C2HighestBalance, "schedule_c2.highest_balance" {
        Usd500To1000 => "500-1000",
        Usd1001To10000 => "1001-10000",
        Usd10001To100000 => "10001-100000",
        Over100000 => "100000+",
    }
);

coded_choice!(
    C2LoanSecurity, "schedule_c2.loan_security" {
        NoSecurity => "none",
        PersonalResidence => "personal_residence",
        RealProperty => "real_property",
        Guarantor => "guarantor",
        Other => "other",
    }
);

coded_choice!(
    ETypeOfPayment, "schedule_e.type_of_payment" {
        Gift => "gift",
        Income => "income",
    }
);
