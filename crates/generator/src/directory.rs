//! Fixed regional company directory.
//!
//! Three regions, each with a fixed roster of telecom, energy and
//! insurance companies, plus the currency mapping and the keyword-based
//! industry classifier. The data is deliberately static: downstream
//! dashboards group on these exact names.

use batchpipe_core::amount;
use batchpipe_core::metadata::keys;

pub const REGIONS: [&str; 3] = ["US", "AU", "UK"];

const US_COMPANIES: &[&str] = &[
    "Verizon Communications",
    "AT&T Inc",
    "T-Mobile US",
    "Comcast Corporation",
    "Charter Communications",
    "Sprint Corporation",
    "CenturyLink",
    "Kinder Morgan",
    "Enterprise Products Partners",
    "Enbridge Inc",
    "TC Energy",
    "Williams Companies",
    "Oneok Inc",
    "Sempra Energy",
    "Berkshire Hathaway",
    "Progressive Corporation",
    "Allstate Corporation",
    "Travelers Companies",
    "Liberty Mutual",
    "Farmers Insurance",
    "USAA",
];

const AU_COMPANIES: &[&str] = &[
    "Telstra Corporation",
    "Optus",
    "Vodafone Australia",
    "TPG Telecom",
    "iiNet",
    "Aussie Broadband",
    "Southern Phone",
    "AGL Energy",
    "Origin Energy",
    "EnergyAustralia",
    "Alinta Energy",
    "Red Energy",
    "Simply Energy",
    "Powershop Australia",
    "Suncorp Group",
    "IAG Group",
    "QBE Insurance",
    "Allianz Australia",
    "NRMA Insurance",
    "RACV",
];

const UK_COMPANIES: &[&str] = &[
    "BT Group",
    "Vodafone UK",
    "EE Limited",
    "Three UK",
    "O2 UK",
    "Sky UK",
    "Virgin Media",
    "TalkTalk",
    "Plusnet",
    "British Gas",
    "E.ON UK",
    "EDF Energy",
    "Scottish Power",
    "npower",
    "SSE",
    "Bulb Energy",
    "Octopus Energy",
    "Aviva",
    "Legal & General",
    "Admiral Group",
    "Direct Line Group",
    "RSA Insurance",
    "Hastings Group",
    "LV= General Insurance",
];

pub fn companies_for(region: &str) -> &'static [&'static str] {
    match region {
        "AU" => AU_COMPANIES,
        "UK" => UK_COMPANIES,
        _ => US_COMPANIES,
    }
}

/// Currency code and symbol for a region. Unknown regions fall back to
/// USD.
pub fn currency_for(region: &str) -> (&'static str, &'static str) {
    match region {
        "AU" => ("AUD", "A$"),
        "UK" => ("GBP", "£"),
        _ => ("USD", "$"),
    }
}

/// Currency metadata for an amount in a region: code, 2-dp amount, and a
/// symbol-formatted amount.
pub fn currency_fields(region: &str, value: f64) -> [(&'static str, String); 3] {
    let (code, symbol) = currency_for(region);
    [
        (keys::CURRENCY, code.to_string()),
        (keys::AMOUNT, amount::format(value)),
        (keys::FORMATTED_AMOUNT, format!("{symbol}{value:.2}")),
    ]
}

const TELECOM_KEYWORDS: &[&str] = &[
    "telecom",
    "mobile",
    "verizon",
    "at&t",
    "t-mobile",
    "comcast",
    "telstra",
    "optus",
    "vodafone",
    "bt group",
    "ee limited",
    "o2 uk",
    "sky uk",
    "virgin media",
    "sprint",
    "charter",
];

const ENERGY_KEYWORDS: &[&str] = &[
    "gas",
    "energy",
    "kinder morgan",
    "enterprise products",
    "enbridge",
    "williams",
    "agl energy",
    "origin energy",
    "british gas",
    "e.on",
    "edf energy",
    "scottish power",
    "sse",
    "bulb",
    "octopus",
    "sempra",
];

const INSURANCE_KEYWORDS: &[&str] = &[
    "insurance",
    "berkshire hathaway",
    "progressive",
    "allstate",
    "travelers",
    "liberty mutual",
    "farmers",
    "usaa",
    "suncorp",
    "iag group",
    "qbe",
    "allianz",
    "nrma",
    "racv",
    "aviva",
    "legal & general",
    "admiral",
    "direct line",
    "rsa insurance",
    "hastings",
    "lv=",
];

/// Classify a company name into an industry by keyword match.
///
/// Order matters: telecom keywords win over energy, energy over
/// insurance. Anything unmatched is plain "business".
pub fn industry_for(company: &str) -> &'static str {
    let lower = company.to_lowercase();

    for (keywords, industry) in [
        (TELECOM_KEYWORDS, "telecom"),
        (ENERGY_KEYWORDS, "energy"),
        (INSURANCE_KEYWORDS, "insurance"),
    ] {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return industry;
        }
    }

    "business"
}
