use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::JarvisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxId(u32);

impl TaxId {
    pub const ROOT: TaxId = TaxId(1);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaxId {
    type Err = JarvisError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty() && trimmed.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(JarvisError::InvalidTaxId(value.to_string()));
        }
        trimmed
            .parse::<u32>()
            .map(Self)
            .map_err(|_| JarvisError::InvalidTaxId(value.to_string()))
    }
}

impl From<u32> for TaxId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeField {
    Acronym,
    Diseases,
    Transmissions,
    Hosts,
}

impl AttributeField {
    pub const ALL: [AttributeField; 4] = [
        AttributeField::Acronym,
        AttributeField::Diseases,
        AttributeField::Transmissions,
        AttributeField::Hosts,
    ];

    pub fn column(self) -> &'static str {
        match self {
            AttributeField::Acronym => "Acronym",
            AttributeField::Diseases => "Diseases",
            AttributeField::Transmissions => "Transmissions",
            AttributeField::Hosts => "Hosts",
        }
    }
}

impl fmt::Display for AttributeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Portuguese,
}

impl Language {
    pub fn prompt_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Portuguese => "Brazilian Portuguese",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::English => write!(f, "english"),
            Language::Portuguese => write!(f, "portuguese"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Txt,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Txt => "txt",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrganismInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acronym: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diseases: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmissions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genus: Option<String>,
}

impl OrganismInfo {
    pub fn normalized(self) -> Self {
        Self {
            name: non_blank(self.name),
            acronym: non_blank(self.acronym),
            size: self.size,
            diseases: non_blank(self.diseases),
            transmissions: non_blank(self.transmissions),
            hosts: non_blank(self.hosts),
            family: non_blank(self.family),
            genus: non_blank(self.genus),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.name.is_some()
    }

    pub fn field(&self, field: AttributeField) -> Option<&str> {
        match field {
            AttributeField::Acronym => self.acronym.as_deref(),
            AttributeField::Diseases => self.diseases.as_deref(),
            AttributeField::Transmissions => self.transmissions.as_deref(),
            AttributeField::Hosts => self.hosts.as_deref(),
        }
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == value.len() {
            Some(value)
        } else {
            Some(trimmed.to_string())
        }
    })
}
