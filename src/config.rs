use crate::expression::Expression;
use crate::{Error, Result};
use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a report obtains the password of its PDF output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum EncryptionMode {
    /// The user types a password when downloading; rendering never encrypts.
    #[default]
    Manual,
    /// The password is computed from the record when the PDF is rendered.
    Auto,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown encryption mode {0:?}; expected \"manual\" or \"auto\"")]
pub struct ParseModeError(String);

impl FromStr for EncryptionMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(EncryptionMode::Manual),
            "auto" => Ok(EncryptionMode::Auto),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EncryptionMode::Manual => "manual",
            EncryptionMode::Auto => "auto",
        })
    }
}

/// Security handler used for the encrypted output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
pub enum Cipher {
    /// RC4 with a 128-bit key (standard security handler revision 3).
    #[default]
    Rc4,
    /// AES with a 128-bit key (revision 4).
    Aes128,
    /// AES with a 256-bit key (PDF 2.0 handler).
    Aes256,
}

bitflags! {
    /// User access permissions stored in the encryption dictionary.
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    pub struct Permissions: u64 {
        const PRINTABLE = 1 << 3;
        const MODIFIABLE = 1 << 4;
        const COPYABLE = 1 << 5;
        const ANNOTABLE = 1 << 6;
        const FILLABLE = 1 << 9;
        const COPYABLE_FOR_ACCESSIBILITY = 1 << 10;
        const ASSEMBLABLE = 1 << 11;
        const PRINTABLE_IN_HIGH_QUALITY = 1 << 12;
    }
}

/// Options for encrypting PDF documents
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptionSettings {
    pub cipher: Cipher,
    pub permissions: Permissions,
    /// Owner password; the user password is used when unset.
    pub owner_password: Option<String>,
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        EncryptionSettings {
            cipher: Cipher::default(),
            permissions: Permissions::all(),
            owner_password: None,
        }
    }
}

impl EncryptionSettings {
    pub fn builder() -> EncryptionSettingsBuilder {
        EncryptionSettingsBuilder::default()
    }
}

/// Builder for EncryptionSettings
#[derive(Default)]
pub struct EncryptionSettingsBuilder {
    cipher: Cipher,
    permissions: Option<Permissions>,
    owner_password: Option<String>,
}

impl EncryptionSettingsBuilder {
    pub fn cipher(mut self, value: Cipher) -> Self {
        self.cipher = value;
        self
    }

    pub fn permissions(mut self, value: Permissions) -> Self {
        self.permissions = Some(value);
        self
    }

    /// Use a separate owner password instead of the user password.
    pub fn owner_password<S: Into<String>>(mut self, value: S) -> Self {
        self.owner_password = Some(value.into()).filter(|password: &String| !password.is_empty());
        self
    }

    pub fn build(self) -> EncryptionSettings {
        EncryptionSettings {
            cipher: self.cipher,
            permissions: self.permissions.unwrap_or(Permissions::all()),
            owner_password: self.owner_password,
        }
    }
}

/// Encryption configuration stored on a report action.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReportConfig {
    #[cfg_attr(feature = "serde", serde(default))]
    pub encryption_mode: EncryptionMode,
    /// Expression computing the password, used in [`EncryptionMode::Auto`].
    #[cfg_attr(feature = "serde", serde(default))]
    pub password_expression: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub settings: EncryptionSettings,
}

impl ReportConfig {
    pub fn manual() -> ReportConfig {
        ReportConfig::default()
    }

    pub fn auto<S: Into<String>>(password_expression: S) -> ReportConfig {
        ReportConfig {
            encryption_mode: EncryptionMode::Auto,
            password_expression: Some(password_expression.into()),
            settings: EncryptionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EncryptionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The password expression, if set to something other than blanks.
    pub fn expression(&self) -> Option<&str> {
        self.password_expression
            .as_deref()
            .map(str::trim)
            .filter(|expression| !expression.is_empty())
    }

    /// Whether rendering computes a password, and therefore needs the record.
    pub fn computes_password(&self) -> bool {
        self.encryption_mode == EncryptionMode::Auto && self.expression().is_some()
    }

    /// Checks that the password expression parses, so that a broken
    /// configuration is refused when it is saved rather than when printing.
    pub fn validate(&self) -> Result<()> {
        if let Some(source) = self.expression().filter(|_| self.encryption_mode == EncryptionMode::Auto) {
            Expression::parse(source).map_err(|err| Error::configuration(source, err))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!("auto".parse::<EncryptionMode>(), Ok(EncryptionMode::Auto));
        assert_eq!(" Manual ".parse::<EncryptionMode>(), Ok(EncryptionMode::Manual));
        assert!("password".parse::<EncryptionMode>().is_err());
        assert_eq!(EncryptionMode::Auto.to_string(), "auto");
        assert_eq!(EncryptionMode::default(), EncryptionMode::Manual);
    }

    #[test]
    fn blank_expression_is_no_expression() {
        assert_eq!(ReportConfig::auto("   ").expression(), None);
        assert_eq!(ReportConfig::auto(" 'x' ").expression(), Some("'x'"));
        assert!(!ReportConfig::auto("").computes_password());
        assert!(ReportConfig::auto("object.id").computes_password());

        let mut manual = ReportConfig::manual();
        manual.password_expression = Some("object.id".to_string());
        assert!(!manual.computes_password());
    }

    #[test]
    fn validate_reports_the_expression() {
        assert!(ReportConfig::auto("object.vat[-4:]").validate().is_ok());
        assert!(ReportConfig::auto("").validate().is_ok());

        match ReportConfig::auto("import os").validate() {
            Err(Error::Configuration { expression, .. }) => assert_eq!(expression, "import os"),
            other => panic!("unexpected {:?}", other),
        }

        // Manual mode never evaluates the expression.
        let mut manual = ReportConfig::manual();
        manual.password_expression = Some("import os".to_string());
        assert!(manual.validate().is_ok());
    }

    #[test]
    fn settings_builder() {
        let settings = EncryptionSettings::builder()
            .cipher(Cipher::Aes256)
            .permissions(Permissions::PRINTABLE)
            .owner_password("")
            .build();
        assert_eq!(settings.cipher, Cipher::Aes256);
        assert_eq!(settings.permissions, Permissions::PRINTABLE);
        assert_eq!(settings.owner_password, None);
        assert_eq!(EncryptionSettings::builder().build(), EncryptionSettings::default());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_serde_round_trip() {
        let config = ReportConfig::auto("object.vat[-4:]");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"encryption_mode": "auto", "password_expression": "object.vat[-4:]"})
        );
        let restored: ReportConfig = serde_json::from_value(json).unwrap();
        assert_eq!(restored, config);

        let stored: ReportConfig = serde_json::from_str(r#"{"encryption_mode": "manual"}"#).unwrap();
        assert_eq!(stored, ReportConfig::manual());
        assert_eq!(serde_json::to_string(&Cipher::Aes128).unwrap(), "\"aes128\"");
    }
}
