use crate::config::{EncryptionMode, ReportConfig};
use crate::expression::{Clock, Expression, ExpressionError, Scope, SystemClock};
use crate::record::Record;
use crate::value::{Value, format_real};
use crate::{Error, Result};
use log::debug;
use std::fmt;
use std::sync::Arc;

/// A non-empty password. Its `Debug` output never shows the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Returns `None` for the empty string, which means "no password".
    pub fn new<S: Into<String>>(password: S) -> Option<Password> {
        let password = password.into();
        if password.is_empty() { None } else { Some(Password(password)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts the result of a password expression.
    ///
    /// Text is taken as is, numbers are written in decimal, and `None`,
    /// `False` and `""` mean that no password applies. Any other value is
    /// rejected.
    pub fn from_value(value: Value) -> std::result::Result<Option<Password>, ExpressionError> {
        match value {
            Value::None | Value::Boolean(false) => Ok(None),
            Value::String(text) => Ok(Password::new(text)),
            Value::Integer(number) => Ok(Password::new(number.to_string())),
            Value::Real(number) if number.is_finite() => Ok(Password::new(format_real(number))),
            other => Err(ExpressionError::InvalidValue(format!("{} {}", other.type_name(), other))),
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl AsRef<str> for Password {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Decides which password, if any, protects a rendered report.
#[derive(Clone, Debug, Default)]
pub struct PasswordResolver<C = SystemClock> {
    clock: C,
}

impl PasswordResolver {
    pub fn new() -> PasswordResolver {
        PasswordResolver::default()
    }
}

impl<C: Clock> PasswordResolver<C> {
    pub fn with_clock(clock: C) -> PasswordResolver<C> {
        PasswordResolver { clock }
    }

    /// Resolves the password for a report printed for `record`.
    ///
    /// Manual mode never yields a password here: the password is asked from
    /// the user when downloading. In auto mode the configured expression is
    /// evaluated with `object` bound to `record` and `time` to the clock.
    pub fn resolve(&self, config: &ReportConfig, record: Option<Arc<dyn Record>>) -> Result<Option<Password>> {
        if config.encryption_mode == EncryptionMode::Manual {
            debug!("manual encryption mode, password is asked on download");
            return Ok(None);
        }
        let Some(source) = config.expression() else {
            debug!("no password expression configured");
            return Ok(None);
        };

        let expression = Expression::parse(source).map_err(|err| Error::configuration(source, err))?;
        let scope = Scope::new(record, &self.clock);
        let value = expression.evaluate(&scope).map_err(|err| Error::configuration(source, err))?;
        let password = Password::from_value(value).map_err(|err| Error::configuration(source, err))?;

        if password.is_none() {
            debug!("password expression evaluated to an empty value");
        }
        Ok(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::FixedClock;
    use crate::record::RecordData;
    use chrono::{FixedOffset, TimeZone};

    fn order() -> Option<Arc<dyn Record>> {
        Some(Arc::new(
            RecordData::new("sale.order", 42)
                .with_field("name", "S00042")
                .with_field("client_order_ref", false),
        ))
    }

    fn resolve(config: &ReportConfig) -> Result<Option<Password>> {
        PasswordResolver::new().resolve(config, order())
    }

    fn password(text: &str) -> Option<Password> {
        Password::new(text)
    }

    #[test]
    fn manual_mode_never_computes() {
        let mut config = ReportConfig::manual();
        assert_eq!(resolve(&config).unwrap(), None);

        for expression in ["'abc123'", "object.id", "import os", ""] {
            config.password_expression = Some(expression.to_string());
            assert_eq!(resolve(&config).unwrap(), None, "{expression}");
        }
    }

    #[test]
    fn auto_mode_without_expression() {
        let mut config = ReportConfig::auto("");
        assert_eq!(resolve(&config).unwrap(), None);
        config.password_expression = Some("  \n ".to_string());
        assert_eq!(resolve(&config).unwrap(), None);
        config.password_expression = None;
        assert_eq!(resolve(&config).unwrap(), None);
    }

    #[test]
    fn literal_password() {
        assert_eq!(resolve(&ReportConfig::auto("'abc123'")).unwrap(), password("abc123"));
        // The record doesn't matter for a literal.
        let resolved = PasswordResolver::new().resolve(&ReportConfig::auto("'abc123'"), None).unwrap();
        assert_eq!(resolved, password("abc123"));
    }

    #[test]
    fn record_id_becomes_decimal_text() {
        assert_eq!(resolve(&ReportConfig::auto("object.id")).unwrap(), password("42"));
        assert_eq!(
            resolve(&ReportConfig::auto("object.name + '-' + str(object.id)")).unwrap(),
            password("S00042-42")
        );
    }

    #[test]
    fn empty_results_mean_no_password() {
        assert_eq!(resolve(&ReportConfig::auto("''")).unwrap(), None);
        assert_eq!(resolve(&ReportConfig::auto("None")).unwrap(), None);
        assert_eq!(resolve(&ReportConfig::auto("object.client_order_ref")).unwrap(), None);
        assert_eq!(
            PasswordResolver::new().resolve(&ReportConfig::auto("object.name"), None).unwrap(),
            None
        );
    }

    #[test]
    fn time_comes_from_the_clock() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let clock = FixedClock(offset.with_ymd_and_hms(2023, 1, 31, 23, 59, 0).unwrap());
        let resolver = PasswordResolver::with_clock(clock);
        let config = ReportConfig::auto("object.name + time.strftime('%y%m')");
        assert_eq!(resolver.resolve(&config, order()).unwrap(), password("S000422301"));
    }

    #[test]
    fn invalid_expressions_are_configuration_errors() {
        for source in ["import os", "__import__('os').system('ls')", "object.__class__", "object.name +", "True", "object"] {
            match resolve(&ReportConfig::auto(source)) {
                Err(Error::Configuration { expression, .. }) => assert_eq!(expression, source),
                other => panic!("{source}: unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn configuration_error_message_carries_expression() {
        let err = resolve(&ReportConfig::auto("object.missing")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "password expression is invalid: 'sale.order' object has no attribute 'missing'\nobject.missing"
        );
    }

    #[test]
    fn password_debug_is_redacted() {
        let secret = Password::new("hunter2").unwrap();
        assert_eq!(format!("{:?}", secret), "Password(***)");
        assert_eq!(secret.as_str(), "hunter2");
        assert_eq!(Password::new(""), None);
    }

    #[test]
    fn value_coercion() {
        assert_eq!(Password::from_value(Value::from(7.0)).unwrap(), password("7.0"));
        assert_eq!(Password::from_value(Value::from(0)).unwrap(), password("0"));
        assert!(Password::from_value(Value::from(true)).is_err());
        assert!(Password::from_value(Value::from(f64::NAN)).is_err());
    }
}
