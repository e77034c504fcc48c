//! Email address syntax validation

use crate::models::Validation;
use ::validator::ValidateEmail;

/// Syntax-only email validator (no MX lookups)
///
/// Bare-domain addresses such as `admin@localhost` are accepted unless
/// `require_tld` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailValidator {
    require_tld: bool,
}

impl EmailValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator that rejects domains without a dot
    pub fn strict() -> Self {
        Self { require_tld: true }
    }

    pub fn with_require_tld(mut self, require_tld: bool) -> Self {
        self.require_tld = require_tld;
        self
    }

    pub fn validate(&self, input: &str) -> Validation {
        if input.is_empty() {
            return Validation::invalid("address is empty");
        }

        let (local, domain) = match input.split_once('@') {
            Some((local, domain)) if !domain.contains('@') => (local, domain),
            _ => {
                return Validation::invalid(format!(
                    "address must contain exactly one '@', found {}",
                    input.matches('@').count()
                ));
            }
        };

        if local.is_empty() {
            return Validation::invalid("local part is empty");
        }
        if domain.is_empty() {
            return Validation::invalid("domain part is empty");
        }
        if self.require_tld && !domain.contains('.') {
            return Validation::invalid("domain has no top-level domain");
        }
        if !input.validate_email() {
            return Validation::invalid("address is not valid email syntax");
        }

        Validation::valid()
    }

    pub fn is_valid(&self, input: &str) -> bool {
        self.validate(input).valid
    }
}
