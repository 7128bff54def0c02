use thiserror::Error;

use crate::rounding::RoundingError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error(transparent)]
    Rounding(#[from] RoundingError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl PricingError {
    /// Stable identifier used in command outcomes and logs.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Rounding(RoundingError::DomainGap { .. }) => "rounding_domain_gap",
            Self::Rounding(_) => "invalid_rounding_table",
            Self::Configuration(_) => "configuration",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("invalid pricing input: {message}")]
    InvalidInput { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => {
                "The snapshot could not be priced. Check the rounding table covers every price."
            }
            Self::Internal { .. } => "The pricing engine is misconfigured.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::InvalidInput { correlation_id, .. } | Self::Internal { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}

impl PricingError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        match self {
            Self::Rounding(_) => InterfaceError::InvalidInput { message, correlation_id },
            Self::Configuration(_) => InterfaceError::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::errors::{InterfaceError, PricingError};
    use crate::rounding::RoundingError;

    #[test]
    fn rounding_gap_maps_to_invalid_input() {
        let interface =
            PricingError::from(RoundingError::DomainGap { price: Decimal::from(1000) })
                .into_interface("run-1");

        assert!(matches!(
            interface,
            InterfaceError::InvalidInput { ref correlation_id, ref message }
                if correlation_id == "run-1" && message.contains("1000")
        ));
        assert_eq!(
            interface.user_message(),
            "The snapshot could not be priced. Check the rounding table covers every price."
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = PricingError::Configuration("missing rounding table".to_owned())
            .into_interface("run-2");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.correlation_id(), "run-2");
    }

    #[test]
    fn error_classes_are_stable() {
        assert_eq!(
            PricingError::from(RoundingError::DomainGap { price: Decimal::ONE }).error_class(),
            "rounding_domain_gap"
        );
        assert_eq!(
            PricingError::from(RoundingError::EmptyTable).error_class(),
            "invalid_rounding_table"
        );
        assert_eq!(PricingError::Configuration(String::new()).error_class(), "configuration");
    }
}
