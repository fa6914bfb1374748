use thiserror::Error;

/// Returned when a subsystem name matches no [`Owner`][crate::Owner] display
/// name. The enable mask is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no timing subsystem is named `{0}`")]
pub struct UnknownSubsystemError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_names_the_offender() {
        let err = UnknownSubsystemError("JIT".to_string());
        assert_eq!("no timing subsystem is named `JIT`", err.to_string());
    }
}
