//! Error types for line and relay operations.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while driving GPIO lines.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The GPIO utility is not installed.
    #[error("GPIO tool unavailable: {program}")]
    ToolUnavailable { program: String },

    /// A GPIO command exited with an error.
    #[error("GPIO command failed on pin {pin}: {message}")]
    CommandFailed { pin: String, message: String },

    /// The line returned something other than `0` or `1`.
    #[error("Invalid line reading: {reading:?}")]
    InvalidReading { reading: String },

    /// Line or relay configuration error.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl HardwareError {
    pub fn tool_unavailable(program: impl Into<String>) -> Self {
        Self::ToolUnavailable {
            program: program.into(),
        }
    }

    pub fn command_failed(pin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            pin: pin.into(),
            message: message.into(),
        }
    }

    pub fn invalid_reading(reading: impl Into<String>) -> Self {
        Self::InvalidReading {
            reading: reading.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display() {
        let error = HardwareError::command_failed("7", "exit status 1");
        assert!(matches!(error, HardwareError::CommandFailed { .. }));
        assert_eq!(
            error.to_string(),
            "GPIO command failed on pin 7: exit status 1"
        );
    }

    #[test]
    fn test_invalid_reading_display() {
        let error = HardwareError::invalid_reading("2\n");
        assert_eq!(error.to_string(), "Invalid line reading: \"2\\n\"");
    }

    #[test]
    fn test_tool_unavailable_display() {
        let error = HardwareError::tool_unavailable("gpio");
        assert_eq!(error.to_string(), "GPIO tool unavailable: gpio");
    }
}
