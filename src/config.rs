//! Configuration options for the luafn registry.

use std::time::Duration;

/// Configuration options for opening a function registry.
#[derive(Debug, Clone)]
pub struct Options {
    /// Create the registry directory if it doesn't exist.
    /// Default: true
    pub create_if_missing: bool,

    /// Error if the registry already exists.
    /// Default: false
    pub error_if_exists: bool,

    /// Fsync the edit log after every appended edit.
    /// Disabling reduces durability but increases write throughput.
    /// Default: true
    pub sync_writes: bool,

    /// Maximum execution time for a scripted function invocation,
    /// enforced by the script runtime's instruction hook.
    /// Set to `None` for no limit.
    /// Default: 5 seconds
    pub script_timeout: Option<Duration>,

    /// Verify at save time that a script body actually implements the
    /// values-function contract, in addition to parsing it.
    ///
    /// When false, only a syntax check is performed and an accepted body
    /// may still fail at invocation time if it does not export a `values`
    /// function.
    /// Default: false
    pub verify_function_contract: bool,

    /// Maximum accepted length of a definition name, in characters.
    /// Default: 255
    pub max_name_length: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_writes: true,
            script_timeout: Some(Duration::from_secs(5)),
            verify_function_contract: false,
            max_name_length: 255,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the registry if it doesn't exist.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether opening an existing registry is an error.
    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Enables or disables fsync after each edit-log append.
    pub fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Sets the script execution timeout.
    pub fn script_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.script_timeout = timeout;
        self
    }

    /// Enables or disables save-time verification of the function contract.
    pub fn verify_function_contract(mut self, value: bool) -> Self {
        self.verify_function_contract = value;
        self
    }

    /// Sets the maximum accepted definition name length.
    pub fn max_name_length(mut self, value: usize) -> Self {
        self.max_name_length = value;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_name_length == 0 {
            return Err(crate::Error::invalid_argument("max_name_length must be > 0"));
        }
        if let Some(timeout) = self.script_timeout {
            if timeout.is_zero() {
                return Err(crate::Error::invalid_argument(
                    "script_timeout must be > 0 when set",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert!(opts.create_if_missing);
        assert!(!opts.error_if_exists);
        assert!(opts.sync_writes);
        assert!(!opts.verify_function_contract);
        assert_eq!(opts.max_name_length, 255);
    }

    #[test]
    fn test_options_builder() {
        let opts = Options::new()
            .sync_writes(false)
            .script_timeout(Some(Duration::from_millis(250)))
            .verify_function_contract(true);

        assert!(!opts.sync_writes);
        assert_eq!(opts.script_timeout, Some(Duration::from_millis(250)));
        assert!(opts.verify_function_contract);
    }

    #[test]
    fn test_options_validation() {
        let mut opts = Options::default();
        assert!(opts.validate().is_ok());

        opts.max_name_length = 0;
        assert!(opts.validate().is_err());

        opts.max_name_length = 255;
        opts.script_timeout = Some(Duration::ZERO);
        assert!(opts.validate().is_err());

        opts.script_timeout = None;
        assert!(opts.validate().is_ok());
    }
}
