/// Exit code for unreadable input, bad arguments, and failed writes.
pub const EXIT_INPUT: u8 = 2;
/// Exit code for a solve whose preconditions were not met.
pub const EXIT_PRECONDITION: u8 = 3;
/// Exit code for numeric failures (non-finite values).
pub const EXIT_NUMERIC: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(EXIT_PRECONDITION, message)
    }

    pub fn numeric(message: impl Into<String>) -> Self {
        Self::new(EXIT_NUMERIC, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
