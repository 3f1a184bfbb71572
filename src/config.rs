/// Limits applied while evaluating a program.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of nested function calls. Going deeper is reported as
    /// a fault instead of exhausting the host stack.
    pub max_call_depth: usize,
}

impl Config {
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
        }
    }
}
