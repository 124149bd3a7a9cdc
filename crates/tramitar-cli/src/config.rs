//! CLI runtime configuration

/// Output verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// Progress and results
    #[default]
    Normal,
    /// Per-step diagnostics
    Verbose,
    /// Everything, including wait polling
    Debug,
}

impl Verbosity {
    /// Derive verbosity from the global flags
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            Self::Quiet
        } else {
            match verbose {
                0 => Self::Normal,
                1 => Self::Verbose,
                _ => Self::Debug,
            }
        }
    }

    /// Whether non-essential output should be printed
    #[must_use]
    pub const fn is_quiet(&self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Default tracing filter directive for this level
    #[must_use]
    pub const fn filter(&self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
            Self::Debug => "trace",
        }
    }
}
