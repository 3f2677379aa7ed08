//! Arborist error types and exit-code mapping.

use color_print::cformat;

/// Process exit code for user aborts (declined prompt, Ctrl-C).
pub const EXIT_ABORTED: i32 = 130;

/// Top-level error type.
///
/// Four kinds, mirroring how failures are reported:
/// - [`ArbError::User`]: bad flags, missing workspace, invalid name
/// - [`ArbError::Environment`]: no remotes, ambiguous roles, missing base
/// - [`ArbError::Operation`]: conflict, rejected push, partial rename
/// - [`ArbError::Aborted`]: declined prompt or SIGINT
///
/// The first three exit 1; `Aborted` exits 130. None produce a stack trace.
#[derive(Debug)]
pub enum ArbError {
    /// The user asked for something invalid.
    User { message: String },
    /// The surrounding git environment can't support the request.
    /// Carries specific guidance where we have any.
    Environment {
        message: String,
        hint: Option<String>,
    },
    /// An operation ran and failed (conflicts, rejected pushes, partial
    /// renames). The per-repo summary has already been printed; `message`
    /// is the closing line.
    Operation { message: String },
    /// The user declined a prompt or interrupted us.
    Aborted,
}

impl ArbError {
    pub fn user(message: impl Into<String>) -> Self {
        ArbError::User {
            message: message.into(),
        }
    }

    pub fn environment(message: impl Into<String>) -> Self {
        ArbError::Environment {
            message: message.into(),
            hint: None,
        }
    }

    pub fn environment_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        ArbError::Environment {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn operation(message: impl Into<String>) -> Self {
        ArbError::Operation {
            message: message.into(),
        }
    }

    /// The process exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            ArbError::Aborted => EXIT_ABORTED,
            _ => 1,
        }
    }
}

impl std::fmt::Display for ArbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArbError::User { message } => {
                write!(f, "{}", cformat!("<red>error:</> {message}"))
            }
            ArbError::Environment { message, hint } => {
                write!(f, "{}", cformat!("<red>error:</> {message}"))?;
                if let Some(hint) = hint {
                    write!(f, "\n{}", cformat!("<dim>hint: {hint}</>"))?;
                }
                Ok(())
            }
            ArbError::Operation { message } => {
                write!(f, "{}", cformat!("<red>error:</> {message}"))
            }
            ArbError::Aborted => write!(f, "Aborted."),
        }
    }
}

impl std::error::Error for ArbError {}

/// Extract the exit code for an `anyhow::Error`, defaulting to 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ArbError>()
        .map(ArbError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_exits_130() {
        assert_eq!(ArbError::Aborted.exit_code(), EXIT_ABORTED);
    }

    #[test]
    fn operation_exits_1() {
        assert_eq!(ArbError::operation("push rejected").exit_code(), 1);
    }

    #[test]
    fn exit_code_through_anyhow() {
        let err: anyhow::Error = ArbError::Aborted.into();
        assert_eq!(exit_code(&err), 130);
        let err: anyhow::Error = anyhow::anyhow!("plain");
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn aborted_prints_exactly() {
        assert_eq!(ArbError::Aborted.to_string(), "Aborted.");
    }
}
