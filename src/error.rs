use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Body mass must be finite and positive, got {0}")]
    InvalidMass(f64),

    #[error("Body radius must be finite and positive, got {0}")]
    InvalidRadius(f64),

    #[error("Body {field} is not finite")]
    NonFinite { field: &'static str },

    #[error("Invalid simulation config `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
