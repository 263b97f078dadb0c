// Only BadMagic ever escapes the parser's chunk loop. The rest are handled
// locally (skip the chunk, recover the value, end the token loop).

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    #[error("unexpected end of input at offset {offset} (wanted {wanted} bytes)")]
    Eof { offset: usize, wanted: usize },

    #[error("header does not start with the `<roblox!` magic")]
    BadMagic,

    #[error("varint exceeded 64-bit shift budget")]
    Overflow,

    #[error("invalid CFrame rotation discriminator {0}")]
    BadRotationId(u8),
}

pub type Result<T> = std::result::Result<T, ParseError>;
