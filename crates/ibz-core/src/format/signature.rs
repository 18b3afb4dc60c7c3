use std::io::{self, Read, Write};

use crate::error::IbzError;
use crate::telemetry::tags;
use crate::types::Result;

use super::SIGNATURE;

pub fn write_signature<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(&SIGNATURE)?;
    Ok(())
}

/// Consumes the signature, failing with [`IbzError::FormatIncompatible`] on a
/// mismatch or when the source is shorter than the signature.
pub fn verify_signature<R: Read>(reader: &mut R) -> Result<()> {
    let mut magic = [0u8; SIGNATURE.len()];
    match reader.read_exact(&mut magic) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
            tracing::debug!(target: tags::TARGET_FORMAT, "source shorter than signature");
            return Err(IbzError::FormatIncompatible("missing container signature"));
        }
        Err(error) => return Err(error.into()),
    }

    if magic != SIGNATURE {
        tracing::debug!(target: tags::TARGET_FORMAT, ?magic, "signature mismatch");
        return Err(IbzError::FormatIncompatible("invalid container signature"));
    }

    Ok(())
}
