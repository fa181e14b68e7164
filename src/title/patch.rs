// title/patch.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Applies offset-based binary patches to decrypted content.

use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("expected bytes {expected} for the patch at offset {offset:#X} were not found in the content")]
    OriginalBytesNotFound { offset: usize, expected: String },
    #[error("patch at offset {offset:#X} writes {len} bytes, which runs past the end of the {size} byte content")]
    OutOfRange { offset: usize, len: usize, size: usize },
}

/// A single edit to a content: `replacement` is written at `offset`, but only if `original`
/// can be found in the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub offset: usize,
    pub original: Vec<u8>,
    pub replacement: Vec<u8>,
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

fn check(buffer: &[u8], patch: &Patch) -> Result<(), PatchError> {
    // The original bytes only have to exist somewhere in the content. Their location isn't
    // required to match the patch offset.
    if !contains(buffer, &patch.original) {
        return Err(PatchError::OriginalBytesNotFound { offset: patch.offset, expected: hex::encode(&patch.original) });
    }
    if patch.offset.checked_add(patch.replacement.len()).is_none_or(|end| end > buffer.len()) {
        return Err(PatchError::OutOfRange { offset: patch.offset, len: patch.replacement.len(), size: buffer.len() });
    }
    Ok(())
}

fn write(buffer: &mut [u8], patch: &Patch) {
    buffer[patch.offset..patch.offset + patch.replacement.len()].copy_from_slice(&patch.replacement);
}

/// Applies one patch to a copy of the content. The input is never modified.
pub fn apply_patch(buffer: &[u8], patch: &Patch) -> Result<Vec<u8>, PatchError> {
    check(buffer, patch)?;
    let mut patched = buffer.to_vec();
    write(&mut patched, patch);
    Ok(patched)
}

/// Applies a list of patches in order. Every patch is checked against the unpatched content
/// first, so either all of them are applied or none are.
pub fn apply_patches(buffer: &[u8], patches: &[Patch]) -> Result<Vec<u8>, PatchError> {
    for patch in patches {
        check(buffer, patch)?;
    }
    let mut patched = buffer.to_vec();
    for patch in patches {
        debug!("writing {} bytes at {:#X}", patch.replacement.len(), patch.offset);
        write(&mut patched, patch);
    }
    Ok(patched)
}
