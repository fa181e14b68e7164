// title/signing.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// The signing seam shared by TMDs and Tickets, and the fakesign (trucha bug) signer.

use sha1::{Digest, Sha1};
use thiserror::Error;

/// Both TMDs and Tickets are RSA-2048 signed, so the signed body always starts after the
/// signature type, signature, and padding.
pub const SIGNED_BODY_OFFSET: usize = 0x140;

/// The chance of a random SHA-1 digest starting with a zero byte is 1/256, so fakesigning takes
/// this many attempts on average.
pub const FAKESIGN_EXPECTED_TRIALS: u32 = 256;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("no value of the filler field produced a hash that starts with 00")]
    CannotFakesign,
    #[error("signed data could not be serialized")]
    IO(#[from] std::io::Error),
}

/// Something that carries an RSA-2048 signature over its body, plus a field that can be changed
/// freely without altering what the data means.
pub trait Signable {
    fn signature(&self) -> [u8; 256];
    fn set_signature(&mut self, signature: [u8; 256]);
    /// Serializes the data covered by the signature.
    fn signed_body(&self) -> Result<Vec<u8>, std::io::Error>;
    /// Overwrites the unused field that can be brute forced when fakesigning.
    fn set_filler(&mut self, value: u16);
}

/// A strategy for producing a signature that a console will accept.
pub trait Signer {
    fn sign<T: Signable + ?Sized>(&self, item: &mut T) -> Result<(), SigningError>;
}

/// Signs data using the strncmp (trucha) bug: the signature is zeroed, and the filler field is
/// incremented until the SHA-1 of the signed body begins with a zero byte. Expect about
/// [`FAKESIGN_EXPECTED_TRIALS`] hashes per call, and at most 65536.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fakesigner;

impl Signer for Fakesigner {
    fn sign<T: Signable + ?Sized>(&self, item: &mut T) -> Result<(), SigningError> {
        item.set_signature([0; 256]);
        for filler in 0..=u16::MAX {
            item.set_filler(filler);
            if body_hash(item)?[0] == 0 {
                return Ok(());
            }
        }
        Err(SigningError::CannotFakesign)
    }
}

fn body_hash<T: Signable + ?Sized>(item: &T) -> Result<[u8; 20], std::io::Error> {
    let mut hasher = Sha1::new();
    hasher.update(item.signed_body()?);
    Ok(hasher.finalize().into())
}

/// Consumes a signable item and returns it signed with the provided strategy.
pub fn resign<T: Signable, S: Signer>(mut item: T, signer: &S) -> Result<T, SigningError> {
    signer.sign(&mut item)?;
    Ok(item)
}

/// Gets whether data is fakesigned: a null signature and a body hash starting with 00.
pub fn is_fakesigned<T: Signable + ?Sized>(item: &T) -> bool {
    if item.signature() != [0; 256] {
        return false;
    }
    matches!(body_hash(item), Ok(hash) if hash[0] == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blob {
        signature: [u8; 256],
        filler: u16,
        body: Vec<u8>,
    }

    impl Signable for Blob {
        fn signature(&self) -> [u8; 256] {
            self.signature
        }
        fn set_signature(&mut self, signature: [u8; 256]) {
            self.signature = signature;
        }
        fn signed_body(&self) -> Result<Vec<u8>, std::io::Error> {
            let mut body = self.body.clone();
            body.extend_from_slice(&self.filler.to_be_bytes());
            Ok(body)
        }
        fn set_filler(&mut self, value: u16) {
            self.filler = value;
        }
    }

    #[test]
    fn test_fakesign_blob() {
        let blob = Blob { signature: [0xAA; 256], filler: 0, body: b"some signed body".to_vec() };
        assert!(!is_fakesigned(&blob));
        let blob = resign(blob, &Fakesigner).unwrap();
        assert!(is_fakesigned(&blob));
        assert_eq!(blob.signature, [0; 256]);
    }
}
