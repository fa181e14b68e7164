// title/crypto.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// AES-128-CBC helpers for Title Keys and content.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::cipher::generic_array::GenericArray;
use crate::title::commonkeys::{get_common_key, CommonKeySlot};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

// Title Keys use the Title ID as the IV, padded out to 16 bytes.
fn title_id_to_iv(title_id: [u8; 8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&title_id);
    iv
}

// Content uses its index as the IV, padded out to 16 bytes.
fn index_to_iv(index: u16) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..2].copy_from_slice(&index.to_be_bytes());
    iv
}

fn cbc_encrypt(buf: &mut [u8], key: [u8; 16], iv: [u8; 16]) {
    let mut encryptor = Aes128CbcEnc::new(&key.into(), &iv.into());
    for block in buf.chunks_exact_mut(16) {
        encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

fn cbc_decrypt(buf: &mut [u8], key: [u8; 16], iv: [u8; 16]) {
    let mut decryptor = Aes128CbcDec::new(&key.into(), &iv.into());
    for block in buf.chunks_exact_mut(16) {
        decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

/// Decrypts a Title Key using the specified common key and the corresponding Title ID.
pub fn decrypt_title_key(title_key_enc: [u8; 16], common_key_index: u8, title_id: [u8; 8], is_dev: bool) -> [u8; 16] {
    let mut title_key = title_key_enc;
    cbc_decrypt(&mut title_key, get_common_key(common_key_index, is_dev), title_id_to_iv(title_id));
    title_key
}

/// Encrypts a Title Key using the specified common key and the corresponding Title ID.
pub fn encrypt_title_key(title_key_dec: [u8; 16], common_key_index: u8, title_id: [u8; 8], is_dev: bool) -> [u8; 16] {
    encrypt_title_key_for_slot(title_key_dec, CommonKeySlot::from_index(common_key_index, is_dev), title_id)
}

/// Encrypts a Title Key under an explicit common key slot.
pub fn encrypt_title_key_for_slot(title_key_dec: [u8; 16], slot: CommonKeySlot, title_id: [u8; 8]) -> [u8; 16] {
    let mut title_key = title_key_dec;
    cbc_encrypt(&mut title_key, slot.key(), title_id_to_iv(title_id));
    title_key
}

/// Decrypts content using the corresponding Title Key and content index. The output keeps the
/// 16-byte aligned length of the input; callers trim it to the recorded content size.
pub fn decrypt_content(data: &[u8], title_key: [u8; 16], index: u16) -> Vec<u8> {
    let mut buf = data.to_vec();
    buf.resize((buf.len() + 15) & !15, 0);
    cbc_decrypt(&mut buf, title_key, index_to_iv(index));
    buf
}

/// Encrypts content using the corresponding Title Key and content index. The content is zero
/// padded up to the next 16-byte boundary of `size`.
pub fn encrypt_content(data: &[u8], title_key: [u8; 16], index: u16, size: u64) -> Vec<u8> {
    let mut buf = data.to_vec();
    buf.resize(((size + 15) & !15) as usize, 0);
    cbc_encrypt(&mut buf, title_key, index_to_iv(index));
    buf
}
