use rand::Rng;

const ALPHABET: &[u8] = b"1234567890abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 10;

/// Short id linking a summary embedding to its raw document.
pub fn gen_document_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
