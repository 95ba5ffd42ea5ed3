use rand::{rngs::OsRng, Rng, RngCore};

use crate::kernel::traits::BaseTokenSource;

/// OS-entropy token source for pair codes and share tokens.
pub struct RandomTokenSource;

impl BaseTokenSource for RandomTokenSource {
    fn pair_code(&self) -> String {
        let mut rng = OsRng;
        (0..6)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    fn share_token(&self) -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_code_is_six_digits() {
        let source = RandomTokenSource;
        for _ in 0..50 {
            let code = source.pair_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn share_token_is_64_hex_chars() {
        let source = RandomTokenSource;
        let token = source.share_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn share_tokens_do_not_repeat() {
        let source = RandomTokenSource;
        assert_ne!(source.share_token(), source.share_token());
    }
}
