use rand::RngExt;

/// Symbols a generated short code is drawn from.
pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Draw `length` symbols independently and uniformly from [`ALPHABET`].
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn is_well_formed_code(code: &str, length: usize) -> bool {
        code.len() == length && code.bytes().all(|b| ALPHABET.contains(&b))
    }

    #[test]
    fn test_generated_code_matches_policy() {
        for length in [1, 6, 12, 32] {
            let code = generate_code(length);
            assert!(is_well_formed_code(&code, length), "bad code: {code}");
        }
    }

    #[test]
    fn test_alphabet_is_62_distinct_alphanumerics() {
        let distinct: HashSet<u8> = ALPHABET.iter().copied().collect();
        assert_eq!(distinct.len(), 62);
        assert!(ALPHABET.iter().all(u8::is_ascii_alphanumeric));
    }

    #[test]
    fn test_generator_covers_alphabet() {
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            seen.extend(generate_code(6).bytes());
        }
        // 12k draws over 62 symbols; missing any one is vanishingly unlikely
        assert_eq!(seen.len(), 62);
    }
}
