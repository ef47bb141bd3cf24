use rand::Rng;

/// Length of the public order id.
pub const ORDER_NUMBER_LEN: usize = 8;

const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random order id such as `K7Q2ZP0A`.
///
/// Uniqueness is not guaranteed here; callers check the database and the
/// `order_number` column carries a unique index.
pub fn generate_order_number() -> String {
    let mut rng = rand::thread_rng();
    (0..ORDER_NUMBER_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ORDER_NUMBER_CHARSET.len());
            ORDER_NUMBER_CHARSET[idx] as char
        })
        .collect()
}

/// True for strings that look like a generated order id.
pub fn is_valid_order_number(candidate: &str) -> bool {
    candidate.len() == ORDER_NUMBER_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_numbers_are_well_formed() {
        for _ in 0..1_000 {
            let number = generate_order_number();
            assert!(is_valid_order_number(&number), "bad order id {number}");
        }
    }

    #[test]
    fn rejects_lowercase_and_wrong_length() {
        assert!(!is_valid_order_number("abcdefgh"));
        assert!(!is_valid_order_number("ABC"));
        assert!(!is_valid_order_number(""));
        assert!(is_valid_order_number("AB12CD34"));
    }
}
