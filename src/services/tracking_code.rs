//! Códigos de seguimiento públicos
//!
//! Formato `SC-` + 8 caracteres `[A-Z0-9]`. Se generan al crear la
//! solicitud y no cambian nunca.

use rand::Rng;

pub const TRACKING_CODE_PREFIX: &str = "SC-";
pub const TRACKING_CODE_LENGTH: usize = 8;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generar un código nuevo con el RNG del hilo
pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..TRACKING_CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}{}", TRACKING_CODE_PREFIX, suffix)
}

/// Normalizar un código introducido por el usuario (las búsquedas no distinguen mayúsculas)
pub fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Comprobar que un código (ya normalizado) tiene el formato esperado
pub fn is_well_formed(code: &str) -> bool {
    match code.strip_prefix(TRACKING_CODE_PREFIX) {
        Some(suffix) => {
            suffix.len() == TRACKING_CODE_LENGTH
                && suffix
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_generated_codes_are_well_formed() {
        for _ in 0..200 {
            let code = generate();
            assert!(is_well_formed(&code), "bad code {}", code);
        }
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let mut a = rand::rngs::StdRng::seed_from_u64(7);
        let mut b = rand::rngs::StdRng::seed_from_u64(7);
        assert_eq!(generate_with(&mut a), generate_with(&mut b));
    }

    #[test]
    fn test_normalize_uppercases_and_trims() {
        assert_eq!(normalize("  sc-ab12cd34 "), "SC-AB12CD34");
        assert!(is_well_formed(&normalize("sc-ab12cd34")));
    }

    #[test]
    fn test_malformed_codes() {
        assert!(!is_well_formed("SC-ABC"));
        assert!(!is_well_formed("XX-AB12CD34"));
        assert!(!is_well_formed("SC-ab12cd34"));
        assert!(!is_well_formed("SC-AB12CD3!"));
    }
}
