use sha2::{Digest, Sha256};

/// Generate a content hash for change detection on re-scrape
///
/// Uses SHA256 of normalized text to detect when listing content has changed.
/// Normalization rules:
/// - Convert to lowercase
/// - Remove all non-alphanumeric characters (except spaces)
/// - Collapse multiple spaces into single spaces
/// - Trim leading/trailing whitespace
///
/// This makes the hash robust against minor formatting changes while
/// still detecting meaningful content changes. A re-scraped listing whose
/// hash is unchanged keeps its dedup state; a changed hash resets it.
pub fn content_hash(text: &str) -> String {
    // Normalize text
    let normalized = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    // Generate SHA256 hash
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_same_hash() {
        let text1 = "Casa en venta en Zapopan, 3 recámaras";
        let text2 = "Casa en venta en Zapopan, 3 recámaras";

        assert_eq!(content_hash(text1), content_hash(text2));
    }

    #[test]
    fn test_case_insensitive() {
        let text1 = "Departamento amueblado en Polanco";
        let text2 = "DEPARTAMENTO AMUEBLADO EN POLANCO";
        let text3 = "departamento amueblado en polanco";

        let hash1 = content_hash(text1);
        let hash2 = content_hash(text2);
        let hash3 = content_hash(text3);

        assert_eq!(hash1, hash2);
        assert_eq!(hash2, hash3);
    }

    #[test]
    fn test_punctuation_ignored() {
        let text1 = "Precio: $2,500,000 MXN. ¡Oportunidad!";
        let text2 = "Precio 2500000 MXN Oportunidad";
        let text3 = "Precio: $2,500,000 MXN... ¡¡Oportunidad!!";

        let hash1 = content_hash(text1);
        let hash2 = content_hash(text2);
        let hash3 = content_hash(text3);

        assert_eq!(hash1, hash2);
        assert_eq!(hash2, hash3);
    }

    #[test]
    fn test_whitespace_normalized() {
        let text1 = "Terreno en esquina con uso de suelo mixto";
        let text2 = "Terreno    en    esquina    con uso de suelo mixto";
        let text3 = "  Terreno en esquina con uso de suelo mixto  ";

        let hash1 = content_hash(text1);
        let hash2 = content_hash(text2);
        let hash3 = content_hash(text3);

        assert_eq!(hash1, hash2);
        assert_eq!(hash2, hash3);
    }

    #[test]
    fn test_different_content_different_hash() {
        let text1 = "Casa con 3 recámaras y 2 baños";
        let text2 = "Casa con 4 recámaras y 2 baños";

        assert_ne!(content_hash(text1), content_hash(text2));
    }

    #[test]
    fn test_word_order_matters() {
        let text1 = "Venta de casa en Guadalajara";
        let text2 = "Casa en Guadalajara de venta";

        // Word order DOES matter - these should have different hashes
        assert_ne!(content_hash(text1), content_hash(text2));
    }

    #[test]
    fn test_hash_format() {
        let text = "Test content";
        let hash = content_hash(text);

        // SHA256 hash should be 64 hex characters
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_empty_string() {
        let hash = content_hash("");
        assert_eq!(hash.len(), 64); // Still produces valid hash
    }

    #[test]
    fn test_accents_preserved() {
        // Accented characters are alphanumeric and participate in the hash
        let text1 = "Casa con jardín";
        let text2 = "Casa con jardin";

        assert_ne!(content_hash(text1), content_hash(text2));
    }
}
