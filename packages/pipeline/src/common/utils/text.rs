use std::collections::HashSet;

/// Normalize free text for comparison
///
/// Lowercases, folds Spanish accents (á→a, ñ→n), strips punctuation, and
/// collapses whitespace. Listings for the same property often differ only
/// in diacritics and formatting between portals.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(fold_accent)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        _ => c,
    }
}

/// Jaccard similarity over normalized word tokens, in [0, 1]
///
/// Both-empty inputs are treated as identical (1.0).
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();

    if union == 0 {
        return 0.0;
    }

    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_accents() {
        assert_eq!(
            normalize_text("Casa con jardín en Cañada"),
            "casa con jardin en canada"
        );
    }

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(
            normalize_text("¡Oportunidad! Precio: $2,500,000"),
            "oportunidad precio 2500000"
        );
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize_text("  casa   en\tventa\n"),
            "casa en venta"
        );
    }

    #[test]
    fn test_jaccard_identical() {
        let a = normalize_text("Casa en venta Zapopan");
        let b = normalize_text("casa en venta zapopan");
        assert_eq!(token_jaccard(&a, &b), 1.0);
    }

    #[test]
    fn test_jaccard_disjoint() {
        assert_eq!(token_jaccard("casa venta", "terreno renta"), 0.0);
    }

    #[test]
    fn test_jaccard_partial_overlap() {
        // {casa, en, venta} vs {casa, en, renta}: 2 shared of 4 total
        let sim = token_jaccard("casa en venta", "casa en renta");
        assert!((sim - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_jaccard_both_empty() {
        assert_eq!(token_jaccard("", ""), 1.0);
    }

    #[test]
    fn test_jaccard_one_empty() {
        assert_eq!(token_jaccard("casa", ""), 0.0);
    }
}
