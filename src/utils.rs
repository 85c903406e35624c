pub fn get_tqdm_style() -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(
        "{percent:>3}% |{wide_bar}| {pos}/{len} [{elapsed_precise}<{eta_precise}] {msg}",
    )
    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
    .progress_chars("██ ")
}

/// Capitalize the first letter of every word, lowercase the rest
///
/// Word boundaries are any non-alphabetic character, so `ede_b` becomes
/// `Ede_B`.
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut boundary = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if boundary {
                result.extend(ch.to_uppercase());
            } else {
                result.extend(ch.to_lowercase());
            }
            boundary = false;
        } else {
            result.push(ch);
            boundary = true;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("baseline"), "Baseline");
        assert_eq!(title_case("dt_slru"), "Dt_Slru");
        assert_eq!(title_case("EDE run2b"), "Ede Run2B");
        assert_eq!(title_case("hit rate hz"), "Hit Rate Hz");
    }
}
