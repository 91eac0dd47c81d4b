//! Canonicalization of raw transaction text into the single string the
//! vectorizer sees.

/// Lower-cases `text`, replaces everything outside `[a-z0-9]` and whitespace
/// with a space, collapses whitespace runs and trims.
///
/// Empty and all-punctuation inputs normalize to the empty string.
///
/// # Example
/// ```
/// use txcat::normalize;
///
/// assert_eq!(normalize("  Uber *Trip  #42! "), "uber trip 42");
/// ```
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds the feature text for a transaction: the normalized description
/// twice followed by the normalized merchant.
///
/// Repeating the description doubles its term frequencies, so it outweighs
/// the merchant name.
///
/// # Example
/// ```
/// use txcat::build_feature_text;
///
/// assert_eq!(build_feature_text("coffee", "Starbucks"), "coffee coffee starbucks");
/// assert_eq!(build_feature_text("", "Shell"), "shell");
/// ```
pub fn build_feature_text(description: &str, merchant: &str) -> String {
    let description = normalize(description);
    let merchant = normalize(merchant);
    format!("{description} {description} {merchant}").trim().to_string()
}

/// Number of whitespace separated tokens in a feature text
pub fn word_count(feature_text: &str) -> usize {
    feature_text.split_whitespace().count()
}
