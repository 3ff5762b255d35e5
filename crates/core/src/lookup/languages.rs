//! Norwegian language names as printed on ark.no → ISO 639 codes.

use std::collections::HashMap;

use once_cell::sync::Lazy;

static LANGUAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("norsk", "no"),
        ("bokmål", "nb"),
        ("norsk bokmål", "nb"),
        ("nynorsk", "nn"),
        ("norsk nynorsk", "nn"),
        ("engelsk", "en"),
        ("svensk", "sv"),
        ("dansk", "da"),
        ("islandsk", "is"),
        ("færøysk", "fo"),
        ("finsk", "fi"),
        ("samisk", "smi"),
        ("nordsamisk", "se"),
        ("tysk", "de"),
        ("fransk", "fr"),
        ("spansk", "es"),
        ("italiensk", "it"),
        ("portugisisk", "pt"),
        ("nederlandsk", "nl"),
        ("polsk", "pl"),
        ("russisk", "ru"),
        ("ukrainsk", "uk"),
        ("arabisk", "ar"),
        ("somali", "so"),
        ("tyrkisk", "tr"),
        ("persisk", "fa"),
        ("japansk", "ja"),
        ("kinesisk", "zh"),
        ("latin", "la"),
        ("gresk", "el"),
    ])
});

/// Code for one language name; case and surrounding whitespace are ignored.
pub fn language_code(name: &str) -> Option<&'static str> {
    LANGUAGES.get(name.trim().to_lowercase().as_str()).copied()
}

/// Map a comma-separated language cell to codes, dropping names not in the table.
pub fn parse_languages(cell: &str) -> Vec<String> {
    cell.split(',')
        .filter_map(|name| {
            let code = language_code(name);
            if code.is_none() && !name.trim().is_empty() {
                tracing::debug!("Unmapped language: {}", name.trim());
            }
            code
        })
        .map(String::from)
        .collect()
}
