// Slug and absolute URL derivation for topic keywords.

/// Lowercases `keyword`, keeps ASCII letters and digits, treats whitespace
/// and `-` as word breaks, drops everything else, and joins the words with
/// `-` behind a leading `/`. A keyword with no usable characters gives `/`.
pub fn url_path(keyword: &str) -> String {
    let lowered = keyword.to_lowercase();
    let mut words: Vec<String> = Vec::new();
    let mut word = String::new();
    for ch in lowered.chars() {
        if ch.is_ascii_alphanumeric() {
            word.push(ch);
        } else if (ch.is_whitespace() || ch == '-') && !word.is_empty() {
            words.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        words.push(word);
    }
    format!("/{}", words.join("-"))
}

pub fn full_path(domain: &str, url_path: &str) -> String {
    let host = domain.trim();
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host)
        .trim_end_matches('/');
    format!("https://{host}{url_path}")
}
