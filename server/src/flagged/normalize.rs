/// Canonical form used to compare URLs against the catalog.
///
/// Trims whitespace, drops an `http://`/`https://` scheme, a leading `www.`
/// and one trailing slash. Everything else (path, query, case) is kept.
pub fn normalize_url(url: &str) -> String {
    let mut s = url.trim();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = rest;
            break;
        }
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix('/') {
        s = rest;
    }
    s.trim().to_string()
}
