use url::Url;

pub use url::ParseError;

/// Query parameters that must never show up in logs.
const SECRET_PARAMS: [&str; 2] = ["hash", "apikey"];

/// Join `path` onto `base` and append `params` in order.
///
/// A missing trailing slash on `base` is tolerated so that
/// `https://host/v1` and `https://host/v1/` resolve the same way.
pub fn build_url(base: &str, path: &str, params: &[(&str, String)]) -> Result<Url, ParseError> {
    let mut base = base.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let mut url = Url::parse(&base)?.join(path.trim_start_matches('/'))?;
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (name, value) in params {
            query.append_pair(name, value);
        }
    }
    Ok(url)
}

/// Render `url` with secret query values replaced by `***`.
pub fn redact(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if SECRET_PARAMS.contains(&k.as_ref()) {
                (k.into_owned(), "***".to_string())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    if pairs.is_empty() {
        return redacted.to_string();
    }
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
