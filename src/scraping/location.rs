/// Profile handle from a location: the first path segment when it starts with `@`.
///
/// Accepts a full URL (`https://www.tiktok.com/@alice/video/1`) or a bare path
/// (`/@alice`). Returns `None` for non-profile locations.
pub fn identity_from_location(location: &str) -> Option<String> {
    let path = match url::Url::parse(location) {
        Ok(u) => u.path().to_string(),
        Err(_) => location
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let first = path.split('/').map(str::trim).find(|s| !s.is_empty())?;
    let handle = first.strip_prefix('@')?;
    if handle.is_empty() {
        return None;
    }
    Some(handle.to_string())
}
