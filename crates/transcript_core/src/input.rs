/// Splits user-supplied text into URLs, one per line.
///
/// Lines are trimmed and blank lines dropped; everything else is kept in order.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    filter_urls(raw.lines())
}

/// Drops blank and whitespace-only entries, trimming the rest.
pub fn filter_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    urls.into_iter()
        .map(|url| url.as_ref().trim().to_owned())
        .filter(|url| !url.is_empty())
        .collect()
}
