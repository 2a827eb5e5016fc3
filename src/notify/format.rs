//! Message bodies for new-entry notifications

use crate::catalog::CatalogEntry;
use crate::notify::NotifyError;
use url::Url;

/// HTML body with a clickable title
///
/// Fails when the entry URL is not an absolute http(s) URL, since a broken
/// link would make the rich message useless.
pub fn format_rich(entry: &CatalogEntry) -> Result<String, NotifyError> {
    let url = Url::parse(&entry.url)
        .map_err(|e| NotifyError::Format(format!("bad entry URL '{}': {}", entry.url, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(NotifyError::Format(format!(
            "unsupported URL scheme '{}'",
            url.scheme()
        )));
    }

    let mut text = format!(
        "<b>New entry found</b>\n<a href=\"{}\">{}</a>",
        html_escape::encode_double_quoted_attribute(url.as_str()),
        html_escape::encode_text(&entry.title)
    );
    if let Some(users) = entry.concurrent_users {
        text.push_str(&format!("\nPlaying now: <b>{}</b>", users));
    }

    Ok(text)
}

pub fn format_plain(entry: &CatalogEntry) -> String {
    let mut text = format!("New entry found\n{}\n{}", entry.title, entry.url);
    if let Some(users) = entry.concurrent_users {
        text.push_str(&format!("\nPlaying now: {}", users));
    }
    text
}
