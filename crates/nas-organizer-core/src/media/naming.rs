use std::sync::LazyLock;

use regex::Regex;

use super::grouping::{FOLDER_LEVEL_NFO_NAMES, FOLDER_LEVEL_SIDECAR_NAMES};

static IMDB_FULL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^tt\d{3,10}$").unwrap());
static YEAR_FULL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(19\d{2}|20\d{2})$").unwrap());
static FIRST_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub const DEFAULT_NAMING_TEMPLATE: &str = "{title} ({year}) [imdbid-{imdbid}]";

/// Make a free-text title usable as a single path component.
pub fn sanitize_title(value: &str) -> String {
    let replaced: String = value
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .filter(|c| !c.is_control())
        .collect();
    let collapsed = WHITESPACE_RE.replace_all(&replaced, " ");
    collapsed.trim_end_matches([' ', '.']).to_string()
}

pub fn is_valid_imdb_id(value: &str) -> bool {
    IMDB_FULL_RE.is_match(value)
}

/// Strict `19xx`/`20xx` year.
pub fn parse_year(value: &str) -> Option<i32> {
    let value = value.trim();
    if YEAR_FULL_RE.is_match(value) {
        value.parse().ok()
    } else {
        None
    }
}

/// First 4-digit run, for loosely typed manual input such as `2010-ish`.
pub fn first_year(value: &str) -> Option<i32> {
    FIRST_YEAR_RE.find(value).and_then(|m| m.as_str().parse().ok())
}

/// Render a stem from the naming template. `{title}`, `{year}` and `{imdbid}`
/// are substituted; the result is sanitized.
pub fn render_stem(template: &str, title: &str, year: i32, imdb_id: &str) -> String {
    let rendered = template
        .replace("{title}", title)
        .replace("{year}", &year.to_string())
        .replace("{imdbid}", imdb_id);
    sanitize_title(&rendered)
}

/// Suffix to keep when renaming a group member from `old_stem` to a new stem.
///
/// Handles `<stem>.ext`, `<stem>.<lang>.ext`, `<stem>-poster.jpg`, folder-level
/// `movie.nfo` (becomes `.nfo`) and folder-level artwork (becomes
/// `-poster.jpg`). `None` means the name is not a recognized sidecar pattern.
pub fn sidecar_suffix(name: &str, old_stem: &str) -> Option<String> {
    if let Some(rest) = name.strip_prefix(old_stem) {
        if rest.starts_with('.') || rest.starts_with('-') {
            return Some(rest.to_string());
        }
    }
    let lower = name.to_lowercase();
    if FOLDER_LEVEL_NFO_NAMES.contains(&lower.as_str()) {
        return Some(".nfo".to_string());
    }
    if FOLDER_LEVEL_SIDECAR_NAMES.contains(&lower.as_str()) {
        return Some(format!("-{}", lower));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("  AC/DC:\tLive \\ Wembley...  "), "AC-DC:Live - Wembley");
        assert_eq!(sanitize_title("Multiple    spaces"), "Multiple spaces");
        assert_eq!(sanitize_title("..."), "");
    }

    #[test]
    fn test_validators() {
        assert!(is_valid_imdb_id("tt1375666"));
        assert!(!is_valid_imdb_id("tt12"));
        assert!(!is_valid_imdb_id("xtt1375666"));
        assert_eq!(parse_year("2001"), Some(2001));
        assert_eq!(parse_year("1899"), None);
        assert_eq!(parse_year("20011"), None);
        assert_eq!(first_year("ca. 1984?"), Some(1984));
    }

    #[test]
    fn test_render_stem() {
        assert_eq!(
            render_stem(DEFAULT_NAMING_TEMPLATE, "Inception", 2010, "tt1375666"),
            "Inception (2010) [imdbid-tt1375666]"
        );
        assert_eq!(render_stem("{title}/{year}", "A", 1999, "tt000"), "A-1999");
    }

    #[test]
    fn test_sidecar_suffix() {
        assert_eq!(sidecar_suffix("Movie.mkv", "Movie").as_deref(), Some(".mkv"));
        assert_eq!(sidecar_suffix("Movie.de.forced.srt", "Movie").as_deref(), Some(".de.forced.srt"));
        assert_eq!(sidecar_suffix("Movie-poster.jpg", "Movie").as_deref(), Some("-poster.jpg"));
        assert_eq!(sidecar_suffix("movie.nfo", "Film").as_deref(), Some(".nfo"));
        assert_eq!(sidecar_suffix("Poster.JPG", "Film").as_deref(), Some("-poster.jpg"));
        assert_eq!(sidecar_suffix("Movie2.srt", "Movie"), None);
        assert_eq!(sidecar_suffix("random.jpg", "Movie"), None);
    }
}
