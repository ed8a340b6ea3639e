//! Kodi/Jellyfin `.nfo` metadata extraction.

use std::collections::HashMap;
use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use thiserror::Error;

static IMDB_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"tt\d{3,10}").unwrap());
static FOUR_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());
static DATE_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());

const MEDIA_ROOTS: &[&str] = &["movie", "tvshow", "episodedetails"];
const DATE_FIELDS: &[&str] = &["premiered", "releasedate", "released", "dateadded"];
const ID_FIELDS: &[&str] = &["imdbid", "imdb_id", "imdb", "id", "uniqueid"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NfoError {
    #[error("NFO is not recoverable XML: {0}")]
    Malformed(String),
}

/// Fields needed for naming. `original_title` is preferred when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NfoInfo {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub imdb_id: Option<String>,
}

impl NfoInfo {
    pub fn preferred_title(&self) -> Option<&str> {
        self.original_title.as_deref().or(self.title.as_deref())
    }
}

/// Text of direct children keyed by tag. Only the first occurrence of each
/// tag is kept.
#[derive(Debug, Default)]
struct Fields(HashMap<String, String>);

impl Fields {
    fn text(&self, tag: &str) -> Option<String> {
        let text = self.0.get(tag)?.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    fn keep_first(&mut self, tag: String, value: String) {
        self.0.entry(tag).or_insert(value);
    }
}

#[derive(Debug, Default)]
struct TopLevel {
    name: String,
    /// Text before the first child element.
    leading_text: String,
    has_children: bool,
    fields: Fields,
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Parse a `<movie>`, `<tvshow>` or `<episodedetails>` document.
///
/// A document that is not a single element is read as if wrapped in a
/// synthetic root: the first media element wins, otherwise the top-level
/// elements themselves are the fields. Mismatched or unclosed tags are an
/// error.
pub fn parse_nfo(xml_text: &str) -> Result<NfoInfo, NfoError> {
    let text = xml_text.trim_start_matches(|c: char| c == '\u{feff}' || c.is_whitespace());
    let mut reader = Reader::from_str(text);
    reader.check_end_names(true);

    let mut elements: Vec<TopLevel> = Vec::new();
    let mut stray_text = false;
    let mut depth = 0usize;
    let mut child: Option<String> = None;
    let mut buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = local_name(e.local_name().as_ref());
                match depth {
                    1 => elements.push(TopLevel { name, ..Default::default() }),
                    2 => {
                        if let Some(top) = elements.last_mut() {
                            top.has_children = true;
                        }
                        child = Some(name);
                        buf.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(e.local_name().as_ref());
                match depth {
                    0 => elements.push(TopLevel { name, ..Default::default() }),
                    1 => {
                        if let Some(top) = elements.last_mut() {
                            top.has_children = true;
                            top.fields.keep_first(name, String::new());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                let value = match t.unescape() {
                    Ok(value) => value.into_owned(),
                    Err(_) => String::from_utf8_lossy(&t).into_owned(),
                };
                match depth {
                    0 => stray_text |= !value.trim().is_empty(),
                    1 => {
                        if let Some(top) = elements.last_mut().filter(|top| !top.has_children) {
                            top.leading_text.push_str(&value);
                        }
                    }
                    2 if child.is_some() => buf.push_str(&value),
                    _ => {}
                }
            }
            Ok(Event::CData(c)) => {
                let value = String::from_utf8_lossy(&c);
                match depth {
                    0 => stray_text |= !value.trim().is_empty(),
                    1 => {
                        if let Some(top) = elements.last_mut().filter(|top| !top.has_children) {
                            top.leading_text.push_str(&value);
                        }
                    }
                    2 if child.is_some() => buf.push_str(&value),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let (Some(name), Some(top)) = (child.take(), elements.last_mut()) {
                        top.fields.keep_first(name, buf.clone());
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(NfoError::Malformed(e.to_string())),
            Ok(_) => {}
        }
    }

    if depth != 0 {
        return Err(NfoError::Malformed("unclosed element at end of document".to_string()));
    }

    if elements.len() == 1 && !stray_text {
        return Ok(extract(&elements[0].fields));
    }
    if let Some(media) = elements.iter().find(|e| MEDIA_ROOTS.contains(&e.name.as_str())) {
        return Ok(extract(&media.fields));
    }
    let mut wrapper = Fields::default();
    for top in elements {
        wrapper.keep_first(top.name, top.leading_text);
    }
    Ok(extract(&wrapper))
}

fn extract(node: &Fields) -> NfoInfo {
    let title = node.text("title");
    let original_title = node.text("originaltitle");

    let mut year: Option<i32> = node
        .text("year")
        .and_then(|raw| FOUR_DIGITS_RE.find(&raw).and_then(|m| m.as_str().parse().ok()));
    if year.is_none() {
        year = DATE_FIELDS.iter().find_map(|tag| {
            let value = node.text(tag)?;
            DATE_YEAR_RE
                .captures(&value)
                .and_then(|caps| caps[1].parse().ok())
        });
    }

    let imdb_id = ID_FIELDS
        .iter()
        .find_map(|tag| node.text(tag))
        .and_then(|raw| IMDB_RE.find(&raw).map(|m| m.as_str().to_string()));

    NfoInfo {
        title,
        original_title,
        year,
        imdb_id,
    }
}
