//! Static catalog of recipe types.
//!
//! The catalog is an XML document of repeated `<type><title>..</title></type>`
//! entries. Document order is significant: picker selection state is keyed by
//! position, so `index_of` and `title_at` are only stable while the same
//! resource is loaded.

use crate::model::RecipeType;
use once_cell::sync::OnceCell;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const TYPE_TAG: &[u8] = b"type";
const TITLE_TAG: &[u8] = b"title";

/// Catalog compiled into the binary.
pub const BUNDLED_CATALOG: &str = include_str!("../resources/recipetypes.xml");

static GLOBAL: OnceCell<RecipeTypeCatalog> = OnceCell::new();

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeTypeCatalog {
    types: Vec<RecipeType>,
}

impl RecipeTypeCatalog {
    /// Parse a catalog document. A malformed document yields an empty catalog.
    pub fn parse(xml: &str) -> Self {
        match parse_types(xml) {
            Ok(types) => Self { types },
            Err(err) => {
                warn!(?err, "malformed recipe type catalog; using empty catalog");
                Self::default()
            }
        }
    }

    /// Read and parse a catalog file. Unreadable files yield an empty catalog.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(xml) => {
                let catalog = Self::parse(&xml);
                debug!(path = %path.display(), count = catalog.len(), "loaded recipe types");
                catalog
            }
            Err(err) => {
                warn!(?err, path = %path.display(), "cannot read recipe type catalog");
                Self::default()
            }
        }
    }

    pub fn bundled() -> Self {
        Self::parse(BUNDLED_CATALOG)
    }

    /// Process-wide catalog. The first caller decides where it is loaded from;
    /// later `path` arguments are ignored.
    pub fn global(path: Option<&Path>) -> &'static RecipeTypeCatalog {
        GLOBAL.get_or_init(|| match path {
            Some(p) => Self::load(p),
            None => Self::bundled(),
        })
    }

    pub fn types(&self) -> &[RecipeType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Position of the first entry whose title matches `title` after
    /// title-casing both sides. Returns `len()` when nothing matches.
    pub fn index_of(&self, title: &str) -> usize {
        let wanted = capitalize_words(title);
        self.types
            .iter()
            .take_while(|t| capitalize_words(&t.title) != wanted)
            .count()
    }

    /// Title-cased title at `index`.
    pub fn title_at(&self, index: usize) -> Option<String> {
        self.types.get(index).map(|t| capitalize_words(&t.title))
    }
}

#[derive(Debug, Error)]
enum CatalogError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error("document ended with {0} unclosed element(s)")]
    Unclosed(usize),
}

fn parse_types(xml: &str) -> Result<Vec<RecipeType>, CatalogError> {
    let mut reader = Reader::from_str(xml);
    let mut types = Vec::new();
    let mut in_title = false;
    let mut title = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                let name = e.name();
                if name.as_ref() == TYPE_TAG {
                    title.clear();
                }
                in_title = name.as_ref() == TITLE_TAG;
            }
            Event::Empty(e) => {
                if e.name().as_ref() == TYPE_TAG {
                    types.push(RecipeType {
                        title: String::new(),
                    });
                }
            }
            Event::Text(t) if in_title => {
                let text = t.unescape()?;
                title.push_str(text.trim());
            }
            Event::CData(c) if in_title => {
                title.push_str(String::from_utf8_lossy(&c.into_inner()).trim());
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if e.name().as_ref() == TYPE_TAG {
                    types.push(RecipeType {
                        title: std::mem::take(&mut title),
                    });
                }
                in_title = false;
            }
            Event::Eof if depth > 0 => return Err(CatalogError::Unclosed(depth)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(types)
}

/// Upper-case the first letter of every whitespace-separated word and
/// lower-case the rest.
pub fn capitalize_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for ch in s.chars() {
        if ch.is_whitespace() {
            word_start = true;
            out.push(ch);
        } else if word_start {
            out.extend(ch.to_uppercase());
            word_start = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}
