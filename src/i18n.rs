// i18n.rs
//
// Runtime UI strings:
// - Built-in catalogs are compiled in from assets/i18n/<lang>.json
// - A file at <exe_dir>/assets/i18n/<lang>.json or ./assets/i18n/<lang>.json overrides them
// - Lookup: selected lang -> en -> the key itself
// - tr_with("key", &[("name", ..)]) fills {name} placeholders

use once_cell::sync::OnceCell;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const FALLBACK_LANG: &str = "en";

/// Languages offered in the UI: (code, native name).
pub const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("zh-Hans", "简体中文"),
    ("fr", "Français"),
];

fn builtin(lang: &str) -> Option<&'static str> {
    match lang {
        "en" => Some(include_str!("../assets/i18n/en.json")),
        "zh-Hans" => Some(include_str!("../assets/i18n/zh-Hans.json")),
        "fr" => Some(include_str!("../assets/i18n/fr.json")),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub lang: String,
    map: HashMap<String, String>,
    fallback: HashMap<String, String>,
}

impl Catalog {
    pub fn load(lang: &str) -> Self {
        let map = load_lang(lang);
        let fallback = if lang == FALLBACK_LANG {
            HashMap::new()
        } else {
            load_lang(FALLBACK_LANG)
        };
        if map.is_empty() {
            log::warn!("no strings for language '{lang}', using {FALLBACK_LANG}");
        }
        Self {
            lang: lang.to_string(),
            map,
            fallback,
        }
    }

    pub fn tr(&self, key: &str) -> String {
        self.map
            .get(key)
            .or_else(|| self.fallback.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Placeholders without a matching argument are kept as-is.
    pub fn tr_with(&self, key: &str, args: &[(&str, String)]) -> String {
        let mut s = self.tr(key);
        for (name, value) in args {
            s = s.replace(&format!("{{{name}}}"), value);
        }
        s
    }
}

fn parse_map(text: &str, origin: &str) -> Option<HashMap<String, String>> {
    match serde_json::from_str(text) {
        Ok(map) => Some(map),
        Err(err) => {
            log::warn!("ignoring malformed string table {origin}: {err}");
            None
        }
    }
}

fn load_json_map(path: &Path) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    parse_map(&text, &path.display().to_string())
}

/// <exe_dir>/assets/i18n/<lang>.json, then ./assets/i18n/<lang>.json
fn find_lang_file(lang: &str) -> Option<PathBuf> {
    let file = format!("{lang}.json");
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    exe_dir
        .into_iter()
        .chain(std::iter::once(PathBuf::new()))
        .map(|dir| dir.join("assets").join("i18n").join(&file))
        .find(|p| p.exists())
}

fn load_lang(lang: &str) -> HashMap<String, String> {
    if let Some(map) = find_lang_file(lang).and_then(|p| load_json_map(&p)) {
        return map;
    }
    builtin(lang)
        .and_then(|text| parse_map(text, lang))
        .unwrap_or_default()
}

static I18N: OnceCell<RwLock<Catalog>> = OnceCell::new();

/// Selects the UI language. Later calls switch languages.
pub fn init(lang: &str) {
    let catalog = Catalog::load(lang);
    log::info!("UI language: {lang}");
    match I18N.get() {
        Some(lock) => {
            if let Ok(mut current) = lock.write() {
                *current = catalog;
            }
        }
        None => {
            let _ = I18N.set(RwLock::new(catalog));
        }
    }
}

pub fn current_lang() -> String {
    I18N.get()
        .and_then(|l| l.read().ok().map(|c| c.lang.clone()))
        .unwrap_or_else(|| FALLBACK_LANG.to_string())
}

pub fn tr(key: &str) -> String {
    match I18N.get().and_then(|l| l.read().ok()) {
        Some(catalog) => catalog.tr(key),
        None => key.to_string(),
    }
}

pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    match I18N.get().and_then(|l| l.read().ok()) {
        Some(catalog) => catalog.tr_with(key, args),
        None => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_filled() {
        let catalog = Catalog::load("en");
        let text = catalog.tr_with("status.zoom", &[("zoom", "40".into())]);
        assert_eq!(text, "Zoom: 40%");
    }

    #[test]
    fn missing_keys_fall_back_to_english_then_key() {
        let mut catalog = Catalog::load("fr");
        catalog.map.remove("error.retry");
        assert_eq!(catalog.tr("error.retry"), "Retry");
        assert_eq!(catalog.tr("no.such.key"), "no.such.key");
    }

    #[test]
    fn unknown_language_uses_english() {
        let catalog = Catalog::load("xx");
        assert_eq!(catalog.tr("view.reset"), "Reset view");
    }

    #[test]
    fn every_language_covers_the_english_keys() {
        let en = parse_map(builtin("en").unwrap(), "en").unwrap();
        for (code, _) in LANGUAGES {
            let map = parse_map(builtin(code).unwrap(), code).unwrap();
            for key in en.keys() {
                assert!(map.contains_key(key), "{code} lacks {key}");
            }
        }
    }
}
