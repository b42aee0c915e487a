//! Reply templates.
//!
//! Templates are plain text files (Telegram HTML) with `$field` / `${field}` placeholders.
//! `$$` renders a literal `$`; placeholders with no value are left as they are. Files are
//! read on every render so they can be edited while the bot runs.

use std::{
    collections::{BTreeMap, HashMap},
    fmt, fs,
    path::PathBuf,
    sync::OnceLock,
};

use regex::{Captures, Regex};

use crate::{errors::Error, formatting::escape_html, Result};

/// Templates the bot knows about, each with a fixed set of fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemplateName {
    CacheQuick,
    CacheFull,
    Trackable,
    Start,
    Help,
}

impl TemplateName {
    pub const ALL: [TemplateName; 5] = [
        TemplateName::CacheQuick,
        TemplateName::CacheFull,
        TemplateName::Trackable,
        TemplateName::Start,
        TemplateName::Help,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateName::CacheQuick => "cache-quick",
            TemplateName::CacheFull => "cache-full",
            TemplateName::Trackable => "trackable",
            TemplateName::Start => "start",
            TemplateName::Help => "help",
        }
    }

    /// Environment variable that overrides this template's file path.
    pub fn env_key(self) -> String {
        format!(
            "TEMPLATE_{}",
            self.as_str().replace('-', "_").to_ascii_uppercase()
        )
    }

    /// The exact set of fields a render of this template must provide.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            TemplateName::CacheQuick => &[
                "type",
                "code",
                "name",
                "size",
                "favorites",
                "diff",
                "terrain",
            ],
            TemplateName::CacheFull => &[
                "type",
                "code",
                "name",
                "size",
                "favorites",
                "diff",
                "terrain",
                "lat",
                "long",
            ],
            TemplateName::Trackable => &["type", "code", "name", "owner", "location"],
            TemplateName::Start | TemplateName::Help => &[],
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named field values for one render. Values are raw text; escaping happens at render time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateFields {
    values: BTreeMap<&'static str, String>,
}

impl TemplateFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Check the supplied fields against the template's declared set, both ways.
    pub fn validate(&self, name: TemplateName) -> Result<()> {
        let declared = name.fields();
        if let Some(extra) = self.values.keys().find(|k| !declared.contains(k)) {
            return Err(Error::Template(format!("{name}: unknown field `{extra}`")));
        }
        if let Some(missing) = declared.iter().find(|k| !self.values.contains_key(*k)) {
            return Err(Error::Template(format!("{name}: missing field `{missing}`")));
        }
        Ok(())
    }
}

/// Template renderer port.
///
/// Rendering never fails outright: on any problem the implementation logs it and returns a
/// fixed placeholder string that is still safe to send.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: TemplateName, fields: &TemplateFields) -> String;
}

#[derive(Clone, Debug)]
pub enum TemplateSource {
    File(PathBuf),
    Inline(String),
}

/// File-backed template renderer.
#[derive(Clone, Debug, Default)]
pub struct TemplateStore {
    sources: HashMap<TemplateName, TemplateSource>,
}

impl TemplateStore {
    pub fn from_paths(paths: &HashMap<TemplateName, PathBuf>) -> Self {
        let sources = paths
            .iter()
            .map(|(name, path)| (*name, TemplateSource::File(path.clone())))
            .collect();
        Self { sources }
    }

    pub fn with_source(mut self, name: TemplateName, source: TemplateSource) -> Self {
        self.sources.insert(name, source);
        self
    }

    /// Names whose backing file does not exist right now.
    pub fn missing_files(&self) -> Vec<(TemplateName, PathBuf)> {
        let mut out: Vec<(TemplateName, PathBuf)> = self
            .sources
            .iter()
            .filter_map(|(name, src)| match src {
                TemplateSource::File(p) if !p.is_file() => Some((*name, p.clone())),
                _ => None,
            })
            .collect();
        out.sort();
        out
    }

    fn load(&self, name: TemplateName) -> Result<String> {
        match self.sources.get(&name) {
            Some(TemplateSource::File(path)) => Ok(fs::read_to_string(path)?),
            Some(TemplateSource::Inline(text)) => Ok(text.clone()),
            None => Err(Error::Template(format!("{name}: no template configured"))),
        }
    }
}

impl TemplateRenderer for TemplateStore {
    fn render(&self, name: TemplateName, fields: &TemplateFields) -> String {
        let text = match self.load(name) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(template = %name, error = %e, "failed to read template");
                return format!("Error reading {name}-template");
            }
        };

        if let Err(e) = fields.validate(name) {
            tracing::error!(template = %name, error = %e, "template fields rejected");
            return format!("Error rendering {name}-template");
        }

        substitute(&text, fields)
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:(\$)|([A-Za-z_][A-Za-z0-9_]*)|\{([A-Za-z_][A-Za-z0-9_]*)\})")
            .expect("valid placeholder regex")
    })
}

/// Replace placeholders with HTML-escaped field values; unknown placeholders stay verbatim.
pub fn substitute(text: &str, fields: &TemplateFields) -> String {
    placeholder_re()
        .replace_all(text, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let field = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
            match field.and_then(|f| fields.get(f)) {
                Some(value) => escape_html(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}-{}-{ts}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn trackable_fields() -> TemplateFields {
        TemplateFields::new()
            .with("type", "Travel Bug")
            .with("code", "TB12345")
            .with("name", "Rusty <Crab>")
            .with("owner", "ferris")
            .with("location", "In the hands of ferris")
    }

    #[test]
    fn substitutes_both_placeholder_styles() {
        let fields = TemplateFields::new().with("code", "GC1").with("name", "Bridge");
        assert_eq!(
            substitute("$code: ${name}s cost $$5", &fields),
            "GC1: Bridges cost $5"
        );
    }

    #[test]
    fn unknown_placeholders_are_left_intact() {
        let fields = TemplateFields::new().with("code", "GC1");
        assert_eq!(substitute("$code $nope ${also}", &fields), "GC1 $nope ${also}");
    }

    #[test]
    fn values_are_html_escaped() {
        let store = TemplateStore::default().with_source(
            TemplateName::Trackable,
            TemplateSource::Inline("<b>$name</b> ($code) by $owner".to_string()),
        );
        assert_eq!(
            store.render(TemplateName::Trackable, &trackable_fields()),
            "<b>Rusty &lt;Crab&gt;</b> (TB12345) by ferris"
        );
    }

    #[test]
    fn reads_template_files() {
        let dir = tmp_dir("gcb-templates");
        let path = dir.join("start.html");
        fs::write(&path, "Hello! Send me a GC code.").unwrap();

        let mut paths = HashMap::new();
        paths.insert(TemplateName::Start, path);
        let store = TemplateStore::from_paths(&paths);

        assert_eq!(
            store.render(TemplateName::Start, &TemplateFields::new()),
            "Hello! Send me a GC code."
        );
        assert!(store.missing_files().is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unreadable_template_renders_placeholder() {
        let mut paths = HashMap::new();
        paths.insert(TemplateName::Help, PathBuf::from("/nonexistent/gcb/help.html"));
        let store = TemplateStore::from_paths(&paths);

        assert_eq!(
            store.render(TemplateName::Help, &TemplateFields::new()),
            "Error reading help-template"
        );
        assert_eq!(store.missing_files().len(), 1);
    }

    #[test]
    fn unconfigured_template_renders_placeholder() {
        let store = TemplateStore::default();
        assert_eq!(
            store.render(TemplateName::Start, &TemplateFields::new()),
            "Error reading start-template"
        );
    }

    #[test]
    fn field_set_is_validated() {
        let missing = TemplateFields::new().with("code", "TB1");
        assert!(matches!(
            missing.validate(TemplateName::Trackable),
            Err(Error::Template(_))
        ));

        let extra = trackable_fields().with("terrain", "x");
        assert!(extra.validate(TemplateName::Trackable).is_err());

        assert!(trackable_fields().validate(TemplateName::Trackable).is_ok());

        let store = TemplateStore::default().with_source(
            TemplateName::Trackable,
            TemplateSource::Inline("$code".to_string()),
        );
        assert_eq!(
            store.render(TemplateName::Trackable, &missing),
            "Error rendering trackable-template"
        );
    }

    #[test]
    fn full_cache_template_declares_coordinates() {
        let fields = TemplateName::CacheFull.fields();
        assert!(fields.contains(&"lat") && fields.contains(&"long"));
        assert_eq!(TemplateName::CacheFull.env_key(), "TEMPLATE_CACHE_FULL");
    }
}
