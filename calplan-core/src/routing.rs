//! Title-based routing of events to destination calendars.
//!
//! A resolver maps an event title to a [`Category`]; the [`CalendarTable`]
//! maps the category to a remote calendar id. Rules are evaluated in list
//! order and the first match wins, because the checks overlap (a title can
//! contain both "estudio" and "trabajo").

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Google's alias for the user's main calendar.
pub const PRIMARY_CALENDAR: &str = "primary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Study,
    Work,
    Routine,
    Improvement,
    Default,
    /// A calendar id that is not in the table (reverse lookups only)
    Unknown,
}

impl Category {
    /// Key used for this category in the calendar table.
    pub fn table_key(self) -> Option<&'static str> {
        match self {
            Category::Study => Some("ESTUDIOS"),
            Category::Work => Some("TRABAJO"),
            Category::Routine => Some("RUTINAS"),
            Category::Improvement => Some("MEJORA"),
            Category::Default => Some("DEFAULT"),
            Category::Unknown => None,
        }
    }

    pub fn from_table_key(key: &str) -> Option<Self> {
        match key.trim().to_uppercase().as_str() {
            "ESTUDIOS" => Some(Category::Study),
            "TRABAJO" => Some(Category::Work),
            "RUTINAS" => Some(Category::Routine),
            "MEJORA" => Some(Category::Improvement),
            "DEFAULT" => Some(Category::Default),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_key().unwrap_or("UNKNOWN"))
    }
}

/// Category name → remote calendar id. Read-only for the life of a run.
///
/// Keys are stored upper-cased so lookups do not depend on how the settings
/// loader cased them. Iteration is in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarTable {
    entries: BTreeMap<String, String>,
}

impl CalendarTable {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        entries.into_iter().collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.trim().to_uppercase())
            .map(String::as_str)
    }

    /// Calendar id for a category, falling back to [`PRIMARY_CALENDAR`] when
    /// the entry is missing or blank.
    pub fn calendar_id_for(&self, category: Category) -> String {
        category
            .table_key()
            .and_then(|key| self.get(key))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(PRIMARY_CALENDAR)
            .to_string()
    }

    /// Reverse lookup: which category owns this calendar id.
    pub fn category_of(&self, calendar_id: &str) -> Category {
        self.entries
            .iter()
            .find(|(_, id)| id.as_str() == calendar_id)
            .and_then(|(key, _)| Category::from_table_key(key))
            .unwrap_or(Category::Unknown)
    }

    /// Entries as (name, calendar id), in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CalendarTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        CalendarTable {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into().trim().to_uppercase(), v.into()))
                .collect(),
        }
    }
}

/// Where an event is placed remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRoute {
    pub category: Category,
    pub calendar_id: String,
}

/// A routing strategy. Implementations are pure and safe to share.
pub trait RouteResolver: Send + Sync {
    fn classify(&self, title: &str) -> Category;

    fn resolve(&self, title: &str, table: &CalendarTable) -> CalendarRoute {
        let category = self.classify(title);
        CalendarRoute {
            category,
            calendar_id: table.calendar_id_for(category),
        }
    }
}

/// Matches when the normalized title contains any of the needles.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    needles: Vec<String>,
    category: Category,
}

impl KeywordRule {
    pub fn new<S: AsRef<str>>(needles: &[S], category: Category) -> Self {
        KeywordRule {
            needles: needles.iter().map(|n| n.as_ref().to_lowercase()).collect(),
            category,
        }
    }

    fn matches(&self, normalized_title: &str) -> bool {
        self.needles
            .iter()
            .any(|needle| normalized_title.contains(needle.as_str()))
    }
}

/// Substring heuristic over lower-cased, trimmed titles.
#[derive(Debug, Clone)]
pub struct KeywordResolver {
    rules: Vec<KeywordRule>,
}

impl KeywordResolver {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        KeywordResolver { rules }
    }
}

impl Default for KeywordResolver {
    /// Study, Work, Routine, Improvement, in that order.
    fn default() -> Self {
        KeywordResolver::new(vec![
            KeywordRule::new(&["estudio", "📚"], Category::Study),
            KeywordRule::new(&["trabajo", "💼"], Category::Work),
            KeywordRule::new(&["rutina", "🌀"], Category::Routine),
            // The bare gear also covers the emoji-presentation form "⚙️"
            KeywordRule::new(&["mejora", "⚙"], Category::Improvement),
        ])
    }
}

impl RouteResolver for KeywordResolver {
    fn classify(&self, title: &str) -> Category {
        let normalized = title.trim().to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches(&normalized))
            .map(|rule| rule.category)
            .unwrap_or(Category::Default)
    }
}

/// Anchored, case-insensitive pattern over a canonical title.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pattern: Regex,
    category: Category,
}

impl PatternRule {
    pub fn new(pattern: &str, category: Category) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(PatternRule { pattern, category })
    }
}

/// Canonical titles the schedule prompt asks for, each with its optional
/// leading emoji. Keep in sync with the prompt template.
const CANONICAL_PATTERNS: &[(&str, Category)] = &[
    (r"^(💼\s*)?Trabajo$", Category::Work),
    (r"^(🚗\s*)?Preparación y desplazamiento al trabajo", Category::Work),
    (r"^(📚\s*)?Estudio\s*—\s*.+", Category::Study),
    (r"^(💻\s*)?Mejora profesional", Category::Improvement),
    (r"^(🇬🇧\s*)?Inglés$", Category::Improvement),
    (r"^(☕\s*)?Desayuno$", Category::Routine),
    (r"^(🍝\s*)?Almuerzo$", Category::Routine),
    (r"^(🍽️\s*)?Cena$", Category::Routine),
    (r"^(🍎\s*)?Comer algo ligero$", Category::Routine),
    (r"^(🧘‍♂️\s*)?Pausa activa$", Category::Routine),
    (r"^(🥗\s*)?Pausa larga$", Category::Routine),
    (r"^(😴\s*)?Descanso$", Category::Routine),
    (r"^(😌\s*)?Descanso breve$", Category::Routine),
    (r"^(🏃‍♂️\s*)?Ejercicio matutino$", Category::Routine),
    (r"^(🌿\s*)?Bloque libre planificado$", Category::Routine),
];

static CANONICAL_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    CANONICAL_PATTERNS
        .iter()
        .map(|(pattern, category)| {
            PatternRule::new(pattern, *category).expect("canonical routing pattern should compile")
        })
        .collect()
});

/// Strict classifier over known canonical titles.
#[derive(Debug, Clone)]
pub struct PatternResolver {
    rules: Vec<PatternRule>,
}

impl PatternResolver {
    pub fn new(rules: Vec<PatternRule>) -> Self {
        PatternResolver { rules }
    }
}

impl Default for PatternResolver {
    fn default() -> Self {
        PatternResolver::new(CANONICAL_RULES.clone())
    }
}

impl RouteResolver for PatternResolver {
    fn classify(&self, title: &str) -> Category {
        let title = title.trim();

        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(title))
            .map(|rule| rule.category)
            .unwrap_or(Category::Default)
    }
}

/// Which resolver a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingStrategy {
    #[default]
    Keyword,
    Pattern,
}

impl RoutingStrategy {
    pub fn resolver(self) -> Box<dyn RouteResolver> {
        match self {
            RoutingStrategy::Keyword => Box::new(KeywordResolver::default()),
            RoutingStrategy::Pattern => Box::new(PatternResolver::default()),
        }
    }
}
