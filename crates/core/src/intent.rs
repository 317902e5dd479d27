use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::models::{Classification, Intent};

/// One scoring rule: every non-overlapping match adds `weight` to `intent`.
#[derive(Debug)]
pub struct IntentRule {
    pub intent: Intent,
    pub weight: u32,
    pattern: Regex,
}

impl IntentRule {
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn score(&self, lower: &str) -> u32 {
        self.pattern.find_iter(lower).count() as u32 * self.weight
    }
}

// Primary weather and chart terms weigh 2, every other rule weighs 1.
const RULE_TABLE: &[(Intent, &str, u32)] = &[
    (Intent::Weather, r"\b(clima|tempo|temperatura|chuva|sol|vento)\b", 2),
    (Intent::Weather, r"\b(previsão|meteorol|°c|celsius|fahrenheit)\b", 1),
    (Intent::Weather, r"\b(quente|frio|nublado|ensolarado)\b", 1),
    (Intent::Chart, r"\b(gráfico|chart|plotar|visualiz|diagram)\b", 2),
    (Intent::Chart, r"\b(histórico|evolução|tendência|comparar)\b", 1),
    (Intent::Chart, r"\b(linha|barras|pizza|scatter)\b", 1),
    (Intent::Research, r"\b(pib|economia|dados|estatística)\b", 1),
    (Intent::Research, r"\b(município|cidade|estado|região)\b", 1),
    (Intent::Research, r"\b(ibge|banco\s+central|bcb)\b", 1),
];

static INTENT_RULES: Lazy<Vec<IntentRule>> = Lazy::new(|| {
    RULE_TABLE
        .iter()
        .map(|(intent, pattern, weight)| IntentRule {
            intent: *intent,
            weight: *weight,
            pattern: Regex::new(pattern).expect("valid intent rule"),
        })
        .collect()
});

const PLACE_GAZETTEER: &[&str] = &[
    "são paulo",
    "rio de janeiro",
    "brasília",
    "salvador",
    "fortaleza",
    "belo horizonte",
    "manaus",
    "curitiba",
    "recife",
    "porto alegre",
    "belém",
    "goiânia",
    "guarulhos",
    "campinas",
    "são luís",
];

const DOMAIN_KEYWORDS: &[&str] = &[
    "pib",
    "economia",
    "renda",
    "população",
    "desenvolvimento",
    "crescimento",
    "investimento",
    "emprego",
    "inflação",
];

pub fn intent_rules() -> &'static [IntentRule] {
    &INTENT_RULES
}

/// Pluggable classification step used by the dispatcher.
pub trait Classifier: Send + Sync {
    fn classify(&self, query: &str) -> Classification;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleClassifier;

impl Classifier for RuleClassifier {
    fn classify(&self, query: &str) -> Classification {
        classify_query(query)
    }
}

pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Scores per intent, in `Intent::ALL` order.
pub fn score_intents(query: &str) -> Vec<(Intent, u32)> {
    let lower = query.to_lowercase();

    Intent::ALL
        .iter()
        .map(|intent| {
            let score = intent_rules()
                .iter()
                .filter(|rule| rule.intent == *intent)
                .map(|rule| rule.score(&lower))
                .sum();
            (*intent, score)
        })
        .collect()
}

pub fn classify_query(query: &str) -> Classification {
    let lower = query.to_lowercase();
    let scores = score_intents(&lower);

    let max_score = scores.iter().map(|(_, score)| *score).max().unwrap_or(0);
    let total_score: u32 = scores.iter().map(|(_, score)| *score).sum();
    let leaders = scores
        .iter()
        .filter(|(_, score)| *score == max_score)
        .map(|(intent, _)| *intent)
        .collect::<Vec<_>>();

    let intent = match leaders.as_slice() {
        [winner] => *winner,
        _ => Intent::DEFAULT,
    };

    Classification {
        intent,
        confidence: max_score as f32 / total_score.max(1) as f32,
        entities: extract_entities(&lower),
        keywords: extract_keywords(&lower),
    }
}

fn extract_entities(lower: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    for place in PLACE_GAZETTEER {
        if lower.contains(place) {
            let titled = title_case(place);
            if !entities.contains(&titled) {
                entities.push(titled);
            }
        }
    }
    entities
}

fn extract_keywords(lower: &str) -> Vec<String> {
    DOMAIN_KEYWORDS
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}

fn title_case(input: &str) -> String {
    input
        .split_word_bounds()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) if first.is_alphabetic() => {
                    first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                }
                _ => word.to_string(),
            }
        })
        .collect()
}
