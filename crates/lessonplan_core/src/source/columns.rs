//! Header alias resolution for curriculum and note tables.
//!
//! Datasets exported from spreadsheets carry either snake_case ids or the
//! Japanese column titles teachers type. Both resolve to one canonical id.

use crate::source::Table;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static HEADER_NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\x{3000}\x{feff}]+").expect("valid header noise regex"));

/// Canonical column id plus accepted header spellings.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub id: &'static str,
    pub aliases: &'static [&'static str],
}

const SCHOOL_LEVEL: ColumnSpec = ColumnSpec {
    id: "school_level",
    aliases: &["school_level", "校種", "学校種", "学校段階"],
};
const GRADE: ColumnSpec = ColumnSpec {
    id: "grade",
    aliases: &["grade", "学年"],
};
const UNIT: ColumnSpec = ColumnSpec {
    id: "unit",
    aliases: &["unit", "単元"],
};
const SUBUNIT: ColumnSpec = ColumnSpec {
    id: "subunit",
    aliases: &["subunit", "sub_unit", "小単元"],
};
const LESSON: ColumnSpec = ColumnSpec {
    id: "lesson",
    aliases: &["lesson", "学習内容", "授業"],
};

/// Curriculum dataset columns.
pub const CURRICULUM_COLUMNS: &[ColumnSpec] = &[
    SCHOOL_LEVEL,
    GRADE,
    UNIT,
    SUBUNIT,
    LESSON,
    ColumnSpec {
        id: "objective",
        aliases: &["objective", "ねらい"],
    },
    ColumnSpec {
        id: "prerequisites",
        aliases: &["prerequisites", "既習内容"],
    },
    ColumnSpec {
        id: "knowledge_skill",
        aliases: &["knowledge_skill", "知識・技能"],
    },
    ColumnSpec {
        id: "thinking_expression",
        aliases: &["thinking_expression", "思考力・判断力・表現力"],
    },
    ColumnSpec {
        id: "attitude",
        aliases: &["attitude", "学びに向かう力", "学びに向かう力・人間性等"],
    },
    ColumnSpec {
        id: "next_lesson",
        aliases: &["next_lesson", "次回の学習内容", "次時"],
    },
];

/// Practice note dataset columns.
pub const NOTE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        id: "note_id",
        aliases: &["note_id", "id"],
    },
    SCHOOL_LEVEL,
    GRADE,
    UNIT,
    SUBUNIT,
    LESSON,
    ColumnSpec {
        id: "criteria_knowledge",
        aliases: &["criteria_knowledge", "評価規準（知識・技能）"],
    },
    ColumnSpec {
        id: "criteria_thinking",
        aliases: &["criteria_thinking", "評価規準（思考・判断・表現）"],
    },
    ColumnSpec {
        id: "criteria_attitude",
        aliases: &[
            "criteria_attitude",
            "評価規準（主体的に学習に取り組む態度）",
        ],
    },
    ColumnSpec {
        id: "difficulties",
        aliases: &["difficulties", "児童のつまずき", "つまずき"],
    },
    ColumnSpec {
        id: "techniques",
        aliases: &["techniques", "指導の工夫"],
    },
    ColumnSpec {
        id: "tools",
        aliases: &["tools", "使用した教具", "教具"],
    },
    ColumnSpec {
        id: "handoff",
        aliases: &["handoff", "引き継ぎ事項", "引き継ぎ"],
    },
    ColumnSpec {
        id: "memo",
        aliases: &["memo", "メモ"],
    },
    ColumnSpec {
        id: "created_at",
        aliases: &["created_at", "timestamp", "記録日時", "タイムスタンプ"],
    },
];

/// Normalizes one header for alias comparison.
///
/// Strips whitespace (including ideographic spaces and BOM), lowercases ASCII
/// and folds ASCII parentheses into their full-width forms.
pub fn normalize_header(value: &str) -> String {
    HEADER_NOISE_RE
        .replace_all(value, "")
        .to_ascii_lowercase()
        .replace('(', "（")
        .replace(')', "）")
}

/// Resolved column positions for one table.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    positions: HashMap<&'static str, usize>,
}

impl ColumnMap {
    /// Resolves every spec against `headers`; the first matching header wins.
    pub fn resolve(headers: &[String], specs: &[ColumnSpec]) -> Self {
        let normalized = headers
            .iter()
            .map(|header| normalize_header(header))
            .collect::<Vec<_>>();
        let mut positions = HashMap::new();
        for spec in specs {
            let aliases = spec
                .aliases
                .iter()
                .map(|alias| normalize_header(alias))
                .collect::<Vec<_>>();
            if let Some(position) = normalized
                .iter()
                .position(|header| aliases.iter().any(|alias| alias == header))
            {
                positions.insert(spec.id, position);
            }
        }
        Self { positions }
    }

    pub fn for_table(table: &Table, specs: &[ColumnSpec]) -> Self {
        Self::resolve(&table.headers, specs)
    }

    pub fn has(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Header position resolved for `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Returns the first id in `required` that did not resolve.
    pub fn first_missing(&self, required: &[&'static str]) -> Option<&'static str> {
        required.iter().copied().find(|id| !self.has(id))
    }

    /// Trimmed cell value, empty when the column is absent.
    pub fn cell<'row>(&self, row: &'row [String], id: &str) -> &'row str {
        self.positions
            .get(id)
            .and_then(|position| row.get(*position))
            .map(|value| value.trim())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_header, ColumnMap, CURRICULUM_COLUMNS, NOTE_COLUMNS};

    #[test]
    fn normalize_header_folds_spacing_case_and_parentheses() {
        assert_eq!(normalize_header(" School_Level "), "school_level");
        assert_eq!(
            normalize_header("評価規準 (知識・技能)"),
            "評価規準（知識・技能）"
        );
        assert_eq!(normalize_header("小\u{3000}単元"), "小単元");
    }

    #[test]
    fn resolve_accepts_japanese_and_english_headers() {
        let headers = ["学年", "unit", "小単元", "学習内容", "ねらい"]
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>();
        let map = ColumnMap::resolve(&headers, CURRICULUM_COLUMNS);
        assert!(map.has("grade"));
        assert!(map.has("unit"));
        assert!(map.has("objective"));
        assert!(!map.has("school_level"));
        assert_eq!(
            map.first_missing(&["grade", "school_level"]),
            Some("school_level")
        );
    }

    #[test]
    fn cell_trims_and_defaults_missing_columns_to_empty() {
        let headers = vec!["lesson".to_string(), "メモ".to_string()];
        let map = ColumnMap::resolve(&headers, NOTE_COLUMNS);
        let row = vec!["  観察  ".to_string(), "x".to_string()];
        assert_eq!(map.cell(&row, "lesson"), "観察");
        assert_eq!(map.cell(&row, "memo"), "x");
        assert_eq!(map.cell(&row, "tools"), "");
    }
}
