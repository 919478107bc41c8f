use lessonplan_core::source::parse_csv;
use lessonplan_core::{
    CurriculumIndex, HierarchyField, IndexError, LessonKey, Selection, StaticTableSource, Table,
};

const CURRICULUM_CSV: &str = "\
school_level,grade,unit,subunit,lesson,objective,prerequisites,knowledge_skill,thinking_expression,attitude,next_lesson
小学校,5,月と星,月の満ち欠け,月の形の変化を観察する,月の見え方の変化を時間的変化として捉える,太陽の動き、方位の理解,月の満ち欠けの規則性を説明できる,観察結果から規則性を見いだし説明する,主体的に観察し、疑問を持って調べようとする態度,地球の自転と日周運動
小学校,5,月と星,月の満ち欠け,月の位置と太陽の関係,,,,,,
小学校,5,流れる水,川の上流と下流,石の形を比べる,,,,,,
小学校,6,月と太陽,月の形,月の形の見え方,,,,,,
小学校,10,補充,補充,補充学習,,,,,,
中学校,2,天気の変化,前線,前線の通過と天気,,,,,,
";

fn index() -> CurriculumIndex {
    CurriculumIndex::from_table(&parse_csv(CURRICULUM_CSV.as_bytes()).unwrap()).unwrap()
}

fn moon_key() -> LessonKey {
    LessonKey::new("小学校", "5", "月と星", "月の満ち欠け", "月の形の変化を観察する")
}

fn choose(index: &CurriculumIndex, values: &[&str]) -> Selection {
    let mut selection = Selection::new();
    for (field, value) in HierarchyField::ALL.iter().zip(values) {
        selection = index.select(&selection, *field, value).unwrap();
    }
    selection
}

#[test]
fn candidates_are_sorted_distinct_and_each_extends_the_prefix() {
    let index = index();
    let mut prefixes = vec![Selection::new()];
    while let Some(prefix) = prefixes.pop() {
        let Some(field) = prefix.next_field() else {
            continue;
        };
        let options = index.candidates(field, &prefix);
        assert!(!options.is_empty(), "stage {field} had no options");

        let mut deduped = options.clone();
        deduped.dedup();
        assert_eq!(deduped, options, "duplicates at stage {field}");

        for option in &options {
            let extended = index.select(&prefix, field, option).unwrap();
            assert!(
                index.records().iter().any(|record| extended.matches(record)),
                "option {option} at {field} matched nothing"
            );
            prefixes.push(extended);
        }
    }
}

#[test]
fn grade_candidates_use_numeric_order() {
    let index = index();
    let prefix = choose(&index, &["小学校"]);
    assert_eq!(
        index.candidates(HierarchyField::Grade, &prefix),
        vec!["5".to_string(), "6".to_string(), "10".to_string()]
    );
}

#[test]
fn candidates_are_restricted_by_every_prior_choice() {
    let index = index();
    let prefix = choose(&index, &["小学校", "5"]);
    assert_eq!(
        index.candidates(HierarchyField::Unit, &prefix),
        vec!["月と星".to_string(), "流れる水".to_string()]
    );
    let prefix = choose(&index, &["中学校"]);
    assert_eq!(
        index.candidates(HierarchyField::Grade, &prefix),
        vec!["2".to_string()]
    );
}

#[test]
fn moon_chain_resolves_to_exactly_that_record() {
    let index = index();
    let selection = choose(
        &index,
        &["小学校", "5", "月と星", "月の満ち欠け", "月の形の変化を観察する"],
    );
    assert_eq!(selection.lesson_key(), Some(moon_key()));

    let record = index.resolve_selection(&selection).unwrap();
    assert_eq!(record.key, moon_key());
    assert_eq!(record.objective, "月の見え方の変化を時間的変化として捉える");
    assert_eq!(record.next_lesson, "地球の自転と日周運動");
    let matching = index
        .records()
        .iter()
        .filter(|candidate| candidate.key == moon_key())
        .count();
    assert_eq!(matching, 1);
}

#[test]
fn resolve_is_idempotent() {
    let index = index();
    let first = index.resolve(&moon_key()).unwrap().clone();
    let second = index.resolve(&moon_key()).unwrap().clone();
    assert_eq!(first, second);
}

#[test]
fn duplicate_keys_resolve_to_first_row_in_source_order() {
    let csv = "\
school_level,grade,unit,subunit,lesson,objective
小学校,5,月と星,月の満ち欠け,月の形の変化を観察する,first
小学校,5,月と星,月の満ち欠け,月の形の変化を観察する,second
";
    let index = CurriculumIndex::from_table(&parse_csv(csv.as_bytes()).unwrap()).unwrap();
    assert_eq!(index.resolve(&moon_key()).unwrap().objective, "first");
    let prefix = Selection::from_key(&moon_key()).prefix_before(HierarchyField::Lesson);
    assert_eq!(
        index.candidates(HierarchyField::Lesson, &prefix),
        vec!["月の形の変化を観察する".to_string()]
    );
}

#[test]
fn choosing_an_earlier_stage_drops_later_choices() {
    let index = index();
    let deep = choose(&index, &["小学校", "5", "月と星", "月の満ち欠け"]);
    let regraded = index.select(&deep, HierarchyField::Grade, "6").unwrap();
    assert_eq!(regraded.depth(), 2);
    assert_eq!(regraded.next_field(), Some(HierarchyField::Unit));
    assert_eq!(
        index.candidates(HierarchyField::Unit, &regraded),
        vec!["月と太陽".to_string()]
    );
}

#[test]
fn select_rejects_values_outside_candidates_and_skipped_stages() {
    let index = index();
    let prefix = choose(&index, &["小学校"]);
    let err = index
        .select(&prefix, HierarchyField::Grade, "2")
        .unwrap_err();
    assert!(matches!(
        err,
        IndexError::UnknownCandidate {
            field: HierarchyField::Grade,
            ..
        }
    ));

    let err = index
        .select(&prefix, HierarchyField::Unit, "月と星")
        .unwrap_err();
    assert!(matches!(
        err,
        IndexError::StageNotReady {
            field: HierarchyField::Unit,
            expected: HierarchyField::Grade
        }
    ));
}

#[test]
fn cascade_stops_at_first_open_stage() {
    let index = index();
    let selection = choose(&index, &["小学校", "5"]);
    let stages = index.cascade(&selection).unwrap();
    assert_eq!(stages.len(), 3);
    assert_eq!(stages[0].chosen.as_deref(), Some("小学校"));
    assert_eq!(stages[2].field, HierarchyField::Unit);
    assert_eq!(stages[2].chosen, None);

    let complete = Selection::from_key(&moon_key());
    assert_eq!(index.cascade(&complete).unwrap().len(), 5);
}

#[test]
fn empty_dataset_reports_empty_selection() {
    let table = parse_csv(b"school_level,grade,unit,subunit,lesson\n").unwrap();
    let index = CurriculumIndex::from_table(&table).unwrap();
    assert!(index.is_empty());
    assert!(index
        .candidates(HierarchyField::SchoolLevel, &Selection::new())
        .is_empty());
    let err = index.cascade(&Selection::new()).unwrap_err();
    assert!(matches!(
        err,
        IndexError::EmptySelection {
            field: HierarchyField::SchoolLevel
        }
    ));
}

#[test]
fn incomplete_selection_cannot_be_resolved() {
    let index = index();
    let selection = choose(&index, &["小学校", "5", "月と星"]);
    let err = index.resolve_selection(&selection).unwrap_err();
    assert!(matches!(
        err,
        IndexError::IncompleteSelection {
            next: HierarchyField::Subunit
        }
    ));
}

#[test]
fn japanese_headers_with_combined_grade_labels_are_split() {
    let csv = "\
学年,単元,小単元,学習内容,ねらい,知識・技能,思考力・判断力・表現力,学びに向かう力,既習内容,次回の学習内容
小5,月と星,月の満ち欠け,月の形の変化を観察する,月の見え方の変化を時間的変化として捉える,月の満ち欠けの規則性を説明できる,観察結果から規則性を見いだし説明する,主体的に観察し、疑問を持って調べようとする態度,太陽の動き、方位の理解,地球の自転と日周運動
";
    let index = CurriculumIndex::from_table(&parse_csv(csv.as_bytes()).unwrap()).unwrap();
    assert_eq!(
        index.candidates(HierarchyField::SchoolLevel, &Selection::new()),
        vec!["小学校".to_string()]
    );
    let record = index.resolve(&moon_key()).unwrap();
    assert_eq!(record.prerequisites, "太陽の動き、方位の理解");
    assert_eq!(record.knowledge_skill, "月の満ち欠けの規則性を説明できる");
}

#[test]
fn missing_key_column_is_reported() {
    let table = parse_csv("school_level,grade,unit,lesson\n小学校,5,月と星,観察\n".as_bytes())
        .unwrap();
    let err = CurriculumIndex::from_table(&table).unwrap_err();
    assert!(matches!(err, IndexError::MissingColumn("subunit")));
}

#[test]
fn blank_key_rows_are_skipped_and_cells_trimmed() {
    let table = Table::new(
        ["school_level", "grade", "unit", "subunit", "lesson"]
            .iter()
            .map(|value| value.to_string())
            .collect(),
        vec![
            vec![String::new(); 5],
            ["小学校 ", " 5", "月と星", "月の満ち欠け", "月の形の変化を観察する"]
                .iter()
                .map(|value| value.to_string())
                .collect(),
        ],
    );
    let index = CurriculumIndex::load(&StaticTableSource::new(table)).unwrap();
    assert_eq!(index.len(), 1);
    assert!(index.resolve(&moon_key()).is_ok());
}
