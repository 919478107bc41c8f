//! Line-driven lesson planning session.
//!
//! # Responsibility
//! - Walk the five selection stages with numbered choices.
//! - Show the official record and the teacher note of a resolved lesson.
//! - Collect the eight note fields and report the submission inline.
//!
//! # Invariants
//! - A failed submission keeps the draft so it can be sent again.
//! - Appended notes show up only after an explicit reload (`r`).

use chrono::{Local, NaiveDateTime};
use lessonplan_core::model::note::format_timestamp;
use lessonplan_core::{
    CurriculumIndex, HierarchyField, LessonKey, LessonSession, LessonView, NoteField, NoteFields,
    NoteRepository, Selection,
};
use std::io::{self, BufRead, Write};

pub const NO_NOTES_MESSAGE: &str = "まだメモはありません";

const STAGE_HELP: &str = "[番号] 選択  b) 戻る  r) 再読込  q) 終了";
const LESSON_HELP: &str = "o) 公式データ  n) 教師メモ  w) メモを記入  b) 戻る  r) 再読込  q) 終了";

/// Tab shown for a resolved lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Official,
    Notes,
}

impl Tab {
    fn title(self) -> &'static str {
        match self {
            Self::Official => "公式データ",
            Self::Notes => "教師メモ",
        }
    }
}

/// Result envelope for one note submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub ok: bool,
    pub note_id: Option<String>,
    pub message: String,
}

impl SubmitResponse {
    fn success(message: impl Into<String>, note_id: String) -> Self {
        Self {
            ok: true,
            note_id: Some(note_id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            note_id: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Choose(usize),
    Back,
    Reload,
    Quit,
    Show(Tab),
    Write,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if let Ok(number) = trimmed.parse::<usize>() {
        return Command::Choose(number);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "b" | "back" => Command::Back,
        "r" | "reload" => Command::Reload,
        "q" | "quit" | "exit" => Command::Quit,
        "o" => Command::Show(Tab::Official),
        "n" => Command::Show(Tab::Notes),
        "w" => Command::Write,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

/// Interactive session state for one teacher.
pub struct App<R: NoteRepository> {
    session: LessonSession<R>,
    selection: Selection,
    tab: Tab,
    draft: NoteFields,
    draft_key: Option<LessonKey>,
    clock: fn() -> NaiveDateTime,
}

impl<R: NoteRepository> App<R> {
    pub fn new(session: LessonSession<R>) -> Self {
        Self {
            session,
            selection: Selection::new(),
            tab: Tab::Official,
            draft: NoteFields::default(),
            draft_key: None,
            clock: || Local::now().naive_local(),
        }
    }

    /// Replaces the submission clock.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn draft(&self) -> &NoteFields {
        &self.draft
    }

    /// Runs until `q` or end of input.
    pub fn run<I: BufRead, O: Write>(&mut self, input: &mut I, out: &mut O) -> io::Result<()> {
        loop {
            self.render(out)?;
            let Some(line) = read_line(input)? else {
                return Ok(());
            };
            match parse_command(&line) {
                Command::Quit => return Ok(()),
                Command::Back => self.back(),
                Command::Reload => self.reload(out)?,
                Command::Choose(number) => self.choose(number, out)?,
                Command::Show(tab) => {
                    if self.selection.is_complete() {
                        self.tab = tab;
                    } else {
                        writeln!(out, "先に授業を選択してください")?;
                    }
                }
                Command::Write => match self.selection.lesson_key() {
                    Some(key) => self.fill_form(&key, input, out)?,
                    None => writeln!(out, "先に授業を選択してください")?,
                },
                Command::Unknown(text) if text.is_empty() => {}
                Command::Unknown(text) => writeln!(out, "不明な入力です: {text}")?,
            }
        }
    }

    /// Submits the current draft for `key`.
    pub fn submit(&mut self, key: &LessonKey) -> SubmitResponse {
        match self
            .session
            .submit_note(key, &self.draft, (self.clock)())
        {
            Ok(note) => {
                self.draft = NoteFields::default();
                SubmitResponse::success(
                    "保存しました。再読込 (r) すると教師メモに表示されます",
                    note.note_id.to_string(),
                )
            }
            Err(err) => SubmitResponse::failure(format!(
                "保存に失敗しました: {err}（入力内容は保持されています）"
            )),
        }
    }

    fn render<O: Write>(&self, out: &mut O) -> io::Result<()> {
        writeln!(out)?;
        if !self.selection.is_empty() {
            let path = self
                .selection
                .pairs()
                .map(|(field, value)| format!("{}: {}", field.label(), value))
                .collect::<Vec<_>>()
                .join(" > ");
            writeln!(out, "{path}")?;
        }

        match self.selection.next_field() {
            Some(field) => {
                let options = self.session.index().candidates(field, &self.selection);
                if options.is_empty() {
                    writeln!(out, "{}の候補がありません", field.label())?;
                } else {
                    writeln!(out, "{}を選択してください", field.label())?;
                    for (number, option) in options.iter().enumerate() {
                        writeln!(out, "  {}) {}", number + 1, option)?;
                    }
                }
                writeln!(out, "{STAGE_HELP}")?;
            }
            None => {
                match self.session.view(&self.selection) {
                    Ok(view) => self.render_lesson(&view, out)?,
                    Err(err) => writeln!(out, "授業を表示できません: {err}")?,
                }
                writeln!(out, "{LESSON_HELP}")?;
            }
        }
        write!(out, "> ")?;
        out.flush()
    }

    fn render_lesson<O: Write>(&self, view: &LessonView<'_>, out: &mut O) -> io::Result<()> {
        writeln!(out, "== {} ==", self.tab.title())?;
        match self.tab {
            Tab::Official => {
                for (label, value) in view.record.details() {
                    writeln!(out, "{label}: {}", or_dash(value))?;
                }
            }
            Tab::Notes => match view.note {
                None => writeln!(out, "{NO_NOTES_MESSAGE}")?,
                Some(note) => {
                    writeln!(out, "記録日時: {}", format_timestamp(&note.created_at))?;
                    for field in NoteField::ALL {
                        writeln!(out, "{}: {}", field.label(), or_dash(note.fields.get(field)))?;
                    }
                    if view.shadowed_notes > 0 {
                        writeln!(out, "（ほかに {} 件の記録があります）", view.shadowed_notes)?;
                    }
                }
            },
        }
        Ok(())
    }

    fn choose<O: Write>(&mut self, number: usize, out: &mut O) -> io::Result<()> {
        let Some(field) = self.selection.next_field() else {
            return writeln!(out, "授業は選択済みです。b で戻れます");
        };
        let options = self.session.index().candidates(field, &self.selection);
        let Some(value) = number.checked_sub(1).and_then(|index| options.get(index)) else {
            return writeln!(out, "番号が範囲外です: {number}");
        };
        match self.session.index().select(&self.selection, field, value) {
            Ok(next) => {
                self.selection = next;
                self.tab = Tab::Official;
                Ok(())
            }
            Err(err) => writeln!(out, "{err}"),
        }
    }

    fn back(&mut self) {
        if let Some(last) = self
            .selection
            .depth()
            .checked_sub(1)
            .and_then(|position| HierarchyField::ALL.get(position).copied())
        {
            self.selection = self.selection.prefix_before(last);
        }
    }

    fn reload<O: Write>(&mut self, out: &mut O) -> io::Result<()> {
        match self.session.reload_curriculum() {
            Ok(count) => writeln!(out, "公式データを再読込しました（{count} 件）")?,
            Err(err) => writeln!(out, "公式データの再読込に失敗しました: {err}")?,
        }
        match self.session.reload_notes() {
            Ok(count) => writeln!(out, "教師メモを再読込しました（{count} 件）")?,
            Err(err) => writeln!(out, "教師メモの再読込に失敗しました: {err}")?,
        }
        self.selection = retain_valid_prefix(self.session.index(), &self.selection);
        Ok(())
    }

    fn fill_form<I: BufRead, O: Write>(
        &mut self,
        key: &LessonKey,
        input: &mut I,
        out: &mut O,
    ) -> io::Result<()> {
        if self.draft_key.as_ref() != Some(key) {
            self.draft = NoteFields::default();
            self.draft_key = Some(key.clone());
        }

        writeln!(out, "メモを記入: {key}")?;
        writeln!(out, "Enter で現在の値を保持、- で空欄にします")?;
        for field in NoteField::ALL {
            let current = self.draft.get(field);
            if current.is_empty() {
                write!(out, "{}: ", field.label())?;
            } else {
                write!(out, "{} [{}]: ", field.label(), current)?;
            }
            out.flush()?;

            let Some(line) = read_line(input)? else {
                return writeln!(out, "\n入力を中断しました（入力内容は保持されています）");
            };
            match line.trim() {
                "" => {}
                "-" => self.draft.set(field, ""),
                value => self.draft.set(field, value),
            }
        }

        let response = self.submit(key);
        writeln!(out, "{}", response.message)
    }
}

/// Keeps the longest prefix of `selection` still offered by `index`.
fn retain_valid_prefix(index: &CurriculumIndex, selection: &Selection) -> Selection {
    let mut kept = Selection::new();
    for (field, value) in selection.pairs() {
        match index.select(&kept, field, value) {
            Ok(next) => kept = next,
            Err(_) => break,
        }
    }
    kept
}

fn read_line<I: BufRead>(input: &mut I) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_command, App, Command, Tab, NO_NOTES_MESSAGE};
    use chrono::NaiveDateTime;
    use lessonplan_core::model::note::parse_timestamp;
    use lessonplan_core::{
        HierarchyField, LessonSession, NoteRecord, NoteRepository, NoteSink, RepoResult,
        SqliteNoteRepository, StaticTableSource, Table, WriteError,
    };
    use std::io::Cursor;

    const WALK_TO_MOON: &str = "1\n1\n1\n1\n1\n";
    const FORM_LINES: &str = "規則性\n説明\n態度\n半月\nモデル実験\nボール\n次回へ\n雲が多い\n";

    fn curriculum() -> Box<StaticTableSource> {
        let headers = [
            "school_level",
            "grade",
            "unit",
            "subunit",
            "lesson",
            "objective",
            "prerequisites",
        ]
        .iter()
        .map(|value| value.to_string())
        .collect();
        let row = [
            "小学校",
            "5",
            "月と星",
            "月の満ち欠け",
            "月の形の変化を観察する",
            "月の見え方の変化を時間的変化として捉える",
            "太陽の動き、方位の理解",
        ]
        .iter()
        .map(|value| value.to_string())
        .collect();
        Box::new(StaticTableSource::new(Table::new(headers, vec![row])))
    }

    fn fixed_clock() -> NaiveDateTime {
        parse_timestamp("2026-06-01 13:45:00").unwrap()
    }

    fn run<R: NoteRepository>(app: &mut App<R>, script: &str) -> String {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        app.run(&mut input, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    struct OfflineRepo;

    impl NoteSink for OfflineRepo {
        fn describe(&self) -> String {
            "offline".to_string()
        }

        fn append(&self, _note: &NoteRecord) -> Result<(), WriteError> {
            Err(WriteError::Transport("connection refused".to_string()))
        }
    }

    impl NoteRepository for OfflineRepo {
        fn load_notes(&self) -> RepoResult<Vec<NoteRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn parse_command_recognizes_numbers_and_letters() {
        assert_eq!(parse_command(" 3 "), Command::Choose(3));
        assert_eq!(parse_command("Q"), Command::Quit);
        assert_eq!(parse_command("n"), Command::Show(Tab::Notes));
        assert_eq!(parse_command("zz"), Command::Unknown("zz".to_string()));
    }

    #[test]
    fn walking_all_stages_shows_official_data_and_empty_notes() {
        let session =
            LessonSession::open(curriculum(), SqliteNoteRepository::in_memory().unwrap()).unwrap();
        let mut app = App::new(session);
        let output = run(&mut app, &format!("{WALK_TO_MOON}n\nq\n"));

        assert!(app.selection().is_complete());
        assert!(output.contains("校種を選択してください"));
        assert!(output.contains("== 公式データ =="));
        assert!(output.contains("既習内容: 太陽の動き、方位の理解"));
        assert!(output.contains(NO_NOTES_MESSAGE));
    }

    #[test]
    fn submitted_note_appears_after_reload() {
        let session =
            LessonSession::open(curriculum(), SqliteNoteRepository::in_memory().unwrap()).unwrap();
        let mut app = App::new(session).with_clock(fixed_clock);
        let output = run(
            &mut app,
            &format!("{WALK_TO_MOON}w\n{FORM_LINES}n\nr\nn\nq\n"),
        );

        assert!(output.contains("保存しました"));
        assert!(output.contains("教師メモを再読込しました（1 件）"));
        assert!(output.contains("メモ: 雲が多い"));
        assert!(output.contains("記録日時: 2026-06-01 13:45:00"));
        assert!(app.draft().is_blank());
    }

    #[test]
    fn failed_submission_reports_inline_and_keeps_draft() {
        let session = LessonSession::open(curriculum(), OfflineRepo).unwrap();
        let mut app = App::new(session).with_clock(fixed_clock);
        let output = run(&mut app, &format!("{WALK_TO_MOON}w\n{FORM_LINES}q\n"));

        assert!(output.contains("保存に失敗しました"));
        assert!(output.contains("入力内容は保持されています"));
        assert_eq!(app.draft().memo, "雲が多い");
        assert!(app.selection().is_complete());
    }

    #[test]
    fn resubmitting_keeps_unchanged_fields_from_draft() {
        let session = LessonSession::open(curriculum(), OfflineRepo).unwrap();
        let mut app = App::new(session).with_clock(fixed_clock);
        run(
            &mut app,
            &format!("{WALK_TO_MOON}w\n{FORM_LINES}w\n\n\n\n\n\n\n-\n\nq\n"),
        );

        assert_eq!(app.draft().criteria_knowledge, "規則性");
        assert_eq!(app.draft().handoff, "");
        assert_eq!(app.draft().memo, "雲が多い");
    }

    #[test]
    fn back_drops_the_last_choice_and_out_of_range_is_reported() {
        let session =
            LessonSession::open(curriculum(), SqliteNoteRepository::in_memory().unwrap()).unwrap();
        let mut app = App::new(session);
        let output = run(&mut app, "1\n1\nb\n7\n");

        assert_eq!(app.selection().depth(), 1);
        assert_eq!(app.selection().next_field(), Some(HierarchyField::Grade));
        assert!(output.contains("番号が範囲外です: 7"));
    }
}
