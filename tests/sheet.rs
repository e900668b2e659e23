use docmerge::{self as dm, Context, Evaluator, Models, Registry, Sheet, SheetCell};
use pretty_assertions::assert_eq;
use serde_json::json;

fn sheet_of(rows: Vec<Vec<SheetCell>>) -> Sheet {
    Sheet { name: "report".into(), rows }
}

#[test]
fn test_noted_cells_are_filled() {
    let mut sheet = sheet_of(vec![
        vec![SheetCell::new("Name"), SheetCell::noted("{name}")],
        vec![SheetCell::new("Items"), SheetCell::noted("{items.size} of {items.1}")],
        vec![SheetCell::new("{untouched}")],
    ]);
    let models = Models::single(json!({ "name": "one", "items": ["pen", "ink"] }));
    dm::calculate(&mut sheet, &models).unwrap();

    assert_eq!(
        sheet.rows,
        vec![
            vec![SheetCell::new("Name"), SheetCell::new("one")],
            vec![SheetCell::new("Items"), SheetCell::new("2 of pen")],
            vec![SheetCell::new("{untouched}")],
        ]
    );
}

#[test]
fn test_notes_are_consumed() {
    let mut sheet = sheet_of(vec![vec![SheetCell::noted("{name}")]]);
    dm::calculate(&mut sheet, &Models::single(json!({ "name": "one" }))).unwrap();
    assert!(sheet.rows.iter().flatten().all(|cell| cell.note.is_none()));

    let before = sheet.clone();
    dm::calculate(&mut sheet, &Models::single(json!({ "name": "two" }))).unwrap();
    assert_eq!(sheet, before);
}

#[test]
fn test_digits_stay_horizontal() {
    let mut sheet = sheet_of(vec![vec![SheetCell::noted("{no}")]]);
    let evaluator = Evaluator::new(Registry::with_builtins()).with_context(Context::default().vertical(true));
    evaluator.calculate(&mut sheet, &Models::single(json!({ "no": 105 }))).unwrap();
    assert_eq!(sheet.rows[0][0].value, "105");
}

#[test]
fn test_unresolved_note_names_the_sheet_file() {
    let mut sheet = sheet_of(vec![vec![SheetCell::noted("{missing}")]]);
    let evaluator = Evaluator::new(Registry::with_builtins())
        .with_context(Context::default().with_file_name("report.xlsx"));
    let err = evaluator.calculate(&mut sheet, &Models::single(json!({}))).unwrap_err();
    assert!(err.is_unresolved(), "got: {err}");
    assert!(err.to_string().contains("report.xlsx"));
}
