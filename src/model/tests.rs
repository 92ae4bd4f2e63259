use super::*;
use serde_json::json;

fn sample() -> Dataset {
    let mut features = Features::new();
    features.insert("field1", "float feature");
    features.insert("field2", "boolean feature");
    let metadata = json!({"number": 2}).as_object().cloned().unwrap_or_default();
    Dataset::new(
        vec![
            row(["hash", "field1", "field2", "label"]),
            row(["abc", "0.5", "True", "1"]),
            row(["def", "0.25", "False", "?"]),
        ],
        features,
        metadata,
    )
}

#[test]
fn test_headers_and_counts() {
    let ds = sample();
    assert_eq!(ds.headers(), vec!["hash", "field1", "field2", "label"]);
    assert_eq!(ds.row_count(), 3);
    assert_eq!(ds.rows().len(), 2);
    assert!(!ds.is_empty());
    assert_eq!(ds.column_index("label"), Some(3));
    assert_eq!(ds.name(), "undefined");
    assert_eq!(ds.clone().with_title("x").name(), "x");
}

#[test]
fn test_header_only_is_empty() {
    let ds = Dataset::new(vec![row(["a", "b"])], Features::new(), Metadata::new());
    assert!(ds.is_empty());
    assert_eq!(ds.row_count(), 1);
    assert!(Dataset::default().is_empty());
}

#[test]
fn test_evaluated_data() {
    let data = sample().evaluated_data();
    assert_eq!(data[1], vec![Cell::text("abc"), Cell::Float(0.5), Cell::Bool(true), Cell::Int(1)]);
    assert_eq!(data[2][3], Cell::text("?"));
}

#[test]
fn test_validate() {
    assert!(sample().validate().is_ok());

    let ragged = Dataset::new(vec![row(["a", "b"]), row(["1"])], Features::new(), Metadata::new());
    assert!(ragged.validate().unwrap_err().is_bad_input());

    let duplicated = Dataset::new(vec![row(["a", "a"])], Features::new(), Metadata::new());
    assert!(duplicated.validate().is_err());

    let unnamed = Dataset::new(vec![vec![Cell::text("a"), Cell::Empty]], Features::new(), Metadata::new());
    assert!(unnamed.validate().is_err());
}

#[test]
fn test_cell_display() {
    assert_eq!(Cell::Empty.to_string(), "");
    assert_eq!(Cell::Bool(true).to_string(), "True");
    assert_eq!(Cell::Int(-4).to_string(), "-4");
    assert_eq!(Cell::Float(1.0).to_string(), "1.0");
    assert_eq!(Cell::Float(0.125).to_string(), "0.125");
    assert_eq!(Cell::text("x").to_string(), "x");
    // the rendering of every scalar reads back identically
    for cell in [Cell::Bool(false), Cell::Int(42), Cell::Float(2.0), Cell::Float(-0.5)] {
        assert_eq!(eval_cell(&cell.to_string()), cell);
    }
}

#[test]
fn test_cell_json() {
    assert_eq!(Cell::from_json(&json!(3)), Some(Cell::Int(3)));
    assert_eq!(Cell::from_json(&json!(null)), Some(Cell::Empty));
    assert_eq!(Cell::from_json(&json!([1])), None);
    assert_eq!(Cell::Float(1.5).to_json(), json!(1.5));
    assert_eq!(serde_json::to_string(&row([Some(1), None])).unwrap(), "[1,null]");
}

#[test]
fn test_features_order_and_replace() {
    let mut features = Features::new();
    features.insert("b", "second");
    features.insert("a", "first");
    assert_eq!(features.insert("b", "replaced"), Some("second".to_string()));
    let names: Vec<_> = features.iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["b", "a"]);
    assert_eq!(features.get("b"), Some("replaced"));
    assert_eq!(
        serde_json::to_string(&features).unwrap(),
        r#"{"b":"replaced","a":"first"}"#
    );
}

#[test]
fn test_features_from_json() {
    let features = Features::from_json(&json!({"x": "desc"})).unwrap();
    assert_eq!(features.get("x"), Some("desc"));
    assert!(Features::from_json(&json!({"x": 1})).unwrap_err().is_bad_input());
    assert!(Features::from_json(&json!(["x"])).is_err());
    let parsed: Features = serde_json::from_str(r#"{"z": "", "y": "why"}"#).unwrap();
    assert_eq!(parsed.iter().next(), Some(("z", "")));
}

#[test]
fn test_float_rendering_reads_back() {
    for x in [1.0, -0.25, 1e20, 3.5e-7] {
        assert_eq!(eval_cell(&format_float(x)), Cell::Float(x));
    }
    // non-finite floats have no literal form
    assert_eq!(format_float(f64::NAN), "nan");
    assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    assert_eq!(eval_cell(&format_float(f64::INFINITY)), Cell::text("inf"));
}
