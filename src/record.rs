use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One event of a `go test -json` stream. A non-string `Output` makes the line
/// unusable; the attribution fields drop to `None` on any other type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    #[serde(
        rename = "Time",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<String>,
    #[serde(
        rename = "Action",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub action: Option<String>,
    #[serde(
        rename = "Package",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub package: Option<String>,
    #[serde(
        rename = "Test",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub test: Option<String>,
    #[serde(
        rename = "Elapsed",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub elapsed: Option<f64>,
    #[serde(rename = "Output", default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl TestRecord {
    pub fn non_empty_output(&self) -> Option<&str> {
        self.output.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_failure(&self) -> bool {
        self.action.as_deref() == Some("fail")
    }

    pub fn test_key(&self) -> Option<(&str, &str)> {
        match (self.package.as_deref(), self.test.as_deref()) {
            (Some(package), Some(test)) => Some((package, test)),
            _ => None,
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

#[derive(Debug)]
pub enum ParsedLine {
    Record(TestRecord),
    Unparseable(serde_json::Error),
}

#[derive(Debug)]
pub struct NumberedLine {
    // 1-based
    pub line_number: usize,
    pub parsed: ParsedLine,
}

// Interior blank lines are kept and surface as parse errors.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines
}

pub fn parse_line(line: &str) -> ParsedLine {
    match serde_json::from_str::<TestRecord>(line) {
        Ok(record) => ParsedLine::Record(record),
        Err(err) => ParsedLine::Unparseable(err),
    }
}

pub fn parse_artifact(text: &str) -> Vec<NumberedLine> {
    split_lines(text)
        .into_iter()
        .enumerate()
        .map(|(idx, line)| NumberedLine {
            line_number: idx + 1,
            parsed: parse_line(line),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_artifact, parse_line, split_lines, ParsedLine};

    #[test]
    fn drops_only_the_trailing_empty_segment() {
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert_eq!(split_lines("a\n\n"), vec!["a", ""]);
    }

    #[test]
    fn parses_test2json_event() {
        let line = r#"{"Time":"2024-03-01T10:00:00Z","Action":"output","Package":"github.com/acme/provider/newrelic","Test":"TestAccWidget_basic","Output":"=== RUN   TestAccWidget_basic\n"}"#;
        let ParsedLine::Record(record) = parse_line(line) else {
            panic!("expected a record");
        };
        assert_eq!(record.action.as_deref(), Some("output"));
        assert_eq!(
            record.test_key(),
            Some(("github.com/acme/provider/newrelic", "TestAccWidget_basic"))
        );
        assert!(record.non_empty_output().is_some());
    }

    #[test]
    fn missing_and_empty_output_are_not_usable() {
        let ParsedLine::Record(no_output) = parse_line(r#"{"Action":"pass"}"#) else {
            panic!("expected a record");
        };
        assert!(no_output.non_empty_output().is_none());
        let ParsedLine::Record(empty) = parse_line(r#"{"Output":""}"#) else {
            panic!("expected a record");
        };
        assert!(empty.non_empty_output().is_none());
    }

    #[test]
    fn mistyped_attribution_fields_do_not_reject_the_line() {
        let ParsedLine::Record(record) = parse_line(
            r#"{"Output":"expected an error but got none","Elapsed":"1.2s","Test":7,"Package":null}"#,
        ) else {
            panic!("expected a record");
        };
        assert_eq!(record.elapsed, None);
        assert_eq!(record.test, None);
        assert_eq!(record.package, None);
        assert_eq!(
            record.non_empty_output(),
            Some("expected an error but got none")
        );
    }

    #[test]
    fn non_string_output_rejects_the_line() {
        assert!(matches!(
            parse_line(r#"{"Output":5}"#),
            ParsedLine::Unparseable(_)
        ));
    }

    #[test]
    fn numbers_lines_and_flags_bad_json() {
        let parsed = parse_artifact("{bad json\n{\"Output\":\"ok\"}\n");
        assert_eq!(parsed.len(), 2);
        assert!(matches!(parsed[0].parsed, ParsedLine::Unparseable(_)));
        assert_eq!(parsed[1].line_number, 2);
        assert!(matches!(parsed[1].parsed, ParsedLine::Record(_)));
    }
}
