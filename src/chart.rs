//! Chart selection and rendering.
//!
//! Selection is a small rule table over the result's column shapes; plenty of
//! results legitimately have no chart, and that outcome is normal rather than
//! an error. Rendering writes a self-contained Plotly HTML artifact under the
//! static directory and returns its URL path.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::error::ChartError;
use crate::warehouse::{ColumnMeta, ResultSet, Scalar};

const HISTOGRAM_MIN_ROWS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
  Bar,
  Line,
  Histogram,
}

/// A chosen chart: which columns drive which axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSpec {
  pub kind: ChartKind,
  pub x: usize,
  pub y: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnRole {
  Categorical,
  Numeric,
  Temporal,
}

fn role_of(column: &ColumnMeta, values: &[&Scalar]) -> ColumnRole {
  match column.ty.to_uppercase().as_str() {
    "INTEGER" | "INT64" | "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => ColumnRole::Numeric,
    "DATE" | "DATETIME" | "TIMESTAMP" | "TIME" => ColumnRole::Temporal,
    _ => {
      // String columns still count as temporal or numeric when every
      // non-null value parses accordingly.
      let non_null: Vec<_> = values.iter().filter(|v| !v.is_null()).collect();
      if non_null.is_empty() {
        return ColumnRole::Categorical;
      }
      let temporal = non_null
        .iter()
        .all(|v| v.as_text().is_some_and(|t| NaiveDate::parse_from_str(t, "%Y-%m-%d").is_ok()));
      if temporal {
        return ColumnRole::Temporal;
      }
      let numeric = non_null
        .iter()
        .all(|v| v.as_f64().is_some() || v.as_text().is_some_and(|t| t.parse::<f64>().is_ok()));
      if numeric {
        ColumnRole::Numeric
      } else {
        ColumnRole::Categorical
      }
    }
  }
}

/// Pick a chart for the result, or `None` when no rule matches.
///
/// Rules, in order: a categorical and a numeric column make a bar chart; a
/// temporal and a numeric column make a line chart; a lone numeric column
/// with enough rows makes a histogram. Results with more than two columns or
/// with no rows never chart.
pub fn select_chart(result: &ResultSet) -> Option<ChartSpec> {
  if result.is_empty() {
    return None;
  }

  let roles: Vec<ColumnRole> = result
    .columns
    .iter()
    .enumerate()
    .map(|(i, col)| role_of(col, &result.column_values(i)))
    .collect();

  match roles.as_slice() {
    [ColumnRole::Categorical, ColumnRole::Numeric] => {
      Some(ChartSpec { kind: ChartKind::Bar, x: 0, y: Some(1) })
    }
    [ColumnRole::Numeric, ColumnRole::Categorical] => {
      Some(ChartSpec { kind: ChartKind::Bar, x: 1, y: Some(0) })
    }
    [ColumnRole::Temporal, ColumnRole::Numeric] => {
      Some(ChartSpec { kind: ChartKind::Line, x: 0, y: Some(1) })
    }
    [ColumnRole::Numeric, ColumnRole::Temporal] => {
      Some(ChartSpec { kind: ChartKind::Line, x: 1, y: Some(0) })
    }
    [ColumnRole::Numeric] if result.rows.len() >= HISTOGRAM_MIN_ROWS => {
      Some(ChartSpec { kind: ChartKind::Histogram, x: 0, y: None })
    }
    _ => None,
  }
}

pub struct ChartRenderer {
  static_dir: PathBuf,
}

impl ChartRenderer {
  pub fn new(static_dir: impl Into<PathBuf>) -> Self {
    Self { static_dir: static_dir.into() }
  }

  /// Write the chart as a standalone HTML file and return its URL path
  /// under `/static/`.
  pub async fn render(
    &self,
    spec: ChartSpec,
    result: &ResultSet,
    title: &str,
  ) -> Result<String, ChartError> {
    let html = build_html(spec, result, title)?;
    let file_name = format!("chart_{}.html", Uuid::new_v4());

    tokio::fs::create_dir_all(&self.static_dir).await?;
    tokio::fs::write(self.static_dir.join(&file_name), html).await?;

    debug!(file = %file_name, "chart artifact written");
    Ok(format!("/static/{file_name}"))
  }
}

fn axis_values(result: &ResultSet, idx: usize) -> Vec<serde_json::Value> {
  result
    .column_values(idx)
    .into_iter()
    .map(|v| match v {
      Scalar::Null => serde_json::Value::Null,
      Scalar::Bool(b) => json!(b),
      Scalar::Integer(n) => json!(n),
      Scalar::Float(f) => json!(f),
      Scalar::Text(s) => json!(s),
    })
    .collect()
}

fn build_html(spec: ChartSpec, result: &ResultSet, title: &str) -> Result<String, ChartError> {
  let x_name = result
    .columns
    .get(spec.x)
    .map(|c| c.name.clone())
    .ok_or_else(|| ChartError::Render(format!("column index {} out of range", spec.x)))?;

  let trace = match spec.kind {
    ChartKind::Bar | ChartKind::Line => {
      let y = spec
        .y
        .ok_or_else(|| ChartError::Render("two-axis chart missing y column".to_string()))?;
      json!({
        "type": if spec.kind == ChartKind::Bar { "bar" } else { "scatter" },
        "mode": if spec.kind == ChartKind::Line { "lines+markers" } else { "" },
        "x": axis_values(result, spec.x),
        "y": axis_values(result, y),
      })
    }
    ChartKind::Histogram => json!({
      "type": "histogram",
      "x": axis_values(result, spec.x),
    }),
  };

  let y_name = spec.y.and_then(|y| result.columns.get(y)).map(|c| c.name.as_str()).unwrap_or("");
  let layout = json!({
    "title": { "text": title },
    "xaxis": { "title": { "text": x_name } },
    "yaxis": { "title": { "text": y_name } },
  });

  // `</` inside a script tag would end the element early.
  let figure =
    serde_json::to_string(&json!({ "data": [trace], "layout": layout }))
      .map_err(|e| ChartError::Render(e.to_string()))?
      .replace("</", "<\\/");

  Ok(format!(
    r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <script src="https://cdn.plot.ly/plotly-2.35.2.min.js"></script>
</head>
<body>
  <div id="chart"></div>
  <script>
    const figure = {figure};
    Plotly.newPlot("chart", figure.data, figure.layout);
  </script>
</body>
</html>
"#
  ))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::warehouse::ColumnMeta;

  fn column(name: &str, ty: &str) -> ColumnMeta {
    ColumnMeta { name: name.to_string(), ty: ty.to_string() }
  }

  fn categorical_numeric() -> ResultSet {
    ResultSet {
      columns: vec![column("profession", "STRING"), column("count", "INTEGER")],
      rows: vec![
        vec![Scalar::Text("Doctor".to_string()), Scalar::Integer(42)],
        vec![Scalar::Text("Nurse".to_string()), Scalar::Integer(17)],
      ],
      truncated: false,
    }
  }

  #[test]
  fn categorical_and_numeric_selects_bar() {
    let spec = select_chart(&categorical_numeric()).unwrap();
    assert_eq!(spec.kind, ChartKind::Bar);
    assert_eq!((spec.x, spec.y), (0, Some(1)));
  }

  #[test]
  fn swapped_column_order_still_selects_bar() {
    let result = ResultSet {
      columns: vec![column("count", "INTEGER"), column("profession", "STRING")],
      rows: vec![vec![Scalar::Integer(42), Scalar::Text("Doctor".to_string())]],
      truncated: false,
    };
    let spec = select_chart(&result).unwrap();
    assert_eq!(spec.kind, ChartKind::Bar);
    assert_eq!((spec.x, spec.y), (1, Some(0)));
  }

  #[test]
  fn temporal_and_numeric_selects_line() {
    let result = ResultSet {
      columns: vec![column("day", "DATE"), column("registrations", "INT64")],
      rows: vec![vec![Scalar::Text("2024-01-01".to_string()), Scalar::Integer(3)]],
      truncated: false,
    };
    assert_eq!(select_chart(&result).unwrap().kind, ChartKind::Line);
  }

  #[test]
  fn lone_numeric_column_needs_enough_rows_for_histogram() {
    let mut result = ResultSet {
      columns: vec![column("age", "INT64")],
      rows: (0..9).map(|i| vec![Scalar::Integer(i)]).collect(),
      truncated: false,
    };
    assert!(select_chart(&result).is_none());

    result.rows.push(vec![Scalar::Integer(9)]);
    assert_eq!(select_chart(&result).unwrap().kind, ChartKind::Histogram);
  }

  #[test]
  fn no_chart_for_empty_wide_or_all_text_results() {
    let empty = ResultSet { columns: vec![column("a", "STRING")], rows: vec![], truncated: false };
    assert!(select_chart(&empty).is_none());

    let wide = ResultSet {
      columns: vec![column("a", "STRING"), column("b", "INT64"), column("c", "INT64")],
      rows: vec![vec![
        Scalar::Text("x".to_string()),
        Scalar::Integer(1),
        Scalar::Integer(2),
      ]],
      truncated: false,
    };
    assert!(select_chart(&wide).is_none());

    let text_only = ResultSet {
      columns: vec![column("a", "STRING"), column("b", "STRING")],
      rows: vec![vec![Scalar::Text("x".to_string()), Scalar::Text("y".to_string())]],
      truncated: false,
    };
    assert!(select_chart(&text_only).is_none());
  }

  #[test]
  fn string_column_of_dates_counts_as_temporal() {
    let result = ResultSet {
      columns: vec![column("day", "STRING"), column("count", "INT64")],
      rows: vec![
        vec![Scalar::Text("2024-01-01".to_string()), Scalar::Integer(3)],
        vec![Scalar::Text("2024-01-02".to_string()), Scalar::Integer(5)],
      ],
      truncated: false,
    };
    assert_eq!(select_chart(&result).unwrap().kind, ChartKind::Line);
  }

  #[test]
  fn string_column_of_numbers_counts_as_numeric() {
    let result = ResultSet {
      columns: vec![column("profession", "STRING"), column("share", "STRING")],
      rows: vec![
        vec![Scalar::Text("Doctor".to_string()), Scalar::Text("0.4".to_string())],
        vec![Scalar::Text("Nurse".to_string()), Scalar::Text("0.6".to_string())],
      ],
      truncated: false,
    };
    assert_eq!(select_chart(&result).unwrap().kind, ChartKind::Bar);
  }

  #[tokio::test]
  async fn render_writes_artifact_and_returns_static_url() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = ChartRenderer::new(dir.path());
    let result = categorical_numeric();
    let spec = select_chart(&result).unwrap();

    let url = renderer.render(spec, &result, "Attendees by profession").await.unwrap();
    assert!(url.starts_with("/static/chart_"));
    assert!(url.ends_with(".html"));

    let file_name = url.trim_start_matches("/static/");
    let html = std::fs::read_to_string(dir.path().join(file_name)).unwrap();
    assert!(html.contains("Plotly.newPlot"));
    assert!(html.contains("\"bar\""));
    assert!(html.contains("Doctor"));
  }

  #[tokio::test]
  async fn render_rejects_out_of_range_columns() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = ChartRenderer::new(dir.path());
    let result = categorical_numeric();
    let bad = ChartSpec { kind: ChartKind::Bar, x: 9, y: Some(1) };
    assert!(matches!(renderer.render(bad, &result, "t").await, Err(ChartError::Render(_))));
  }
}
