//! End-to-end pipeline scenarios with scripted model and warehouse doubles.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tabletalk::chart::ChartRenderer;
use tabletalk::embeddings::LexicalEmbedder;
use tabletalk::error::{ErrorCategory, ExecutionError, LlmError};
use tabletalk::explain::Explainer;
use tabletalk::index::{SchemaIndex, SharedSchemaIndex};
use tabletalk::llm::LanguageModel;
use tabletalk::pipeline::Orchestrator;
use tabletalk::retriever::SchemaRetriever;
use tabletalk::schema::SchemaCatalog;
use tabletalk::synthesis::SqlSynthesizer;
use tabletalk::warehouse::{ColumnMeta, ResultSet, Scalar, Warehouse};

const ORG: &str = "org_alpha";

/// Answers synthesis prompts with a fixed query and explanation prompts with
/// fixed prose. The two prompt shapes are distinguishable by their trailing
/// instructions.
struct ScriptedModel {
  sql: Result<String, String>,
  prose: Result<String, String>,
}

impl ScriptedModel {
  fn new(sql: &str, prose: &str) -> Self {
    Self { sql: Ok(sql.to_string()), prose: Ok(prose.to_string()) }
  }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
  async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String, LlmError> {
    let slot = if prompt.contains("generates SQL queries") { &self.sql } else { &self.prose };
    match slot {
      Ok(text) => Ok(text.clone()),
      Err(msg) => Err(LlmError::Unavailable(msg.clone())),
    }
  }
}

struct StubWarehouse {
  outcome: Result<ResultSet, (ErrorCategory, String)>,
  received: Mutex<Vec<String>>,
}

impl StubWarehouse {
  fn ok(result: ResultSet) -> Self {
    Self { outcome: Ok(result), received: Mutex::new(Vec::new()) }
  }

  fn failing(category: ErrorCategory, message: &str) -> Self {
    Self { outcome: Err((category, message.to_string())), received: Mutex::new(Vec::new()) }
  }
}

#[async_trait]
impl Warehouse for StubWarehouse {
  async fn execute(&self, sql: &str) -> Result<ResultSet, ExecutionError> {
    self.received.lock().unwrap().push(sql.to_string());
    match &self.outcome {
      Ok(result) => Ok(result.clone()),
      Err((category, message)) => Err(ExecutionError::new(*category, message.clone())),
    }
  }
}

fn profession_counts() -> ResultSet {
  ResultSet {
    columns: vec![
      ColumnMeta { name: "profession".to_string(), ty: "STRING".to_string() },
      ColumnMeta { name: "count".to_string(), ty: "INTEGER".to_string() },
    ],
    rows: vec![
      vec![Scalar::Text("Doctor".to_string()), Scalar::Integer(42)],
      vec![Scalar::Text("Nurse".to_string()), Scalar::Integer(17)],
    ],
    truncated: false,
  }
}

async fn orchestrator(
  model: Arc<dyn LanguageModel>,
  warehouse: Arc<StubWarehouse>,
  static_dir: &std::path::Path,
) -> Orchestrator {
  let catalog = SchemaCatalog::load(None).unwrap();
  let embedder = LexicalEmbedder::new();
  let index = SharedSchemaIndex::new();
  index.publish(SchemaIndex::build(&catalog, &embedder, &embedder).await).await;

  let retriever = SchemaRetriever::new(
    index,
    Arc::new(LexicalEmbedder::new()),
    Arc::new(LexicalEmbedder::new()),
    7,
    2000,
  );

  Orchestrator::new(
    retriever,
    SqlSynthesizer::new(model.clone()),
    warehouse,
    Explainer::new(model),
    ChartRenderer::new(static_dir),
    ORG.to_string(),
  )
}

#[tokio::test]
async fn distribution_question_yields_sql_data_chart_and_prose() {
  let dir = tempfile::tempdir().unwrap();
  let model = Arc::new(ScriptedModel::new(
    "SELECT profession, COUNT(*) as count FROM `p.d.mrt_events` WHERE organization_id = 'org_alpha' GROUP BY profession",
    "Doctors are the largest group with 42 attendees, followed by 17 nurses.",
  ));
  let warehouse = Arc::new(StubWarehouse::ok(profession_counts()));
  let orchestrator = orchestrator(model, warehouse.clone(), dir.path()).await;

  let answer = orchestrator.answer("What is the distribution of attendees by profession?").await;

  let sql = answer.sql.expect("query should be present");
  assert!(sql.contains("GROUP BY profession"));

  let data = answer.data.expect("data should be present");
  assert_eq!(data.rows.len(), 2);

  let chart_url = answer.chart_url.expect("bar chart expected for categorical counts");
  assert!(chart_url.starts_with("/static/chart_"));
  let file = dir.path().join(chart_url.trim_start_matches("/static/"));
  assert!(file.exists());

  assert!(answer.explanation.contains("42"));
}

#[tokio::test]
async fn unanswerable_question_degrades_to_notice_only() {
  let dir = tempfile::tempdir().unwrap();
  let model =
    Arc::new(ScriptedModel::new("I am unable to write a query for that question.", "unused"));
  let warehouse = Arc::new(StubWarehouse::ok(profession_counts()));
  let orchestrator = orchestrator(model, warehouse.clone(), dir.path()).await;

  let answer = orchestrator.answer("What is the meaning of life?").await;

  assert!(answer.sql.is_none());
  assert!(answer.data.is_none());
  assert!(answer.chart_url.is_none());
  assert!(answer.explanation.contains("rephrasing"));
  // The warehouse must never see a query that failed synthesis.
  assert!(warehouse.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn model_outage_produces_unavailability_notice() {
  let dir = tempfile::tempdir().unwrap();
  let model = Arc::new(ScriptedModel {
    sql: Err("quota exhausted".to_string()),
    prose: Err("quota exhausted".to_string()),
  });
  let warehouse = Arc::new(StubWarehouse::ok(profession_counts()));
  let orchestrator = orchestrator(model, warehouse, dir.path()).await;

  let answer = orchestrator.answer("how many events ran last month?").await;
  assert!(answer.sql.is_none());
  assert!(answer.explanation.contains("unavailable"));
}

#[tokio::test]
async fn execution_failure_keeps_sql_and_surfaces_warehouse_message() {
  let dir = tempfile::tempdir().unwrap();
  let model = Arc::new(ScriptedModel::new(
    "SELECT bogus_column FROM `p.d.mrt_events` WHERE organization_id = 'org_alpha'",
    "unused",
  ));
  let warehouse = Arc::new(StubWarehouse::failing(
    ErrorCategory::Syntax,
    "Unrecognized name: bogus_column at [1:8]",
  ));
  let orchestrator = orchestrator(model, warehouse, dir.path()).await;

  let answer = orchestrator.answer("show me the bogus column").await;

  assert!(answer.sql.is_some());
  assert!(answer.data.is_none());
  assert!(answer.chart_url.is_none());
  assert!(answer.explanation.contains("syntax"));
  assert!(answer.explanation.contains("Unrecognized name: bogus_column at [1:8]"));
}

#[tokio::test]
async fn empty_result_answers_without_a_chart() {
  let dir = tempfile::tempdir().unwrap();
  let model = Arc::new(ScriptedModel {
    sql: Ok(
      "SELECT profession FROM `p.d.mrt_events` WHERE organization_id = 'org_alpha' AND profession = 'Astronaut'"
        .to_string(),
    ),
    // Explanation model down: the template summary takes over.
    prose: Err("offline".to_string()),
  });
  let empty = ResultSet {
    columns: vec![ColumnMeta { name: "profession".to_string(), ty: "STRING".to_string() }],
    rows: vec![],
    truncated: false,
  };
  let warehouse = Arc::new(StubWarehouse::ok(empty));
  let orchestrator = orchestrator(model, warehouse, dir.path()).await;

  let answer = orchestrator.answer("which attendees are astronauts?").await;

  let data = answer.data.expect("an empty result set is still data");
  assert!(data.rows.is_empty());
  assert!(answer.chart_url.is_none());
  assert!(answer.explanation.contains("no matching data"));
}

#[tokio::test]
async fn tenant_placeholder_is_substituted_before_execution() {
  let dir = tempfile::tempdir().unwrap();
  let model = Arc::new(ScriptedModel::new(
    "SELECT COUNT(*) as count FROM `p.d.mrt_events` WHERE organization_id = '{organization_id}'",
    "There are 42 events.",
  ));
  let warehouse = Arc::new(StubWarehouse::ok(ResultSet {
    columns: vec![ColumnMeta { name: "count".to_string(), ty: "INTEGER".to_string() }],
    rows: vec![vec![Scalar::Integer(42)]],
    truncated: false,
  }));
  let orchestrator = orchestrator(model, warehouse.clone(), dir.path()).await;

  let answer = orchestrator.answer("how many events do we have?").await;

  let executed = warehouse.received.lock().unwrap();
  assert_eq!(executed.len(), 1);
  assert!(executed[0].contains("organization_id = 'org_alpha'"));
  assert!(!executed[0].contains("{organization_id}"));
  assert!(answer.sql.as_deref().unwrap().contains("org_alpha"));
}
