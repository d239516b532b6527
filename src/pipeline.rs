//! Pipeline orchestration.
//!
//! One question flows retrieve, synthesize, execute, enrich. The pipeline
//! itself never fails: terminal stage errors become degraded answers with a
//! notice in the explanation, and enrichment failures (chart, prose) are
//! logged and dropped. Strictly, a missing query means no data and no chart.

use std::sync::Arc;

use tracing::{info, warn};

use crate::chart::{select_chart, ChartRenderer};
use crate::error::SynthesisError;
use crate::explain::Explainer;
use crate::retriever::SchemaRetriever;
use crate::synthesis::SqlSynthesizer;
use crate::warehouse::{ResultSet, Warehouse};

/// The complete outcome for one question.
#[derive(Debug, Clone)]
pub struct Answer {
  pub question: String,
  pub sql: Option<String>,
  pub data: Option<ResultSet>,
  pub chart_url: Option<String>,
  pub explanation: String,
}

pub struct Orchestrator {
  retriever: SchemaRetriever,
  synthesizer: SqlSynthesizer,
  warehouse: Arc<dyn Warehouse>,
  explainer: Explainer,
  renderer: ChartRenderer,
  organization_id: String,
}

impl Orchestrator {
  pub fn new(
    retriever: SchemaRetriever,
    synthesizer: SqlSynthesizer,
    warehouse: Arc<dyn Warehouse>,
    explainer: Explainer,
    renderer: ChartRenderer,
    organization_id: String,
  ) -> Self {
    Self { retriever, synthesizer, warehouse, explainer, renderer, organization_id }
  }

  pub async fn answer(&self, question: &str) -> Answer {
    let context = self.retriever.retrieve(question).await;

    let artifact =
      match self.synthesizer.synthesize(question, &context, &self.organization_id).await {
        Ok(artifact) => artifact,
        Err(e) => {
          warn!(error = %e, "synthesis failed, returning notice");
          return Answer {
            question: question.to_string(),
            sql: None,
            data: None,
            chart_url: None,
            explanation: synthesis_notice(&e),
          };
        }
      };

    // Models sometimes echo the literal placeholder from the prompt examples
    // instead of interpolating the tenant id.
    let sql = artifact.sql.replace("{organization_id}", &self.organization_id);
    if !sql.contains(&self.organization_id) {
      warn!("synthesized query carries no tenant filter");
    }

    let result = match self.warehouse.execute(&sql).await {
      Ok(result) => result,
      Err(e) => {
        warn!(category = e.category.as_str(), "warehouse execution failed");
        let notice =
          format!("The query could not be executed ({}): {}", e.category.as_str(), e.message);
        let explanation =
          match self.explainer.interpret_failure(question, &sql, &e.message).await {
            Some(text) => format!("{notice}\n{text}"),
            None => notice,
          };
        return Answer {
          question: question.to_string(),
          sql: Some(sql),
          data: None,
          chart_url: None,
          explanation,
        };
      }
    };

    // Chart and explanation are independent enrichments over the same data.
    let chart_future = async {
      let spec = select_chart(&result)?;
      match self.renderer.render(spec, &result, question).await {
        Ok(url) => Some(url),
        Err(e) => {
          warn!(error = %e, "chart rendering failed, answering without a chart");
          None
        }
      }
    };
    let explain_future = self.explainer.explain_result(question, &sql, &result);
    let (chart_url, explanation) = tokio::join!(chart_future, explain_future);

    info!(
      rows = result.rows.len(),
      truncated = result.truncated,
      chart = chart_url.is_some(),
      "question answered"
    );

    Answer { question: question.to_string(), sql: Some(sql), data: Some(result), chart_url, explanation }
  }
}

fn synthesis_notice(error: &SynthesisError) -> String {
  match error {
    SynthesisError::Unavailable(_) => {
      "The language model is currently unavailable, so no query could be generated. \
       Please try again in a moment."
        .to_string()
    }
    SynthesisError::Parse(_) => {
      "I could not generate a valid query for that question. \
       Try rephrasing it or asking about specific fields in your data."
        .to_string()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn notices_distinguish_outage_from_bad_question() {
    let outage = synthesis_notice(&SynthesisError::Unavailable("down".to_string()));
    assert!(outage.contains("unavailable"));

    let parse = synthesis_notice(&SynthesisError::Parse("no sql".to_string()));
    assert!(parse.contains("rephrasing"));
  }
}
