//! Token accounting for model calls (append-only)

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelUsage {
  pub model_name: String,
  pub prompt_tokens: i64,
  pub response_tokens: i64,
  pub thoughts_tokens: i64,
  pub total_tokens: i64,
}

/// Totals per model, for the host's usage view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
  pub model_name: String,
  pub calls: i64,
  pub total_tokens: i64,
}

pub fn record_usage(conn: &Connection, usage: &ModelUsage, at: DateTime<Utc>) -> Result<()> {
  conn.execute(
    r#"
    INSERT INTO model_usage (model_name, prompt_tokens, response_tokens, thoughts_tokens,
                             total_tokens, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    "#,
    params![
      usage.model_name,
      usage.prompt_tokens,
      usage.response_tokens,
      usage.thoughts_tokens,
      usage.total_tokens,
      at.to_rfc3339(),
    ],
  )?;
  Ok(())
}

pub fn get_usage_totals(conn: &Connection) -> Result<Vec<UsageTotals>> {
  let mut stmt = conn.prepare(
    r#"
    SELECT model_name, COUNT(*), COALESCE(SUM(total_tokens), 0)
    FROM model_usage
    GROUP BY model_name
    ORDER BY model_name ASC
    "#,
  )?;
  let totals = stmt
    .query_map([], |row| {
      Ok(UsageTotals {
        model_name: row.get(0)?,
        calls: row.get(1)?,
        total_tokens: row.get(2)?,
      })
    })?
    .collect::<Result<Vec<_>>>()?;
  Ok(totals)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::TestEnv;

  #[test]
  fn test_usage_totals_grouped_by_model() {
    let env = TestEnv::new().unwrap();
    env.with_conn(|conn| {
      let flash = ModelUsage {
        model_name: "gemini-2.0-flash".to_string(),
        prompt_tokens: 100,
        response_tokens: 20,
        thoughts_tokens: 0,
        total_tokens: 120,
      };
      record_usage(conn, &flash, Utc::now()).unwrap();
      record_usage(conn, &flash, Utc::now()).unwrap();
      record_usage(
        conn,
        &ModelUsage {
          model_name: "gemini-2.5-pro".to_string(),
          total_tokens: 7,
          ..Default::default()
        },
        Utc::now(),
      )
      .unwrap();

      let totals = get_usage_totals(conn).unwrap();
      assert_eq!(totals.len(), 2);
      assert_eq!(totals[0].model_name, "gemini-2.0-flash");
      assert_eq!(totals[0].calls, 2);
      assert_eq!(totals[0].total_tokens, 240);
      assert_eq!(totals[1].total_tokens, 7);
    });
  }
}
