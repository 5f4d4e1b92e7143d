//! Per-form response statistics and their cache.
//!
//! A cache entry is served only while it is younger than the configured TTL
//! *and* the share token still has exactly as many responses as when the
//! entry was computed. Response writes evict the entry eagerly; the dual
//! check catches writes that bypassed eviction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fomz_shared::{Question, QuestionKind, Response, Result};
use serde::{Deserialize, Serialize};

use crate::keys;
use crate::local::LocalStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "summary", rename_all = "camelCase")]
pub enum QuestionSummary {
    /// Count per chosen value (choice, dropdown and checkbox questions).
    Distribution { distribution: BTreeMap<String, u64> },
    Rating {
        average: Option<f64>,
        distribution: BTreeMap<String, u64>,
    },
    Numeric {
        average: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Only the response rate is reported.
    ResponseRate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalytics {
    pub question_id: String,
    pub title: String,
    pub kind: String,
    pub response_count: u64,
    /// Percentage of responses that answered this question.
    pub response_rate: f64,
    #[serde(flatten)]
    pub summary: QuestionSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResult {
    pub total_responses: u64,
    pub questions: Vec<QuestionAnalytics>,
    pub timeline: Vec<TimelinePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsCacheEntry {
    pub data: AnalyticsResult,
    pub last_calculated: DateTime<Utc>,
    pub response_count: u64,
}

impl LocalStore {
    /// Statistics for the responses under `share_id`, served from cache when
    /// the cached entry is still valid.
    pub fn compute_analytics(
        &mut self,
        share_id: &str,
        questions: &[Question],
    ) -> Result<AnalyticsResult> {
        let responses = self.list_responses(share_id)?;
        let now = self.now();
        let cache_key = keys::analytics(share_id);

        if let Ok(Some(entry)) = self.read_json::<AnalyticsCacheEntry>(&cache_key) {
            let fresh = now - entry.last_calculated < self.config().analytics_ttl;
            if fresh && entry.response_count == responses.len() as u64 {
                tracing::debug!(share_id, "analytics cache hit");
                return Ok(entry.data);
            }
        }

        let data = analyze(&responses, questions);
        let entry = AnalyticsCacheEntry {
            data: data.clone(),
            last_calculated: now,
            response_count: responses.len() as u64,
        };

        // Caching is an optimisation; never fail the read over it.
        match self.check_quota() {
            Ok(quota) if quota.is_near_limit => {
                tracing::debug!(share_id, percentage = quota.percentage, "skipping analytics cache, storage near limit");
            }
            Ok(_) => {
                if let Err(e) = self.write_json(&cache_key, &entry) {
                    tracing::debug!(share_id, error = %e, "analytics cache write skipped");
                }
            }
            Err(e) => {
                tracing::debug!(share_id, error = %e, "quota check failed, analytics not cached");
            }
        }

        Ok(data)
    }
}

/// Compute statistics for `responses` against `questions`.
pub fn analyze(responses: &[Response], questions: &[Question]) -> AnalyticsResult {
    let total = responses.len() as u64;

    let questions = questions
        .iter()
        .filter(|q| !matches!(q.kind, QuestionKind::SectionBreak))
        .map(|q| analyze_question(q, responses, total))
        .collect();

    let mut per_day: BTreeMap<String, u64> = BTreeMap::new();
    for response in responses {
        let day = response.submitted_at.date_naive().format("%Y-%m-%d").to_string();
        *per_day.entry(day).or_default() += 1;
    }
    let timeline = per_day
        .into_iter()
        .map(|(date, count)| TimelinePoint { date, count })
        .collect();

    AnalyticsResult {
        total_responses: total,
        questions,
        timeline,
    }
}

fn analyze_question(question: &Question, responses: &[Response], total: u64) -> QuestionAnalytics {
    let answers: Vec<_> = responses
        .iter()
        .filter_map(|r| r.answers.get(&question.id))
        .filter(|a| a.is_answered())
        .collect();
    let response_count = answers.len() as u64;

    let summary = match &question.kind {
        QuestionKind::Choice { options, .. } | QuestionKind::Checkbox { options } => {
            let mut distribution: BTreeMap<String, u64> =
                options.iter().map(|o| (o.clone(), 0)).collect();
            for answer in &answers {
                for value in answer.values() {
                    if !value.is_blank() {
                        *distribution.entry(value.key()).or_default() += 1;
                    }
                }
            }
            QuestionSummary::Distribution { distribution }
        }
        QuestionKind::Rating { max } => {
            let mut distribution: BTreeMap<String, u64> =
                (1..=*max).map(|v| (v.to_string(), 0)).collect();
            let mut values = Vec::new();
            for answer in &answers {
                for value in answer.values() {
                    if let Some(n) = value.as_f64() {
                        values.push(n);
                        *distribution.entry(value_key(n)).or_default() += 1;
                    }
                }
            }
            QuestionSummary::Rating {
                average: mean(&values),
                distribution,
            }
        }
        QuestionKind::Number { .. } => {
            let values: Vec<f64> = answers
                .iter()
                .flat_map(|a| a.values())
                .filter_map(|v| v.as_f64())
                .collect();
            QuestionSummary::Numeric {
                average: mean(&values),
                min: values.iter().copied().reduce(f64::min),
                max: values.iter().copied().reduce(f64::max),
            }
        }
        _ => QuestionSummary::ResponseRate,
    };

    QuestionAnalytics {
        question_id: question.id.clone(),
        title: question.title.clone(),
        kind: question.kind.label().to_string(),
        response_count,
        response_rate: if total == 0 {
            0.0
        } else {
            response_count as f64 / total as f64 * 100.0
        },
        summary,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn value_key(n: f64) -> String {
    fomz_shared::Scalar::Number(n).key()
}
