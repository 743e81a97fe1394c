//! City search tool — scores catalog cities against the user's filters.
//!
//! Scoring: +30 per matched interest, +20 when the budget band fits inside
//! the requested range, +10 when the city is cheaper than the range floor,
//! +15 when a requested season is among the city's best seasons. Results
//! are sorted by score and carry human-readable match reasons.

use crate::travel_data::{self, CityRecord};
use async_trait::async_trait;
use std::time::Duration;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::{ParamKind, ParamSpec, Tool, ToolDescriptor};

pub struct SearchCitiesTool;

#[async_trait]
impl Tool for SearchCitiesTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "search_cities".into(),
            description: "根据兴趣、预算范围和出行季节搜索匹配的城市，按匹配度排序返回。"
                .into(),
            params: vec![
                ParamSpec::optional(
                    "interests",
                    ParamKind::Array,
                    "兴趣标签列表，如 [\"美食\", \"历史文化\"]",
                ),
                ParamSpec::optional("budget_min", ParamKind::Number, "每日预算下限（元）"),
                ParamSpec::optional("budget_max", ParamKind::Number, "每日预算上限（元）"),
                ParamSpec::optional("season", ParamKind::String, "出行季节，如 \"春季\""),
            ],
            timeout: Duration::from_secs(5),
            category: "travel".into(),
            tags: vec!["search".into(), "city".into()],
            terminal: false,
        }
    }

    async fn execute(
        &self,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let interests: Vec<String> = params["interests"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let budget_min = params["budget_min"].as_f64();
        let budget_max = params["budget_max"].as_f64();
        let season = params["season"].as_str();

        let mut matched: Vec<serde_json::Value> = travel_data::catalog()
            .iter()
            .filter_map(|city| score_city(city, &interests, budget_min, budget_max, season))
            .collect();

        matched.sort_by(|a, b| {
            b["score"]
                .as_i64()
                .unwrap_or(0)
                .cmp(&a["score"].as_i64().unwrap_or(0))
        });

        Ok(serde_json::json!({
            "success": true,
            "count": matched.len(),
            "cities": matched,
        }))
    }
}

fn score_city(
    city: &CityRecord,
    interests: &[String],
    budget_min: Option<f64>,
    budget_max: Option<f64>,
    season: Option<&str>,
) -> Option<serde_json::Value> {
    let mut score = 0i64;
    let mut reasons: Vec<String> = Vec::new();

    for interest in interests {
        if city.tags.contains(&interest.as_str()) {
            score += 30;
            reasons.push(format!("符合{}兴趣", interest));
        }
    }

    if let Some(max) = budget_max {
        let (low, high) = city.daily_budget;
        if f64::from(high) <= max && budget_min.map_or(true, |min| f64::from(low) >= min) {
            score += 20;
            reasons.push("预算适合".into());
        } else if f64::from(high) < budget_min.unwrap_or(0.0) {
            score += 10;
            reasons.push("预算较低".into());
        }
    }

    if let Some(season) = season {
        if city.best_seasons.contains(&season) {
            score += 15;
            reasons.push(format!("{}适宜出行", season));
        }
    }

    // With no filters every city is a weak match; with filters only scored
    // cities are returned.
    let has_filters =
        !interests.is_empty() || budget_min.is_some() || budget_max.is_some() || season.is_some();
    if has_filters && score == 0 {
        return None;
    }

    Some(serde_json::json!({
        "city": city.city,
        "region": city.region,
        "score": score,
        "description": city.description,
        "daily_budget": { "low": city.daily_budget.0, "high": city.daily_budget.1 },
        "match_reasons": reasons,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interest_match_scores_and_sorts() {
        let tool = SearchCitiesTool;
        let result = tool
            .execute(serde_json::json!({"interests": ["美食"]}))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        let cities = result["cities"].as_array().unwrap();
        assert!(!cities.is_empty());
        for city in cities {
            assert!(city["score"].as_i64().unwrap() >= 30);
            assert!(city["match_reasons"]
                .as_array()
                .unwrap()
                .iter()
                .any(|r| r.as_str().unwrap().contains("美食")));
        }
        // Sorted descending.
        let scores: Vec<i64> = cities.iter().map(|c| c["score"].as_i64().unwrap()).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn budget_and_season_filters() {
        let tool = SearchCitiesTool;
        let result = tool
            .execute(serde_json::json!({
                "budget_min": 300, "budget_max": 700, "season": "秋季"
            }))
            .await
            .unwrap();

        let cities = result["cities"].as_array().unwrap();
        assert!(!cities.is_empty());
        // 上海's band (500-1200) exceeds the cap, so it scores on season only
        // or drops out entirely.
        for city in cities {
            if city["city"] == "上海" {
                assert!(city["score"].as_i64().unwrap() < 30);
            }
        }
    }

    #[tokio::test]
    async fn no_filters_returns_whole_catalog() {
        let tool = SearchCitiesTool;
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(
            result["count"].as_u64().unwrap() as usize,
            crate::travel_data::catalog().len()
        );
    }

    #[tokio::test]
    async fn unmatched_filters_return_empty() {
        let tool = SearchCitiesTool;
        let result = tool
            .execute(serde_json::json!({"interests": ["滑雪"]}))
            .await
            .unwrap();
        assert_eq!(result["count"], 0);
    }

    #[test]
    fn descriptor_shape() {
        let d = SearchCitiesTool.descriptor();
        assert_eq!(d.name, "search_cities");
        assert!(!d.terminal);
        assert!(d.params.iter().all(|p| !p.required));
    }
}
