//! Trip budget estimation for a city and duration.

use crate::travel_data;
use async_trait::async_trait;
use std::time::Duration;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::{ParamKind, ParamSpec, Tool, ToolDescriptor};

pub struct CalculateBudgetTool;

/// Spending-standard multipliers applied to the city's daily midpoint.
fn standard_multiplier(standard: &str) -> f64 {
    match standard {
        "经济" | "economy" => 0.8,
        "豪华" | "luxury" => 1.8,
        _ => 1.0, // 舒适 / comfort is the default
    }
}

#[async_trait]
impl Tool for CalculateBudgetTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "calculate_budget".into(),
            description: "估算在某城市旅行指定天数的总预算，按经济/舒适/豪华标准分项给出。"
                .into(),
            params: vec![
                ParamSpec::required("city", ParamKind::String, "城市名称"),
                ParamSpec::required("days", ParamKind::Integer, "旅行天数"),
                ParamSpec::optional(
                    "standard",
                    ParamKind::String,
                    "消费标准：经济 / 舒适 / 豪华（默认舒适）",
                ),
            ],
            timeout: Duration::from_secs(5),
            category: "travel".into(),
            tags: vec!["budget".into()],
            terminal: false,
        }
    }

    async fn execute(
        &self,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let city_name = params["city"].as_str().unwrap_or_default();
        let days = params["days"].as_u64().unwrap_or(0);
        if days == 0 || days > 60 {
            return Err(ToolError::InvalidParams {
                tool_name: "calculate_budget".into(),
                message: "days must be between 1 and 60".into(),
            });
        }

        let city = travel_data::find_city(city_name).ok_or_else(|| ToolError::ExecutionFailed {
            tool_name: "calculate_budget".into(),
            message: format!("未收录的城市: {city_name}"),
        })?;

        let standard = params["standard"].as_str().unwrap_or("舒适");
        let multiplier = standard_multiplier(standard);
        let daily_mid = f64::from(city.daily_budget.0 + city.daily_budget.1) / 2.0;
        let daily = daily_mid * multiplier;

        // Rough split: half accommodation, a third food, the rest transport.
        let accommodation = daily * 0.5 * days as f64;
        let food = daily * 0.33 * days as f64;
        let transport = daily * 0.17 * days as f64;
        let tickets: u32 = city.attractions.iter().map(|a| a.ticket_price).sum();
        let total = accommodation + food + transport + f64::from(tickets);

        Ok(serde_json::json!({
            "success": true,
            "city": city.city,
            "days": days,
            "standard": standard,
            "daily_estimate": daily.round(),
            "breakdown": {
                "accommodation": accommodation.round(),
                "food": food.round(),
                "transport": transport.round(),
                "tickets": tickets,
            },
            "total": total.round(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn three_day_beijing_budget() {
        let tool = CalculateBudgetTool;
        let result = tool
            .execute(serde_json::json!({"city": "北京", "days": 3}))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        assert_eq!(result["days"], 3);
        let total = result["total"].as_f64().unwrap();
        assert!(total > 0.0);
        // Tickets for the three listed attractions.
        assert_eq!(result["breakdown"]["tickets"], 130);
    }

    #[tokio::test]
    async fn luxury_costs_more_than_economy() {
        let tool = CalculateBudgetTool;
        let economy = tool
            .execute(serde_json::json!({"city": "成都", "days": 2, "standard": "经济"}))
            .await
            .unwrap();
        let luxury = tool
            .execute(serde_json::json!({"city": "成都", "days": 2, "standard": "豪华"}))
            .await
            .unwrap();
        assert!(luxury["total"].as_f64().unwrap() > economy["total"].as_f64().unwrap());
    }

    #[tokio::test]
    async fn zero_days_is_invalid() {
        let tool = CalculateBudgetTool;
        let err = tool
            .execute(serde_json::json!({"city": "北京", "days": 0}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn unknown_city_is_execution_error() {
        let tool = CalculateBudgetTool;
        let err = tool
            .execute(serde_json::json!({"city": "atlantis", "days": 3}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
