//! Built-in travel tool implementations for Wayfarer.
//!
//! Tools query a static in-crate city catalog: search by interest/budget/
//! season, attraction lookup, budget estimation, and full city records.
//! The terminal `final_answer` tool is what the stop predicate watches for.

pub mod calculate_budget;
pub mod city_info;
pub mod final_answer;
pub mod query_attractions;
pub mod search_cities;
pub mod travel_data;

use wayfarer_core::tool::ToolRegistry;

/// Create the default tool registry with all built-in travel tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(search_cities::SearchCitiesTool));
    registry.register(Box::new(query_attractions::QueryAttractionsTool));
    registry.register(Box::new(calculate_budget::CalculateBudgetTool));
    registry.register(Box::new(city_info::CityInfoTool));
    registry.register(Box::new(final_answer::FinalAnswerTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_contents() {
        let registry = default_registry();
        assert_eq!(registry.len(), 5);
        assert!(registry.describe("search_cities").is_some());
        assert_eq!(registry.terminal_tools(), vec!["final_answer".to_string()]);
    }

    #[tokio::test]
    async fn registry_enforces_required_params() {
        let registry = default_registry();
        let result = registry
            .execute("query_attractions", serde_json::json!({}))
            .await;
        assert_eq!(
            result.failure_kind(),
            Some(wayfarer_core::tool::FailureKind::InvalidParams)
        );
    }
}
