pub mod explanation;
pub mod face_analysis;
pub mod look_iteration;
pub mod product_analysis;
pub mod product_recognition;

pub use explanation::EXPLANATION_TASK;
pub use face_analysis::FACE_ANALYSIS_TASK;
pub use look_iteration::LOOK_ITERATION_TASK;
pub use product_analysis::PRODUCT_ANALYSIS_TASK;
pub use product_recognition::PRODUCT_RECOGNITION_TASK;

use crate::flow::{FlowError, FlowRegistry};

/// Builds the registry of all task definitions. Run once during process
/// setup; a definition error here (bad schema, template referencing a
/// missing field) aborts startup instead of surfacing mid-call.
pub fn build_registry() -> Result<FlowRegistry, FlowError> {
    let mut registry = FlowRegistry::new();
    registry.register(face_analysis::task()?)?;
    registry.register(product_recognition::task()?)?;
    registry.register(look_iteration::task()?)?;
    registry.register(explanation::task()?)?;
    registry.register(product_analysis::task()?)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_five_tasks_register_cleanly() {
        let registry = build_registry().unwrap();
        for name in [
            FACE_ANALYSIS_TASK,
            PRODUCT_RECOGNITION_TASK,
            LOOK_ITERATION_TASK,
            EXPLANATION_TASK,
            PRODUCT_ANALYSIS_TASK,
        ] {
            assert!(registry.get(name).is_some(), "task '{name}' missing");
        }
    }

    #[test]
    fn product_recognition_binds_the_similar_products_tool() {
        let registry = build_registry().unwrap();
        let task = registry.get(PRODUCT_RECOGNITION_TASK).unwrap();
        assert!(task.tool("find_similar_products").is_some());
    }

    #[test]
    fn explanation_binds_the_youtube_tool() {
        let registry = build_registry().unwrap();
        let task = registry.get(EXPLANATION_TASK).unwrap();
        assert!(task.tool("search_youtube").is_some());
    }
}
