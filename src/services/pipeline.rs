//! Stage tracking for one request passing through the resource service

use std::fmt;

use crate::core::error::JsonApiError;

/// Where a request currently is
///
/// ```text
/// Idle → ConstraintsComposed → DataFetched → DocumentBuilt → Done
///   └──────────────┴──────────────┴──────────────┴──→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    ConstraintsComposed,
    DataFetched,
    DocumentBuilt,
    Done,
    Failed,
}

impl PipelineStage {
    /// Stages a request may move to from this one
    fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Idle, ConstraintsComposed)
                | (ConstraintsComposed, DataFetched)
                | (DataFetched, DocumentBuilt)
                | (DocumentBuilt, Done)
                // writes without a response body
                | (DataFetched, Done)
        ) || (next == Failed && !matches!(self, Done | Failed))
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::ConstraintsComposed => "constraints-composed",
            PipelineStage::DataFetched => "data-fetched",
            PipelineStage::DocumentBuilt => "document-built",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Traces the stage transitions of one service call
#[derive(Debug)]
pub struct Pipeline {
    operation: &'static str,
    resource_type: String,
    stage: PipelineStage,
}

impl Pipeline {
    pub fn start(operation: &'static str, resource_type: &str) -> Self {
        tracing::debug!(operation, resource_type = %resource_type, "pipeline started");
        Self {
            operation,
            resource_type: resource_type.to_string(),
            stage: PipelineStage::Idle,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn advance(&mut self, next: PipelineStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "invalid pipeline transition {} -> {}",
            self.stage,
            next
        );
        tracing::debug!(
            operation = self.operation,
            resource_type = %self.resource_type,
            from = %self.stage,
            to = %next,
            "pipeline stage"
        );
        self.stage = next;
    }

    /// Record a failure and hand the error back
    pub fn fail(&mut self, error: JsonApiError) -> JsonApiError {
        match &error {
            JsonApiError::DataSource(e) => tracing::error!(
                operation = self.operation,
                resource_type = %self.resource_type,
                stage = %self.stage,
                error = %e,
                "data source failure"
            ),
            other => tracing::warn!(
                operation = self.operation,
                resource_type = %self.resource_type,
                stage = %self.stage,
                status = other.status_code().as_u16(),
                error = %other,
                "request rejected"
            ),
        }
        self.stage = PipelineStage::Failed;
        error
    }

    /// Run `result` through the pipeline, marking it failed on error
    pub fn check<T>(&mut self, result: Result<T, JsonApiError>) -> Result<T, JsonApiError> {
        result.map_err(|e| self.fail(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ParseError;

    #[test]
    fn test_read_pipeline_transitions() {
        let mut pipeline = Pipeline::start("get_all", "articles");
        pipeline.advance(PipelineStage::ConstraintsComposed);
        pipeline.advance(PipelineStage::DataFetched);
        pipeline.advance(PipelineStage::DocumentBuilt);
        pipeline.advance(PipelineStage::Done);
        assert_eq!(pipeline.stage(), PipelineStage::Done);
    }

    #[test]
    fn test_failure_from_any_active_stage() {
        for stage in [
            PipelineStage::Idle,
            PipelineStage::ConstraintsComposed,
            PipelineStage::DataFetched,
            PipelineStage::DocumentBuilt,
        ] {
            assert!(stage.can_advance_to(PipelineStage::Failed));
        }
        assert!(!PipelineStage::Done.can_advance_to(PipelineStage::Failed));
        assert!(!PipelineStage::Idle.can_advance_to(PipelineStage::DataFetched));
    }

    #[test]
    fn test_check_marks_failed() {
        let mut pipeline = Pipeline::start("get_by_id", "articles");
        let result: Result<(), JsonApiError> = pipeline.check(Err(ParseError::MissingBody.into()));
        assert!(result.is_err());
        assert_eq!(pipeline.stage(), PipelineStage::Failed);
    }
}
