/// Standardized logging macros for consistent field names and message patterns across the
/// application. Every macro expands to a `tracing` event with structured fields.

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, study_set_id = $set_id:expr) => {
        tracing::debug!(
            operation = $operation,
            study_set_id = %$set_id,
            "API operation started"
        );
    };
    ($operation:expr, flashcard_id = $card_id:expr) => {
        tracing::debug!(
            operation = $operation,
            flashcard_id = %$card_id,
            "API operation started"
        );
    };
    ($operation:expr, session_id = $session_id:expr) => {
        tracing::debug!(
            operation = $operation,
            session_id = %$session_id,
            "API operation started"
        );
    };
    ($operation:expr) => {
        tracing::debug!(operation = $operation, "API operation started");
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, study_set_id = $set_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            study_set_id = %$set_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, flashcard_id = $card_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            flashcard_id = %$card_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, session_id = $session_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            session_id = %$session_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            count = $count,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(operation = $operation, "API operation completed: {}", $msg);
    };
}

/// Log API operation errors with consistent structure
#[macro_export]
macro_rules! log_api_error {
    ($operation:expr, study_set_id = $set_id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            study_set_id = %$set_id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
}

/// Log API warnings with context
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, study_set_id = $set_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            study_set_id = %$set_id,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::warn!(operation = $operation, "API operation warning: {}", $msg);
    };
}

// ============================================================================
// Pipeline Logging Macros
// ============================================================================

/// Log progress of a synthesis stage (architect, miner, arena, examiner, grader)
#[macro_export]
macro_rules! log_pipeline_stage {
    ($stage:expr, topic = $topic:expr, $msg:expr) => {
        tracing::info!(
            component = "pipeline",
            stage = $stage,
            topic = %$topic,
            "Pipeline stage: {}", $msg
        );
    };
    ($stage:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(
            component = "pipeline",
            stage = $stage,
            count = $count,
            "Pipeline stage: {}", $msg
        );
    };
    (skip, $stage:expr, topic = $topic:expr, reason = $reason:expr) => {
        tracing::warn!(
            component = "pipeline",
            stage = $stage,
            topic = %$topic,
            reason = %$reason,
            "Pipeline unit skipped"
        );
    };
    ($stage:expr, $msg:expr) => {
        tracing::info!(component = "pipeline", stage = $stage, "Pipeline stage: {}", $msg);
    };
}

// ============================================================================
// Database Operation Logging Macros
// ============================================================================

/// Log database operation performance and results
#[macro_export]
macro_rules! log_db_operation {
    (debug, $operation:expr, study_set_id = $set_id:expr, count = $count:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            study_set_id = %$set_id,
            result_count = $count,
            "Database operation completed"
        );
    };
    (info, $operation:expr, $msg:expr) => {
        tracing::info!(
            component = "database",
            operation = $operation,
            "Database operation: {}", $msg
        );
    };
    (error, $operation:expr, error = $error:expr) => {
        tracing::error!(
            component = "database",
            operation = $operation,
            error = %$error,
            "Database operation failed"
        );
    };
}

// ============================================================================
// LLM Service Logging Macros
// ============================================================================

/// Log upstream generation calls with provider context
#[macro_export]
macro_rules! log_llm_operation {
    (start, $operation:expr, provider = $provider:expr) => {
        tracing::info!(
            component = "llm_service",
            operation = $operation,
            provider = %$provider,
            "LLM operation started"
        );
    };
    (success, $operation:expr, provider = $provider:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = "llm_service",
            operation = $operation,
            provider = %$provider,
            duration_ms = $duration,
            "LLM operation completed successfully"
        );
    };
    (error, $operation:expr, error = $error:expr, retry_count = $retry:expr) => {
        tracing::error!(
            component = "llm_service",
            operation = $operation,
            error = %$error,
            retry_count = $retry,
            "LLM operation failed"
        );
    };
    (warn, $operation:expr, $msg:expr) => {
        tracing::warn!(
            component = "llm_service",
            operation = $operation,
            "LLM operation warning: {}", $msg
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and shutdown events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Performance and Validation Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_performance {
    ($operation:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            "Performance metrics"
        );
    };
}

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    #[test]
    fn test_logging_macros_compile() {
        let set_id = Uuid::new_v4();
        let card_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let error = anyhow::anyhow!("test error");

        log_api_start!("generate", study_set_id = set_id);
        log_api_start!("review", flashcard_id = card_id);
        log_api_start!("get_session", session_id = session_id);
        log_api_start!("list");

        log_api_success!("generate", study_set_id = set_id, "study set created");
        log_api_success!("review", flashcard_id = card_id, "rescheduled");
        log_api_success!("get_session", session_id = session_id, "session loaded");
        log_api_success!("list", count = 5, "study sets listed");
        log_api_success!("health", "ok");

        log_api_error!("generate", study_set_id = set_id, error = error, "failed");
        log_api_error!("generate", error = error, "failed");
        log_api_warn!("regenerate", study_set_id = set_id, "no flashcards");
        log_api_warn!("grade", "empty answer");

        log_pipeline_stage!("architect", count = 5, "syllabus ready");
        log_pipeline_stage!("miner", topic = "Cells", "mining topic");
        log_pipeline_stage!(skip, "miner", topic = "Cells", reason = "no result");
        log_pipeline_stage!("examiner", "regenerating");

        log_db_operation!(debug, "save_bundle", study_set_id = set_id, count = 4);
        log_db_operation!(info, "migration", "database initialized");
        log_db_operation!(error, "save_bundle", error = error);

        log_llm_operation!(start, "syllabus", provider = "Gemini");
        log_llm_operation!(success, "syllabus", provider = "Gemini", duration_ms = 1500);
        log_llm_operation!(error, "syllabus", error = error, retry_count = 3);
        log_llm_operation!(warn, "miner", "options returned as mapping");

        log_system_event!(startup, component = "server", "server starting");
        log_system_event!(shutdown, component = "server", "server stopped");
        log_system_event!(config, "configuration loaded successfully");

        log_performance!("generate_study_set", duration_ms = 50);

        log_validation!(success, "api_request", "request validated");
        log_validation!(failure, "quiz", error = "answer not among options");
    }
}
