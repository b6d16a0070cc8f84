pub mod api;
pub mod arena;
pub mod config;
pub mod database;
pub mod errors;
pub mod examiner;
pub mod extractor;
pub mod grader;
pub mod json_repair;
pub mod llm_providers;
pub mod llm_service;
pub mod logging;
pub mod miner;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod study_service;
pub mod syllabus;

pub use config::Config;
pub use database::Database;
pub use errors::*;
pub use json_repair::JsonResponseParser;
pub use llm_providers::{
    LLMProvider, LLMProviderFactory, LLMProviderType, SamplingParams, TextGenerator,
};
pub use llm_service::LLMService;
pub use models::*;
pub use pipeline::ContentPipeline;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use scheduler::{ReviewChoice, SchedulingState, Sm2Scheduler};
pub use study_service::StudyService;
