//! Persona key to handler dispatch

use crate::models::{GenerationResult, StreamFrame};
use crate::persona::{PersonaDefinition, PersonaRegistry};
use crate::pipeline::QueryPipeline;
use crate::Result;
use futures::Stream;
use std::sync::Arc;

pub struct ChatDispatcher {
    registry: PersonaRegistry,
    pipeline: Arc<QueryPipeline>,
}

/// A persona bound to the shared pipeline.
pub struct PersonaHandler<'a> {
    definition: &'a PersonaDefinition,
    pipeline: &'a QueryPipeline,
}

impl ChatDispatcher {
    pub fn new(registry: PersonaRegistry, pipeline: Arc<QueryPipeline>) -> Self {
        Self { registry, pipeline }
    }

    pub fn create_handler(&self, key: &str) -> Result<PersonaHandler<'_>> {
        let definition = self.registry.resolve(key)?;
        Ok(PersonaHandler {
            definition,
            pipeline: &self.pipeline,
        })
    }

    pub fn available(&self) -> Vec<&'static str> {
        self.registry.available()
    }

    pub fn registry(&self) -> &PersonaRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &Arc<QueryPipeline> {
        &self.pipeline
    }
}

impl PersonaHandler<'_> {
    pub fn definition(&self) -> &PersonaDefinition {
        self.definition
    }

    pub async fn run(&self, query: &str) -> GenerationResult {
        self.pipeline.run(self.definition, query).await
    }

    pub fn run_stream(&self, query: &str) -> impl Stream<Item = StreamFrame> + Send + 'static {
        self.pipeline.run_stream(self.definition, query)
    }
}
