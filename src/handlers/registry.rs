use super::{
    BodyMeasurementHandler, ExerciseSetModificationHandler, ExerciseSubstitutionHandler,
    MacroTargetHandler, NutritionGoalHandler, NutritionProfileHandler, ProgramProgressHandler,
    SyncHandler, SyncOperation, SyncOutcome,
};
use crate::api::{
    BodyMeasurementService, ExerciseSetModificationService, ExerciseSubstitutionService,
    NutritionGoalService, NutritionProfileService, ProgramProgressService,
};
use crate::local_db::OfflineStore;
use crate::shared::{EntityKind, SyncError, SyncResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps each entity to the handler that syncs it
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<EntityKind, Arc<dyn SyncHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All seven handlers sharing one store and one API client
    pub fn with_defaults<A>(store: Arc<dyn OfflineStore>, api: Arc<A>) -> Self
    where
        A: BodyMeasurementService
            + ExerciseSetModificationService
            + ExerciseSubstitutionService
            + NutritionGoalService
            + NutritionProfileService
            + ProgramProgressService
            + 'static,
    {
        let mut registry = Self::new();
        registry.register(BodyMeasurementHandler::new(store.clone(), api.clone()));
        registry.register(ExerciseSetModificationHandler::new(store.clone(), api.clone()));
        registry.register(ExerciseSubstitutionHandler::new(store.clone(), api.clone()));
        registry.register(MacroTargetHandler::new(store.clone()));
        registry.register(NutritionGoalHandler::new(store.clone(), api.clone()));
        registry.register(NutritionProfileHandler::new(store.clone(), api.clone()));
        registry.register(ProgramProgressHandler::new(store, api));
        registry
    }

    /// Register a handler, replacing any previous one for its entity
    pub fn register<H>(&mut self, handler: H) -> &mut Self
    where
        H: SyncHandler + 'static,
    {
        let entity = handler.entity();
        if self.handlers.insert(entity, Arc::new(handler)).is_some() {
            tracing::debug!(%entity, "Replaced sync handler");
        }
        self
    }

    pub fn get(&self, entity: EntityKind) -> Option<Arc<dyn SyncHandler>> {
        self.handlers.get(&entity).cloned()
    }

    pub fn contains(&self, entity: EntityKind) -> bool {
        self.handlers.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route an operation to its entity's handler
    pub async fn dispatch(&self, entity: EntityKind, operation: &SyncOperation) -> SyncResult<SyncOutcome> {
        let handler = self.get(entity).ok_or_else(|| {
            tracing::error!(%entity, "No sync handler registered");
            SyncError::HandlerNotRegistered { entity }
        })?;
        handler.sync_to_server(operation).await
    }
}
