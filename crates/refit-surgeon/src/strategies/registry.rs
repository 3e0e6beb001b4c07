//! Ordered strategy registry. The first strategy that can handle a record wins.

use super::conditional::SimplifyConditional;
use super::dead_code::RemoveDeadCode;
use super::extract_method::{AutoExtractMethod, ExtractMethodAdvisor};
use super::imports::RemoveUnusedImport;
use super::inline::InlineMethod;
use super::literal::ExtractConstant;
use super::parameter_object::IntroduceParameterObject;
use super::polymorphism::ReplaceSwitchWithDispatch;
use super::rename::RenameVariable;
use super::resources::TryWithResources;
use super::{Strategy, StrategyOptions};
use crate::defect::DefectRecord;

pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// The built-in strategies in match order.
    ///
    /// `complex-conditional` is claimed by both the simplifier and the
    /// dispatch-table rewrite; the simplifier comes first. The auto-applying
    /// extract-method tier is only registered when enabled, ahead of the
    /// advisory tier.
    pub fn with_defaults(options: &StrategyOptions) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ExtractConstant));
        registry.register(Box::new(RemoveUnusedImport));
        registry.register(Box::new(RemoveDeadCode));
        registry.register(Box::new(SimplifyConditional));
        registry.register(Box::new(TryWithResources));
        registry.register(Box::new(IntroduceParameterObject::new(
            options.max_parameters,
        )));
        registry.register(Box::new(ReplaceSwitchWithDispatch));
        registry.register(Box::new(InlineMethod));
        registry.register(Box::new(RenameVariable));
        if options.auto_extract {
            registry.register(Box::new(AutoExtractMethod::new(options)));
        }
        registry.register(Box::new(ExtractMethodAdvisor::new(options)));
        registry
    }

    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        self.strategies.push(strategy);
    }

    /// First registered strategy whose `can_handle` accepts `record`.
    pub fn first_match(&self, record: &DefectRecord) -> Option<&dyn Strategy> {
        self.strategies
            .iter()
            .find(|s| s.can_handle(record))
            .map(|s| s.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Strategy> {
        self.strategies
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults(&StrategyOptions::default())
    }
}
