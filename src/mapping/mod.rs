// rule based mapping, feeds ReflexionGraph::build
pub mod generator;

pub use generator::{
    GeneratedMapping, GeneratorError, MappingDecision, MappingGenerator, MappingRule, Resolution,
};
