//! Engine registry and factory.
//!
//! Patches name their engine as a string; the registry turns that name into
//! a fresh [`Program`] running at the output sample rate.

use crate::engines::{KarplusStrong, Octalope, Simple};
use crate::error::LoadError;
use crate::program::{Program, Silent};

/// Describes an engine in the registry.
#[derive(Debug, Clone)]
pub struct EngineDescriptor {
    /// Name patches refer to the engine by.
    pub name: &'static str,
    /// Brief description of the engine.
    pub description: &'static str,
}

/// Factory function type for creating programs.
type EngineFactory = fn(f32) -> Box<dyn Program>;

struct RegistryEntry {
    descriptor: EngineDescriptor,
    factory: EngineFactory,
}

/// Registry of all available sound engines.
pub struct EngineRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRegistry {
    /// Create a registry with every built-in engine.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(4),
        };
        registry.register_builtin_engines();
        registry
    }

    fn register_builtin_engines(&mut self) {
        self.register(
            EngineDescriptor {
                name: Simple::NAME,
                description: "Saw oscillator through an enveloped state variable filter",
            },
            |sr| Box::new(Simple::new(sr)),
        );

        self.register(
            EngineDescriptor {
                name: KarplusStrong::NAME,
                description: "Plucked string from a noise-excited delay line",
            },
            |sr| Box::new(KarplusStrong::new(sr)),
        );

        self.register(
            EngineDescriptor {
                name: Octalope::NAME,
                description: "Eight phase modulation operators with DX7-style envelopes",
            },
            |sr| Box::new(Octalope::new(sr)),
        );

        self.register(
            EngineDescriptor {
                name: Silent::NAME,
                description: "Silence",
            },
            |_| Box::new(Silent),
        );
    }

    fn register(&mut self, descriptor: EngineDescriptor, factory: EngineFactory) {
        self.entries.push(RegistryEntry { descriptor, factory });
    }

    /// Descriptors of every registered engine.
    pub fn all_engines(&self) -> Vec<&EngineDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Descriptor by engine name.
    pub fn get(&self, name: &str) -> Option<&EngineDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .map(|e| &e.descriptor)
    }

    /// Create a program with default parameters, or `None` for an unknown
    /// engine.
    pub fn create(&self, name: &str, sample_rate: f32) -> Option<Box<dyn Program>> {
        self.entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .map(|e| (e.factory)(sample_rate))
    }

    /// Create a program and load patch parameters into it.
    pub fn build(&self, name: &str, sample_rate: f32, parameters: &toml::Table) -> Result<Box<dyn Program>, LoadError> {
        let mut program = self
            .create(name, sample_rate)
            .ok_or_else(|| LoadError::UnknownEngine(name.to_owned()))?;
        program.load(parameters)?;
        Ok(program)
    }

    /// Number of registered engines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no engine is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
